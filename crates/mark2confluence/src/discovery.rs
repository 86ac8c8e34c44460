use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use regex::Regex;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::error::SetupError;

/// Filters applied to every path found under the documentation directory.
#[derive(Clone, Debug)]
pub struct DiscoveryFilter {
    pattern: Regex,
    max_age: Option<Duration>,
}

impl DiscoveryFilter {
    /// Compiles `DOC_DIR_PATTERN`; an interval of zero disables the age check.
    pub fn new(pattern: &str, modified_interval_minutes: u64) -> Result<Self, SetupError> {
        let pattern = Regex::new(pattern)?;
        let max_age = (modified_interval_minutes > 0)
            .then(|| Duration::from_secs(modified_interval_minutes.saturating_mul(60)));
        Ok(Self { pattern, max_age })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        Self::new(
            &settings.inputs.doc_dir_pattern,
            settings.inputs.modified_interval,
        )
    }

    /// The pattern must match at the start of the path, not merely somewhere in it.
    pub fn matches_pattern(&self, path: &str) -> bool {
        self.pattern
            .find(path)
            .is_some_and(|found| found.start() == 0)
    }

    fn is_fresh(&self, path: &Path, now: SystemTime) -> bool {
        let Some(max_age) = self.max_age else {
            return true;
        };
        let modified = match path.metadata().and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unable to read modification time, keeping file");
                return true;
            }
        };
        match now.checked_sub(max_age) {
            Some(threshold) => modified >= threshold,
            None => true,
        }
    }
}

/// Files to process: the explicit `FILES` list when set, otherwise every file
/// under `{workspace}/{DOC_DIR}` that passes `filter`.
pub fn collect_files(
    settings: &Settings,
    filter: &DiscoveryFilter,
) -> Result<Vec<PathBuf>, SetupError> {
    let workspace = settings.workspace();
    if !settings.inputs.files.is_empty() {
        return Ok(settings
            .inputs
            .files
            .iter()
            .map(|file| workspace.join(file))
            .collect());
    }

    let top = workspace.join(&settings.inputs.doc_dir);
    search_doc_dir(&top, filter, SystemTime::now())
}

/// Walks `top` without following symlinks, in file-name order.
pub fn search_doc_dir(
    top: &Path,
    filter: &DiscoveryFilter,
    now: SystemTime,
) -> Result<Vec<PathBuf>, SetupError> {
    tracing::info!(path = %top.display(), "Searching into documentation directory");
    if !top.is_dir() {
        return Err(SetupError::Discovery {
            path: top.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(top)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let shown = path.to_string_lossy();
        if !filter.matches_pattern(&shown) {
            tracing::info!(path = %shown, "Doesn't match DOC_DIR_PATTERN, skipping");
        } else if !filter.is_fresh(path, now) {
            tracing::info!(path = %shown, "Is too old, skipping");
        } else {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn invalid_pattern_is_setup_error() {
        let err = DiscoveryFilter::new("(", 0).unwrap_err();
        assert!(matches!(err, SetupError::DocDirPattern(_)));
        assert!(err.to_string().starts_with("Setup error, DOC_DIR_PATTERN"));
    }

    #[test]
    fn pattern_is_anchored_at_start() {
        let filter = DiscoveryFilter::new("docs/", 0).unwrap();
        assert!(filter.matches_pattern("docs/a.md"));
        assert!(!filter.matches_pattern("src/docs/a.md"));
    }

    #[test]
    fn walks_tree_in_sorted_order_and_filters() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("docs/nested")).unwrap();
        fs::write(root.join("docs/b.md"), "b").unwrap();
        fs::write(root.join("docs/a.md"), "a").unwrap();
        fs::write(root.join("docs/nested/c.txt"), "c").unwrap();

        let filter = DiscoveryFilter::new(".*\\.md$", 0).unwrap();
        let files = search_doc_dir(&root.join("docs"), &filter, SystemTime::now()).unwrap();

        assert_eq!(files, [root.join("docs/a.md"), root.join("docs/b.md")]);
    }

    #[test]
    fn walk_skips_paths_outside_pattern() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("page.md"), "x").unwrap();
        let filter = DiscoveryFilter::new("elsewhere/", 0).unwrap();

        let files = search_doc_dir(temp.path(), &filter, SystemTime::now()).unwrap();

        assert!(files.is_empty());
    }

    #[test]
    fn old_files_are_skipped_when_interval_set() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("page.md"), "x").unwrap();
        let filter = DiscoveryFilter::new(".*", 5).unwrap();

        let now = SystemTime::now();
        let fresh = search_doc_dir(temp.path(), &filter, now).unwrap();
        assert_eq!(fresh.len(), 1);

        let later = now + Duration::from_secs(60 * 60);
        let stale = search_doc_dir(temp.path(), &filter, later).unwrap();
        assert!(stale.is_empty());
    }

    #[test]
    fn explicit_files_bypass_the_walk() {
        let settings = Settings::from_env_pairs([
            ("INPUT_FILES", "docs/a.md missing.md"),
            ("GITHUB_WORKSPACE", "/nowhere"),
        ])
        .unwrap();
        let filter = DiscoveryFilter::from_settings(&settings).unwrap();

        let files = collect_files(&settings, &filter).unwrap();

        assert_eq!(
            files,
            [
                PathBuf::from("/nowhere/docs/a.md"),
                PathBuf::from("/nowhere/missing.md")
            ]
        );
    }

    #[test]
    fn missing_doc_dir_is_setup_error() {
        let temp = tempdir().unwrap();
        let filter = DiscoveryFilter::new(".*", 0).unwrap();
        let err = search_doc_dir(&temp.path().join("absent"), &filter, SystemTime::now())
            .unwrap_err();
        assert!(matches!(err, SetupError::Discovery { .. }));
    }
}
