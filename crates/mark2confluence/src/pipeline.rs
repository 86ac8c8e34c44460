use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;
use crate::error::{HeaderError, SetupError};
use crate::header::{declares_own_metadata, has_any_known_header};
use crate::inject::{insert_before_content, prepend_parent_header};
use crate::publisher::{PublishFailure, Publisher};
use crate::rules::ParentRuleSet;
use crate::template::{BannerContext, HeaderTemplate};

const MARKDOWN_EXTENSION: &str = "md";

/// Why one file did not make it to the wiki.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("unable to render HEADER_TEMPLATE: {0}")]
    Render(String),
    #[error(transparent)]
    Publish(#[from] PublishFailure),
}

/// What happened to one candidate path.
#[derive(Debug)]
pub enum FileStatus {
    Skipped,
    Published,
    Failed(FailureReason),
}

#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of a run; `exit_code` is the number of failed files.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
    pub skipped: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl RunSummary {
    fn record(&mut self, path: &Path, status: FileStatus) {
        let display = path.display().to_string();
        match status {
            FileStatus::Skipped => self.skipped.push(display),
            FileStatus::Published => {
                self.succeeded += 1;
                self.total += 1;
                self.files.push(FileReport {
                    path: display,
                    ok: true,
                    error: None,
                });
            }
            FileStatus::Failed(reason) => {
                self.failed += 1;
                self.total += 1;
                self.files.push(FileReport {
                    path: display,
                    ok: false,
                    error: Some(reason.to_string()),
                });
            }
        }
    }

    pub fn exit_code(&self) -> usize {
        self.failed
    }
}

/// Prepares and publishes files one after another.
///
/// A file with an unterminated comment block, or one that cannot be read or
/// written, counts as a single failure and is not published; the batch
/// carries on with the next file.
pub struct Pipeline<'a, P: Publisher> {
    settings: &'a Settings,
    rules: ParentRuleSet,
    template: HeaderTemplate,
    publisher: P,
    workspace_root: String,
}

impl<'a, P: Publisher> Pipeline<'a, P> {
    /// Compiles the banner template and `DEFAULT_PARENTS` up front so that
    /// configuration mistakes surface before any file is modified.
    pub fn new(settings: &'a Settings, publisher: P) -> Result<Self, SetupError> {
        let template = HeaderTemplate::compile(&settings.inputs.header_template)?;
        let rules = ParentRuleSet::build(Some(&settings.inputs.default_parents))?;
        let workspace_root = absolute_string(settings.workspace());
        tracing::debug!(rules = rules.len(), workspace = %workspace_root, "pipeline ready");
        Ok(Self {
            settings,
            rules,
            template,
            publisher,
            workspace_root,
        })
    }

    pub fn rules(&self) -> &ParentRuleSet {
        &self.rules
    }

    pub fn run(&self, files: &[PathBuf]) -> RunSummary {
        let listed = files
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!("Files to be processed: {listed}");

        let mut summary = RunSummary::default();
        for path in files {
            let status = self.process_file(path);
            if let FileStatus::Failed(reason) = &status {
                tracing::error!(path = %path.display(), "{reason}");
            }
            summary.record(path, status);
        }

        tracing::info!(
            "Success: {} | Failures: {} | Total: {}",
            summary.succeeded,
            summary.failed,
            summary.total
        );
        summary
    }

    pub fn process_file(&self, path: &Path) -> FileStatus {
        if !is_publishable(path) {
            tracing::info!(path = %path.display(), "Skipping headerless or non md file");
            return FileStatus::Skipped;
        }

        tracing::info!(path = %path.display(), "Processing file");
        if let Err(reason) = self.prepare(path) {
            return FileStatus::Failed(reason);
        }

        match self.publisher.publish(path) {
            Ok(()) => FileStatus::Published,
            Err(failure) => FileStatus::Failed(failure.into()),
        }
    }

    /// Injects default parents (when applicable) and the provenance banner.
    pub fn prepare(&self, path: &Path) -> Result<(), FailureReason> {
        self.inject_default_parents(path)?;

        let context = BannerContext::for_file(&self.settings.github, self.settings.workspace(), path);
        let banner = self
            .template
            .render(&context)
            .map_err(|err| FailureReason::Render(err.to_string()))?;
        let index = insert_before_content(path, &banner)?;
        tracing::debug!(path = %path.display(), index, "inserted provenance banner");
        Ok(())
    }

    fn inject_default_parents(&self, path: &Path) -> Result<(), HeaderError> {
        if self.rules.is_empty() {
            return Ok(());
        }
        if declares_own_metadata(path).map_err(|err| HeaderError::io(path, err))? {
            tracing::debug!(path = %path.display(), "file declares its own space");
            return Ok(());
        }

        let absolute = std::path::absolute(path).map_err(|err| HeaderError::io(path, err))?;
        let file_dir = absolute
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(directive) = self.rules.find_first_match(&file_dir, &self.workspace_root) {
            tracing::info!(
                path = %path.display(),
                directory = directive.directory(),
                space = directive.space(),
                "Injecting default parents"
            );
            prepend_parent_header(path, directive)?;
        }
        Ok(())
    }
}

fn is_publishable(path: &Path) -> bool {
    if path.extension().and_then(|ext| ext.to_str()) != Some(MARKDOWN_EXTENSION) {
        return false;
    }
    match has_any_known_header(path) {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "unable to read file header");
            false
        }
    }
}

fn absolute_string(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingPublisher {
        published: RefCell<Vec<PathBuf>>,
    }

    impl Publisher for RecordingPublisher {
        fn publish(&self, path: &Path) -> Result<(), PublishFailure> {
            self.published.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn settings_for(workspace: &Path, extra: &[(&str, &str)]) -> Settings {
        let workspace = workspace.to_string_lossy().into_owned();
        let mut vars = vec![
            ("GITHUB_WORKSPACE".to_string(), workspace),
            ("GITHUB_REPOSITORY".to_string(), "acme/docs".to_string()),
            ("INPUT_HEADER_TEMPLATE".to_string(), "BANNER {{source_link}}\n".to_string()),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Settings::from_env_pairs(vars).unwrap()
    }

    #[test]
    fn files_without_known_header_are_skipped_untouched() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plain.md");
        fs::write(&path, "# Plain\n").unwrap();
        let settings = settings_for(temp.path(), &[]);
        let publisher = RecordingPublisher::default();
        let pipeline = Pipeline::new(&settings, &publisher).unwrap();

        let summary = pipeline.run(&[path.clone()]);

        assert_eq!(summary.total, 0);
        assert_eq!(summary.skipped, [path.display().to_string()]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Plain\n");
        assert!(publisher.published.borrow().is_empty());
    }

    #[test]
    fn non_markdown_files_are_skipped() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "<!-- Space: X -->\n").unwrap();
        let settings = settings_for(temp.path(), &[]);
        let pipeline = Pipeline::new(&settings, RecordingPublisher::default()).unwrap();

        assert!(matches!(pipeline.process_file(&path), FileStatus::Skipped));
    }

    #[test]
    fn banner_lands_after_existing_headers() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        let path = temp.path().join("docs/page.md");
        fs::write(&path, "<!-- Space: X -->\n<!-- Title: T -->\n\nBody\n").unwrap();
        let settings = settings_for(temp.path(), &[]);
        let pipeline = Pipeline::new(&settings, RecordingPublisher::default()).unwrap();

        assert!(matches!(pipeline.process_file(&path), FileStatus::Published));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<!-- Space: X -->\n<!-- Title: T -->\n\nBANNER https://github.com/acme/docs/blob/main/docs/page.md\nBody\n"
        );
    }

    #[test]
    fn own_space_wins_over_default_parents() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        let path = temp.path().join("docs/page.md");
        fs::write(&path, "<!-- Space: MINE -->\nBody\n").unwrap();
        let settings = settings_for(temp.path(), &[("INPUT_DEFAULT_PARENTS", "docs=OTHER->P")]);
        let pipeline = Pipeline::new(&settings, RecordingPublisher::default()).unwrap();

        pipeline.prepare(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("OTHER"), "{content}");
        assert!(content.starts_with("<!-- Space: MINE -->\nBANNER "));
    }

    #[test]
    fn invalid_configuration_fails_before_files_are_touched() {
        let temp = tempdir().unwrap();
        let bad_parents = settings_for(temp.path(), &[("INPUT_DEFAULT_PARENTS", "docs=")]);
        assert!(matches!(
            Pipeline::new(&bad_parents, RecordingPublisher::default()),
            Err(SetupError::ParentFormat { .. })
        ));

        let bad_template = settings_for(temp.path(), &[("INPUT_HEADER_TEMPLATE", "{{")]);
        assert!(matches!(
            Pipeline::new(&bad_template, RecordingPublisher::default()),
            Err(SetupError::HeaderTemplate(_))
        ));
    }
}
