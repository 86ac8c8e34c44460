use globset::{GlobBuilder, GlobMatcher};

use crate::error::SetupError;

const DIRECTORY_SEPARATOR: char = '=';
const PARENT_SEPARATOR: &str = "->";

/// One `DIR=SPACE[->PARENT1->PARENT2]` rule from `DEFAULT_PARENTS`.
#[derive(Clone, Debug)]
pub struct ParentDirective {
    directory: String,
    pattern: String,
    matcher: GlobMatcher,
    space: String,
    parents: Vec<String>,
}

impl ParentDirective {
    /// Parses a single configuration line.
    ///
    /// The directory is mandatory even for catch-all rules (`*=SPACE`), and
    /// every parent segment must be non-empty, including a trailing one.
    pub fn parse(line: &str) -> Result<Self, SetupError> {
        let trimmed = line.trim();
        let Some((directory, rest)) = trimmed.split_once(DIRECTORY_SEPARATOR) else {
            return Err(SetupError::parent_format(line));
        };
        if directory.is_empty() || rest.is_empty() || trimmed.ends_with(PARENT_SEPARATOR) {
            return Err(SetupError::parent_format(line));
        }

        let mut fragments = rest.split(PARENT_SEPARATOR);
        let space = fragments.next().unwrap_or_default();
        if space.is_empty() {
            return Err(SetupError::parent_format(line));
        }
        let parents: Vec<String> = fragments.map(str::to_string).collect();
        if parents.iter().any(String::is_empty) {
            return Err(SetupError::parent_format(line));
        }

        let pattern = normalize_directory(directory);
        let matcher = GlobBuilder::new(&pattern)
            .literal_separator(false)
            .build()
            .map_err(|err| SetupError::ParentPattern {
                pattern: pattern.clone(),
                reason: err.to_string(),
            })?
            .compile_matcher();

        Ok(Self {
            directory: directory.to_string(),
            pattern,
            matcher,
            space: space.to_string(),
            parents,
        })
    }

    /// Directory exactly as configured.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Directory glob, always ending with `/`.
    pub fn directory_pattern(&self) -> &str {
        &self.pattern
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    /// Parent titles, top-level parent first.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Renders the `Space`/`Parent` comment block, one newline-terminated line each.
    pub fn header(&self) -> String {
        let mut header = format!("<!-- Space: {} -->\n", self.space);
        for parent in &self.parents {
            header.push_str(&format!("<!-- Parent: {parent} -->\n"));
        }
        header
    }

    /// Returns true when `candidate_dir`, made relative to `workspace_root`,
    /// matches this rule's directory glob.
    pub fn matches(&self, candidate_dir: &str, workspace_root: &str) -> bool {
        let root = workspace_root.trim_end_matches('/');
        let relative = if root.is_empty() {
            candidate_dir
        } else {
            candidate_dir
                .strip_prefix(root)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(candidate_dir)
        };
        self.matcher.is_match(normalize_directory(relative))
    }
}

fn normalize_directory(directory: &str) -> String {
    if directory.ends_with('/') {
        directory.to_string()
    } else {
        format!("{directory}/")
    }
}
