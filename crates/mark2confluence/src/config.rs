use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::SetupError;
use crate::template::DEFAULT_HEADER_TEMPLATE;

pub const INPUTS_PREFIX: &str = "INPUT_";
pub const GITHUB_PREFIX: &str = "GITHUB_";
pub const ACTIONS_PREFIX: &str = "ACTIONS_";
pub const RUNNER_PREFIX: &str = "RUNNER_";

/// Unprefixed variable consulted when `INPUT_MARK_LOG_LEVEL` is absent or invalid.
pub const MARK_LOG_LEVEL_VAR: &str = "MARK_LOG_LEVEL";

/// Older name of the `LOG_LEVEL` input, still honoured when `LOG_LEVEL` is unset.
pub const LEGACY_LOG_LEVEL_INPUT: &str = "LOGURU_LEVEL";

/// Levels `mark --log-level` accepts.
pub const MARK_LOG_LEVELS: [&str; 6] = ["TRACE", "DEBUG", "INFO", "WARNING", "ERROR", "FATAL"];

/// What the publisher should do with each page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    #[default]
    DryRun,
    Publish,
    Verify,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::DryRun => "dry-run",
            Action::Publish => "publish",
            Action::Verify => "verify",
        }
    }

    /// Flag handed to `mark`, if any.
    pub fn publisher_flag(self) -> Option<&'static str> {
        match self {
            Action::DryRun => Some("--dry-run"),
            Action::Publish => None,
            Action::Verify => Some("--compile-only"),
        }
    }
}

impl FromStr for Action {
    type Err = SetupError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dry-run" => Ok(Action::DryRun),
            "publish" => Ok(Action::Publish),
            "verify" => Ok(Action::Verify),
            _ => Err(SetupError::Action(value.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action inputs (`INPUT_*`) after validation.
#[derive(Clone, Debug, Serialize)]
pub struct Inputs {
    pub doc_dir: String,
    pub doc_dir_pattern: String,
    pub files: Vec<String>,
    pub action: Action,
    pub log_level: String,
    pub mark_log_level: String,
    pub header_template: String,
    pub modified_interval: u64,
    #[serde(serialize_with = "redact")]
    pub confluence_password: String,
    pub confluence_username: String,
    pub confluence_base_url: String,
    pub mermaid_provider: String,
    pub default_parents: String,
    pub mark_binary: String,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            doc_dir: String::new(),
            doc_dir_pattern: ".*".into(),
            files: Vec::new(),
            action: Action::DryRun,
            log_level: "INFO".into(),
            mark_log_level: String::new(),
            header_template: DEFAULT_HEADER_TEMPLATE.into(),
            modified_interval: 0,
            confluence_password: String::new(),
            confluence_username: String::new(),
            confluence_base_url: String::new(),
            mermaid_provider: String::new(),
            default_parents: String::new(),
            mark_binary: "mark".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
struct RawInputs {
    doc_dir: String,
    doc_dir_pattern: String,
    files: String,
    action: String,
    log_level: String,
    mark_log_level: String,
    header_template: String,
    modified_interval: String,
    confluence_password: String,
    confluence_username: String,
    confluence_base_url: String,
    mermaid_provider: String,
    default_parents: String,
    mark_binary: String,
}

impl Default for RawInputs {
    fn default() -> Self {
        Self {
            doc_dir: String::new(),
            doc_dir_pattern: ".*".into(),
            files: String::new(),
            action: Action::DryRun.as_str().into(),
            log_level: "INFO".into(),
            mark_log_level: String::new(),
            header_template: DEFAULT_HEADER_TEMPLATE.into(),
            modified_interval: "0".into(),
            confluence_password: String::new(),
            confluence_username: String::new(),
            confluence_base_url: String::new(),
            mermaid_provider: String::new(),
            default_parents: String::new(),
            mark_binary: "mark".into(),
        }
    }
}

impl TryFrom<RawInputs> for Inputs {
    type Error = SetupError;

    fn try_from(raw: RawInputs) -> Result<Self, Self::Error> {
        let action = raw.action.parse()?;
        let modified_interval = raw
            .modified_interval
            .trim()
            .parse::<u64>()
            .map_err(|_| SetupError::ModifiedInterval(raw.modified_interval.clone()))?;
        let files = raw
            .files
            .split(' ')
            .filter(|file| !file.is_empty())
            .map(str::to_string)
            .collect();
        let mark_binary = if raw.mark_binary.trim().is_empty() {
            "mark".to_string()
        } else {
            raw.mark_binary
        };

        Ok(Self {
            doc_dir: raw.doc_dir,
            doc_dir_pattern: raw.doc_dir_pattern,
            files,
            action,
            log_level: raw.log_level,
            mark_log_level: raw.mark_log_level,
            header_template: raw.header_template,
            modified_interval,
            confluence_password: raw.confluence_password,
            confluence_username: raw.confluence_username,
            confluence_base_url: raw.confluence_base_url,
            mermaid_provider: raw.mermaid_provider,
            default_parents: raw.default_parents,
            mark_binary,
        })
    }
}

/// `GITHUB_*` context. Unrecognised keys are kept in `other`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GithubContext {
    pub server_url: String,
    pub repository: String,
    pub ref_name: String,
    pub workspace: PathBuf,
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl Default for GithubContext {
    fn default() -> Self {
        Self {
            server_url: "https://github.com".into(),
            repository: "draios/infra-action-mark2confluence".into(),
            ref_name: "main".into(),
            workspace: PathBuf::from("."),
            other: BTreeMap::new(),
        }
    }
}

/// Immutable run configuration, built once from the process environment.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Settings {
    pub inputs: Inputs,
    pub github: GithubContext,
    pub actions: BTreeMap<String, String>,
    pub runner: BTreeMap<String, String>,
    #[serde(skip)]
    pub env_mark_log_level: Option<String>,
}

impl Settings {
    /// Variables that are not valid UTF-8 are converted lossily.
    pub fn from_env() -> Result<Self, SetupError> {
        Self::from_env_pairs(env::vars_os().map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        }))
    }

    /// Sorts variables into the `inputs`, `github`, `actions` and `runner`
    /// namespaces by prefix, strips the prefix and applies defaults.
    pub fn from_env_pairs<I, K, V>(vars: I) -> Result<Self, SetupError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut inputs = serde_json::Map::new();
        let mut github = serde_json::Map::new();
        let mut actions = BTreeMap::new();
        let mut runner = BTreeMap::new();
        let mut env_mark_log_level = None;

        for (key, value) in vars {
            let key: String = key.into();
            let value: String = value.into();
            if let Some(stripped) = key.strip_prefix(INPUTS_PREFIX) {
                inputs.insert(stripped.to_string(), serde_json::Value::String(value));
            } else if let Some(stripped) = key.strip_prefix(GITHUB_PREFIX) {
                github.insert(stripped.to_string(), serde_json::Value::String(value));
            } else if let Some(stripped) = key.strip_prefix(ACTIONS_PREFIX) {
                actions.insert(stripped.to_string(), value);
            } else if let Some(stripped) = key.strip_prefix(RUNNER_PREFIX) {
                runner.insert(stripped.to_string(), value);
            } else if key == MARK_LOG_LEVEL_VAR && !value.is_empty() {
                env_mark_log_level = Some(value);
            }
        }

        if !inputs.contains_key("LOG_LEVEL")
            && let Some(legacy) = inputs.get(LEGACY_LOG_LEVEL_INPUT).cloned()
        {
            inputs.insert("LOG_LEVEL".to_string(), legacy);
        }

        let raw: RawInputs = serde_json::from_value(serde_json::Value::Object(inputs))
            .map_err(|err| SetupError::Settings(format!("inputs: {err}")))?;
        let github: GithubContext = serde_json::from_value(serde_json::Value::Object(github))
            .map_err(|err| SetupError::Settings(format!("github: {err}")))?;

        Ok(Self {
            inputs: Inputs::try_from(raw)?,
            github,
            actions,
            runner,
            env_mark_log_level,
        })
    }

    pub fn workspace(&self) -> &std::path::Path {
        &self.github.workspace
    }

    /// Level passed to `mark --log-level`: a valid `INPUT_MARK_LOG_LEVEL`, then
    /// the raw `MARK_LOG_LEVEL` variable, then a valid `INPUT_LOG_LEVEL`.
    pub fn mark_log_level(&self) -> Option<String> {
        valid_mark_level(&self.inputs.mark_log_level)
            .or_else(|| self.env_mark_log_level.clone())
            .or_else(|| valid_mark_level(&self.inputs.log_level))
    }

    /// `tracing` filter directive equivalent to `INPUT_LOG_LEVEL`.
    pub fn tracing_level(&self) -> &'static str {
        match self.inputs.log_level.trim().to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARNING" | "WARN" => "warn",
            "ERROR" | "CRITICAL" | "FATAL" => "error",
            _ => "info",
        }
    }
}

fn valid_mark_level(level: &str) -> Option<String> {
    let upper = level.trim().to_ascii_uppercase();
    MARK_LOG_LEVELS.contains(&upper.as_str()).then_some(upper)
}

fn redact<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("***")
    }
}
