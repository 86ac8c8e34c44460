use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use mark2confluence::{
    Action, DiscoveryFilter, MarkPublisher, Pipeline, RunSummary, Settings, collect_files,
};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

const NAME: &str = "mark2confluence";

pub fn run() -> ExitCode {
    match run_cli(std::env::args_os(), env_vars()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Process environment, with non UTF-8 keys and values converted lossily.
fn env_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().map(|(key, value)| {
        (
            key.to_string_lossy().into_owned(),
            value.to_string_lossy().into_owned(),
        )
    })
}

/// Loads settings from `vars`, applies command-line overrides, then prepares
/// and publishes every discovered file. The exit code is the number of files
/// that failed, capped at 255; configuration errors exit with 1.
pub fn run_cli<I, S, E, K, V>(args: I, vars: E) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
    E: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let matches = build_cli().try_get_matches_from(args)?;

    let loaded = Settings::from_env_pairs(vars);
    init_tracing(
        loaded
            .as_ref()
            .map(Settings::tracing_level)
            .unwrap_or("info"),
    );
    let mut settings = loaded?;
    apply_overrides(&mut settings, &matches)?;

    if matches.get_flag("verbose") {
        tracing::info!(
            settings = %serde_json::to_string(&settings)?,
            "resolved settings"
        );
    }

    let filter = DiscoveryFilter::from_settings(&settings)?;
    let pipeline = Pipeline::new(&settings, MarkPublisher::from_settings(&settings))?;
    let files = collect_files(&settings, &filter)?;
    let summary = pipeline.run(&files);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(exit_code(&summary))
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_overrides(settings: &mut Settings, matches: &ArgMatches) -> Result<(), CliError> {
    if let Some(workspace) = matches.get_one::<PathBuf>("workspace") {
        settings.github.workspace = workspace.clone();
    }
    if let Some(action) = matches.get_one::<String>("action") {
        settings.inputs.action = action.parse::<Action>()?;
    }
    Ok(())
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    ExitCode::from(exit_byte(summary))
}

fn exit_byte(summary: &RunSummary) -> u8 {
    u8::try_from(summary.exit_code()).unwrap_or(u8::MAX)
}

/// Everything else is read from `INPUT_*` and `GITHUB_*` variables.
fn build_cli() -> Command {
    Command::new(NAME)
        .about("Inject wiki headers into Markdown documentation and publish it with mark")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("workspace")
                .long("workspace")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Workspace root. Overrides GITHUB_WORKSPACE."),
        )
        .arg(
            Arg::new("action")
                .long("action")
                .value_name("ACTION")
                .value_parser(["dry-run", "publish", "verify"])
                .help("Publisher mode. Overrides INPUT_ACTION."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the run summary as JSON on stdout."),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log the resolved settings, with credentials redacted."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn overrides_replace_environment_values() {
        let mut settings =
            Settings::from_env_pairs([("INPUT_ACTION", "publish"), ("GITHUB_WORKSPACE", "/a")])
                .unwrap();
        let matches = build_cli()
            .try_get_matches_from([NAME, "--workspace", "/b", "--action", "verify"])
            .unwrap();

        apply_overrides(&mut settings, &matches).unwrap();

        assert_eq!(settings.github.workspace, PathBuf::from("/b"));
        assert_eq!(settings.inputs.action, Action::Verify);
    }

    #[test]
    fn exit_code_saturates() {
        let summary = RunSummary {
            failed: 300,
            ..RunSummary::default()
        };
        assert_eq!(exit_byte(&summary), 255);
    }
}
