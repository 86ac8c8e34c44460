mod cli;
mod error;

pub use cli::{run, run_cli};
pub use error::{CliError, ExitStatus};
