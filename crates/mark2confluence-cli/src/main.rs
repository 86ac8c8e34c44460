fn main() -> std::process::ExitCode {
    mark2confluence_cli::run()
}
