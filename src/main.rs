use clap::Parser;
use longbook::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
    run(cli)
}
