//! artx - concurrent artifact transfer client for Artifactory

mod commands;
mod exit_code;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::OutputConfig;

#[derive(Parser, Debug)]
#[command(
    name = "artx",
    version,
    about = "Concurrent artifact transfer client for Artifactory repositories"
)]
struct Cli {
    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress and informational output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy files between a local path and a remote repository
    Cp(commands::cp::CpArgs),
    /// List files under a remote path
    Ls(commands::ls::LsArgs),
    /// Manage stored endpoint credentials
    Endpoint(commands::endpoint::EndpointArgs),
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_config = OutputConfig {
        json: cli.json,
        quiet: cli.quiet,
    };

    let code = match cli.command {
        Command::Cp(args) => commands::cp::execute(args, output_config).await,
        Command::Ls(args) => commands::ls::execute(args, output_config).await,
        Command::Endpoint(args) => commands::endpoint::execute(args, output_config),
    };
    code.into()
}
