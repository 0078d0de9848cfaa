//! cp command - copy files between a local path and a remote repository
//!
//! Direction is inferred from the two paths: a remote source downloads, a
//! remote destination uploads. The remote side selects the endpoint and its
//! credentials.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use artx_core::{
    CancelToken, Engine, Error, PathSpec, RemoteSpec, TransferConfig, parse_path,
};

use crate::commands::client_for;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy files between a local path and a remote repository
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source path (local path or https://host/artifactory/repo/path)
    pub source: String,

    /// Destination path
    pub target: String,

    /// Number of parallel transfers
    #[arg(short = 'P', long, default_value_t = 10)]
    pub parallel: usize,

    /// Attempts per file, including the first
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Skip files whose destination already matches by checksum
    #[arg(long)]
    pub skip_unchanged: bool,

    /// Per-operation network timeout in seconds
    #[arg(long, default_value_t = 1800)]
    pub timeout: u64,

    /// Bearer token for the remote endpoint
    #[arg(long, env = "ARTX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Legacy API key for the remote endpoint
    #[arg(long, env = "ARTX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Execute the cp command
pub async fn execute(args: CpArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let remote = match remote_side(&args.source, &args.target) {
        Ok(remote) => remote,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let client = match client_for(&remote, args.token.clone(), args.api_key.clone(), args.timeout)
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let config = TransferConfig {
        max_concurrency: args.parallel.max(1),
        max_retry_attempts: args.retries.max(1),
        per_operation_timeout: Duration::from_secs(args.timeout),
        skip_unchanged: args.skip_unchanged,
        ..TransferConfig::default()
    };
    let engine = Engine::new(client.clone(), client, config);

    // Ctrl-C requests cooperative cancellation; in-flight files finish their
    // current chunk and settle, then the itemized report is still printed
    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested");
            signal_token.cancel();
        }
    });

    let progress = spinner(&formatter, &args.source, &args.target);
    let result = engine
        .transfer_with_cancel(&args.source, &args.target, cancel)
        .await;
    progress.finish_and_clear();

    let mut report = match result {
        Ok(report) => report,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };
    report.sort_by_destination();

    if formatter.is_json() {
        formatter.json(&report);
    } else {
        for failure in report.failures() {
            let detail = failure.error.as_deref().unwrap_or("unknown error");
            formatter.error(&format!("{}: {detail}", failure.destination));
        }
        formatter.info(&report.to_string());
    }

    ExitCode::from_report(&report)
}

/// Exactly one of the two paths must be remote
fn remote_side(source: &str, target: &str) -> Result<RemoteSpec, Error> {
    match (parse_path(source)?, parse_path(target)?) {
        (PathSpec::Remote(remote), PathSpec::Local(_))
        | (PathSpec::Local(_), PathSpec::Remote(remote)) => Ok(remote),
        _ => Err(Error::InvalidPath(
            "transfer requires one local and one remote path".into(),
        )),
    }
}

fn spinner(formatter: &Formatter, source: &str, target: &str) -> ProgressBar {
    if formatter.is_quiet() || formatter.is_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .expect("Valid template"),
    );
    bar.set_message(format!("{source} -> {target}"));
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_side_picks_the_remote_path() {
        let remote = remote_side("https://host/artifactory/libs/a", "out/").unwrap();
        assert_eq!(remote.repo, "libs");

        let remote = remote_side("src/", "https://host/artifactory/incoming/drop/").unwrap();
        assert_eq!(remote.repo, "incoming");
    }

    #[test]
    fn test_two_local_or_two_remote_paths_are_rejected() {
        assert!(matches!(
            remote_side("a", "b"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            remote_side(
                "https://host/artifactory/libs/a",
                "https://host/artifactory/libs/b"
            ),
            Err(Error::InvalidPath(_))
        ));
    }
}
