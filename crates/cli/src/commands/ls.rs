//! ls command - list files under a remote path

use clap::Args;
use serde::Serialize;

use artx_core::{
    Error, FileQuery, PathSpec, RemoteObject, RemoteSpec, SearchService, TransferConfig,
    parse_path, planner,
};
use artx_http::ArtifactoryClient;

use crate::commands::client_for;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List files under a remote path
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote path (https://host/artifactory/repo/prefix)
    pub path: String,

    /// Recurse into subfolders
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Per-operation network timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Bearer token for the remote endpoint
    #[arg(long, env = "ARTX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Legacy API key for the remote endpoint
    #[arg(long, env = "ARTX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    path: String,
    folders: Vec<String>,
    files: Vec<RemoteObject>,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let remote = match parse_path(&args.path) {
        Ok(PathSpec::Remote(remote)) => remote,
        Ok(PathSpec::Local(_)) => {
            formatter.error("ls requires a remote path");
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let client = match client_for(&remote, args.token.clone(), args.api_key.clone(), args.timeout)
    {
        Ok(client) => client,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    match list(&client, &remote, args.recursive).await {
        Ok(output) => {
            render(&formatter, &remote, &output, args.recursive);
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

async fn list(
    client: &ArtifactoryClient,
    remote: &RemoteSpec,
    recursive: bool,
) -> Result<LsOutput, Error> {
    let config = TransferConfig::default();

    if recursive {
        let files = planner::resolve_remote_tree(
            client,
            &config.retry(),
            &remote.location(),
            config.max_query_page_size,
        )
        .await?;
        return Ok(LsOutput {
            path: remote.url(),
            folders: Vec::new(),
            files,
        });
    }

    let mut files = Vec::new();
    let mut offset = 0;
    loop {
        let page = client
            .search_files(&FileQuery {
                repo: remote.repo.clone(),
                prefix: remote.path.clone(),
                deep: false,
                offset,
                limit: config.max_query_page_size,
            })
            .await?;
        let count = page.items.len() as u64;
        files.extend(page.items);
        if !page.truncated || count == 0 {
            break;
        }
        offset += count;
    }

    let folders = client.list_child_dirs(&remote.repo, &remote.path).await?;

    Ok(LsOutput {
        path: remote.url(),
        folders,
        files,
    })
}

fn render(formatter: &Formatter, remote: &RemoteSpec, output: &LsOutput, recursive: bool) {
    if formatter.is_json() {
        formatter.json(output);
        return;
    }

    for folder in &output.folders {
        formatter.line(&format!("{:>10}  {:<16}  {folder}/", "-", "-"));
    }
    for file in &output.files {
        let size = humansize::format_size(file.size, humansize::BINARY);
        let modified = file
            .last_modified
            .map(|t| t.strftime("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        // Recursive listings show the repository-relative path, shallow ones
        // just the file name
        let name = if recursive {
            file.path.as_str()
        } else {
            file.file_name()
        };
        formatter.line(&format!("{size:>10}  {modified:<16}  {name}"));
    }
    formatter.info(&format!(
        "{} files under {}",
        output.files.len(),
        remote.url()
    ));
}
