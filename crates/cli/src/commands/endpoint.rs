//! endpoint command - manage stored endpoint credentials
//!
//! Credentials live in the engine's TOML endpoint store and are attached
//! automatically when a transfer targets a matching host. Secrets are never
//! echoed back, only which kind of credential is present.

use clap::{Args, Subcommand};
use serde::Serialize;

use artx_core::{ConfigManager, Endpoint};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Manage stored endpoint credentials
#[derive(Args, Debug)]
pub struct EndpointArgs {
    #[command(subcommand)]
    pub command: EndpointCommand,
}

#[derive(Subcommand, Debug)]
pub enum EndpointCommand {
    /// Store credentials for a named endpoint
    Set {
        /// Endpoint name, e.g. "prod"
        name: String,

        /// Base URL including the context root, e.g. https://host/artifactory
        url: String,

        /// Bearer token (preferred)
        #[arg(long, conflicts_with = "api_key")]
        token: Option<String>,

        /// Legacy X-JFrog-Art-Api key
        #[arg(long)]
        api_key: Option<String>,
    },
    /// List stored endpoints, with credentials redacted
    List,
    /// Remove a stored endpoint
    Remove { name: String },
}

#[derive(Debug, Serialize)]
struct EndpointRow {
    name: String,
    url: String,
    /// "token", "api_key" or "anonymous"
    auth: &'static str,
}

/// Execute the endpoint command
pub fn execute(args: EndpointArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let mut manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    match args.command {
        EndpointCommand::Set {
            name,
            url,
            token,
            api_key,
        } => {
            manager.set(
                &name,
                Endpoint {
                    url: url.trim_end_matches('/').to_string(),
                    token,
                    api_key,
                },
            );
            if let Err(e) = manager.save() {
                formatter.error(&e.to_string());
                return ExitCode::from_error(&e);
            }
            formatter.info(&format!("endpoint '{name}' saved"));
            ExitCode::Success
        }
        EndpointCommand::List => {
            let rows: Vec<EndpointRow> = manager
                .endpoints()
                .map(|(name, endpoint)| EndpointRow {
                    name: name.to_string(),
                    url: endpoint.url.clone(),
                    auth: if endpoint.token.is_some() {
                        "token"
                    } else if endpoint.api_key.is_some() {
                        "api_key"
                    } else {
                        "anonymous"
                    },
                })
                .collect();

            if formatter.is_json() {
                formatter.json(&rows);
            } else {
                for row in &rows {
                    formatter.line(&format!("{:<16} {:<48} {}", row.name, row.url, row.auth));
                }
                formatter.info(&format!("{} endpoints", rows.len()));
            }
            ExitCode::Success
        }
        EndpointCommand::Remove { name } => {
            if !manager.remove(&name) {
                formatter.error(&format!("endpoint '{name}' not found"));
                return ExitCode::NotFound;
            }
            if let Err(e) = manager.save() {
                formatter.error(&e.to_string());
                return ExitCode::from_error(&e);
            }
            formatter.info(&format!("endpoint '{name}' removed"));
            ExitCode::Success
        }
    }
}
