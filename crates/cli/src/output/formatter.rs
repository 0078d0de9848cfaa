//! Output formatter for human-readable and JSON output
//!
//! Ensures consistent output across all commands. In JSON mode the primary
//! output is strict JSON on stdout; errors go to stderr as a JSON object so
//! scripts can parse either stream.

use serde::Serialize;

use super::OutputConfig;

#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Print a serializable value as pretty JSON
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => self.error(&format!("failed to serialize output: {e}")),
        }
    }

    /// A line that is part of the command's primary output
    pub fn line(&self, message: &str) {
        println!("{message}");
    }

    /// Informational line, suppressed in quiet and JSON modes
    pub fn info(&self, message: &str) {
        if !self.config.quiet && !self.config.json {
            println!("{message}");
        }
    }

    pub fn error(&self, message: &str) {
        if self.config.json {
            eprintln!("{}", serde_json::json!({ "error": message }));
        } else {
            eprintln!("error: {message}");
        }
    }
}
