//! Output configuration and formatting

mod formatter;

pub use formatter::Formatter;

/// Global output switches shared by all commands
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    /// Emit strict JSON on stdout
    pub json: bool,
    /// Suppress progress and informational output
    pub quiet: bool,
}
