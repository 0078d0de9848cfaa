//! Process exit codes
//!
//! Stable numeric codes so scripts can branch on the failure class without
//! parsing output.

use artx_core::{Error, ErrorKind, TransferReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    UsageError = 2,
    NotFound = 3,
    NetworkError = 4,
    IntegrityError = 5,
    AuthError = 6,
    Cancelled = 130,
}

impl ExitCode {
    pub fn from_error(error: &Error) -> Self {
        Self::from_kind(error.kind())
    }

    /// A transfer that ran to completion maps to the most specific failure
    /// class among its settled units
    pub fn from_report(report: &TransferReport) -> Self {
        if report.is_success() {
            return Self::Success;
        }

        let kinds: Vec<ErrorKind> = report.outcomes.iter().filter_map(|o| o.error_kind).collect();
        for kind in [
            ErrorKind::Auth,
            ErrorKind::Integrity,
            ErrorKind::NotFound,
            ErrorKind::Transport,
            ErrorKind::Query,
            ErrorKind::Cancelled,
        ] {
            if kinds.contains(&kind) {
                return Self::from_kind(kind);
            }
        }
        Self::GeneralError
    }

    fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidPath | ErrorKind::PathConflict | ErrorKind::Config => {
                Self::UsageError
            }
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::Transport | ErrorKind::Query => Self::NetworkError,
            ErrorKind::Integrity => Self::IntegrityError,
            ErrorKind::Auth => Self::AuthError,
            ErrorKind::Cancelled => Self::Cancelled,
            ErrorKind::LocalIo => Self::GeneralError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
