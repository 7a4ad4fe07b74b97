//! Typed failure taxonomy for an export run.
//!
//! Every failure a run can hit is one of these variants; none of them is ever
//! downgraded to a warning. The only swallowed failure in the whole system is
//! the cookie-banner probe, which reports absence instead of erroring.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The specific invariant a provider file violated during security validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SecurityViolation {
    #[error("file not found")]
    NotFound,

    #[error("not a regular file")]
    NotRegularFile,

    #[error("owned by uid {actual}, but the process runs as uid {expected}")]
    WrongOwner { expected: u32, actual: u32 },

    #[error("writable by group or other (mode {mode:03o})")]
    GroupOrWorldWritable { mode: u32 },

    #[error("mode {mode:03o} is not the required 600 (owner read+write only)")]
    WrongMode { mode: u32 },
}

/// Failure taxonomy for the export run. All variants are fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed startup input.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provider file failed an ownership/permission/type check. Nothing
    /// from the file has been read at this point.
    #[error("provider file {} failed security validation: {violation}", path.display())]
    SecurityValidation {
        path: PathBuf,
        violation: SecurityViolation,
    },

    /// A loaded provider does not declare a required operation.
    #[error("provider manifest {} does not declare the `{operation}` operation", path.display())]
    ProviderContract {
        path: PathBuf,
        operation: &'static str,
    },

    /// The provider manifest could not be read or parsed.
    #[error("failed to load provider manifest {}", path.display())]
    ProviderLoad {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A provider operation failed to produce its secret.
    #[error("provider operation `{operation}` failed: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },

    /// A secret resolved to an empty value; no default is ever substituted.
    #[error("the {field} resolved to an empty value")]
    Credential { field: &'static str },

    /// No mapped or derived answer exists for a displayed challenge question.
    /// Carries the literal question text for operator remediation.
    #[error("no answer for challenge question: {question:?}")]
    UnknownChallenge { question: String },

    /// An expected portal element never appeared, including after the one
    /// documented retry of the export form.
    #[error("portal navigation failed at {step}: {detail}")]
    Navigation { step: &'static str, detail: String },

    /// A bounded wait elapsed.
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    /// The artifact or one of its directories could not be written.
    #[error("filesystem operation failed on {}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure inside the consumed browser-automation engine.
    #[error("browser engine error: {0}")]
    Engine(String),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub(crate) fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Error::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub(crate) fn engine(err: impl std::fmt::Display) -> Self {
        Error::Engine(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_violation_names_the_invariant() {
        let err = Error::SecurityValidation {
            path: PathBuf::from("/etc/provider.toml"),
            violation: SecurityViolation::WrongMode { mode: 0o644 },
        };
        let rendered = err.to_string();
        assert!(rendered.contains("644"));
        assert!(rendered.contains("600"));
    }

    #[test]
    fn unknown_challenge_carries_the_question() {
        let err = Error::UnknownChallenge {
            question: "what city were you born in?".to_string(),
        };
        assert!(err.to_string().contains("what city were you born in?"));
    }
}
