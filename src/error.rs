//! Error types for cluster construction and lifecycle operations.

use crate::process::Role;

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Cluster errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad working directory or unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A role process could not be launched.
    #[error("failed to launch {role}: {reason}")]
    Launch { role: Role, reason: String },

    /// The initializer exited unsuccessfully.
    #[error("initializer exited with {}", describe_exit(*.code))]
    Initialization { code: Option<i32> },

    /// Lifecycle operation called in the wrong state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a launch error for `role`.
    pub fn launch(role: Role, reason: impl Into<String>) -> Self {
        Self::Launch {
            role,
            reason: reason.into(),
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
