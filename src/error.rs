//! Error taxonomy for provisioning operations

use crate::bootstrap::BootstrapStep;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by site and service operations
#[derive(Debug, Error)]
pub enum Error {
    /// Site name is empty after stripping disallowed characters
    #[error("invalid site name '{0}': nothing left after removing characters outside [A-Za-z0-9-]")]
    InvalidName(String),

    /// A container with the derived name already exists (running or stopped)
    #[error("site '{0}' already exists")]
    AlreadyExists(String),

    /// The named site or service does not exist
    #[error("'{0}' not found")]
    NotFound(String),

    /// The container engine rejected an operation
    #[error("container engine error: {0}")]
    Engine(#[from] bollard::errors::Error),

    /// The registry reported an error while an image was being pulled
    #[error("failed to pull image '{image}': {detail}")]
    Pull { image: String, detail: String },

    /// A command executed inside a container exited non-zero
    #[error("command in container '{container}' exited with {exit_code:?}")]
    CommandFailed {
        container: String,
        exit_code: Option<i64>,
        output: String,
    },

    /// An in-container bootstrap step failed; the pipeline stops here
    #[error("bootstrap step '{step}' failed with exit code {exit_code:?}")]
    BootstrapFailed {
        step: BootstrapStep,
        exit_code: Option<i64>,
        output: String,
    },

    /// A bounded wait expired before the target became ready
    #[error("timed out after {timeout:?} waiting for {target}")]
    Timeout { target: String, timeout: Duration },
}

impl Error {
    /// Stable taxonomy kind, suitable for structured API error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidName(_) => "INVALID_NAME",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Engine(_) | Error::Pull { .. } => "ENGINE_ERROR",
            Error::CommandFailed { .. } => "COMMAND_FAILED",
            Error::BootstrapFailed { .. } => "BOOTSTRAP_FAILED",
            Error::Timeout { .. } => "TIMEOUT",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// True when a bollard error is a plain 404 from the engine
pub(crate) fn is_engine_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}
