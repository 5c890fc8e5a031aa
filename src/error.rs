use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for workspace operations.
///
/// The first block is user-facing: these map 1:1 onto the error payloads the
/// browser client understands. Everything below is infrastructure and is
/// reported to clients only as a generic failure (see [`Error::client_message`]).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid action")]
    InvalidAction,

    #[error("Invalid type")]
    InvalidType,

    #[error("Path does not exist")]
    PathNotFound,

    #[error("Duplicate name")]
    DuplicateName,

    #[error("Permission denied for command")]
    PermissionDenied,

    #[error("File operation failed")]
    FileOperation,

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("no running pod for workload {0}")]
    NoRunningInstance(String),

    #[error("workload {0} not found")]
    WorkloadNotFound(String),

    #[error("no free node port in [{min}, {max})")]
    PortsExhausted { min: i32, max: i32 },

    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("cluster api error: {0}")]
    Cluster(#[from] kube::Error),

    #[error("edge shell error: {0}")]
    Edge(String),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Message published to the client's error destination.
    ///
    /// User-facing kinds keep their text; infrastructure failures are logged
    /// in full by the caller and collapsed here so internal diagnostics never
    /// reach the browser.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidAction
            | Error::InvalidType
            | Error::PathNotFound
            | Error::DuplicateName
            | Error::PermissionDenied
            | Error::FileOperation => format!("File system error: {self}"),
            _ => "Internal Server Error".to_string(),
        }
    }
}
