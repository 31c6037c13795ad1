//! Error type shared by both pipelines.

use std::{fmt, path::PathBuf, time::Duration};

use thiserror::Error;

/// Status returned by the OpenNI runtime. `0` is success.
pub type Status = u32;

/// Status reported when no configuration file could be found.
pub const STATUS_NODE_NOT_FOUND: Status = 0x1000c;

/// Status reported when a node lacks a required capability.
pub const STATUS_UNSUPPORTED: Status = 1;

/// Status reported for failures that have no SDK status of their own.
pub const STATUS_ERROR: Status = 0x10001;

/// A failed call into the SDK: its status code and the SDK's description of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkError {
    pub status: Status,
    pub message: String,
}
impl SdkError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
impl std::error::Error for SdkError {}

pub type SdkResult<T> = std::result::Result<T, SdkError>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{operation} failed: {source}")]
    Sdk {
        operation: &'static str,
        #[source]
        source: SdkError,
    },
    #[error("could not find {}", display_paths(.candidates))]
    ConfigNotFound { candidates: Vec<PathBuf> },
    #[error("open failed: {detail}")]
    ConfigLoad { status: Status, detail: String },
    #[error("{0}")]
    Unsupported(&'static str),
    #[error("{0} pipeline is not initialized")]
    NotInitialized(&'static str),
    #[error("pixel ({x}, {y}) is outside the {width}x{height} frame")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("no update within {0:?}")]
    Timeout(Duration),
}

impl Error {
    pub(crate) fn sdk(operation: &'static str, source: SdkError) -> Self {
        Error::Sdk { operation, source }
    }

    /// Integer status of this error, `0` is never returned. SDK failures keep the SDK's own status.
    pub fn status(&self) -> Status {
        match self {
            Error::Sdk { source, .. } => source.status,
            Error::ConfigNotFound { .. } => STATUS_NODE_NOT_FOUND,
            Error::ConfigLoad { status, .. } => *status,
            Error::Unsupported(_) => STATUS_UNSUPPORTED,
            Error::NotInitialized(_) | Error::OutOfBounds { .. } | Error::Timeout(_) => {
                STATUS_ERROR
            }
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(" nor ")
}

pub type Result<T> = std::result::Result<T, Error>;

/// Converts a failed SDK call of `operation` into an [`Error`] and logs it as `"<operation> failed: <status>"`.
pub(crate) fn check<T>(result: SdkResult<T>, operation: &'static str) -> Result<T> {
    result.map_err(|source| {
        let err = Error::sdk(operation, source);
        log::error!("{err}");
        err
    })
}
