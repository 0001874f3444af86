//! Error types for the offline cache.
//!
//! Each layer reports its own failures; callers decide tolerance. The
//! registry never swallows a storage failure, the installer turns a mandatory
//! asset failure into `InstallError`, and the fetch policy recovers from
//! everything locally.

use thiserror::Error;

use crate::request::Identifier;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage refused the operation (quota exceeded, storage disabled).
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt entry for {identifier}: {message}")]
    Corrupt { identifier: String, message: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum TransportError {
    /// No response could be obtained (DNS, refused, reset, offline).
    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::InvalidRequest {
                message: e.to_string(),
            }
        } else {
            TransportError::Network {
                message: e.to_string(),
            }
        }
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("mandatory asset {identifier} could not be installed: {reason}")]
    MandatoryAsset { identifier: Identifier, reason: String },

    #[error("store failure during install: {0}")]
    Storage(#[from] StoreError),
}

pub type InstallResult<T> = std::result::Result<T, InstallError>;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("cannot activate: version has not been installed")]
    NotInstalled,

    #[error("cannot {event} while {state}")]
    InvalidState {
        event: &'static str,
        state: &'static str,
    },

    #[error("installation failed: {0}")]
    InstallFailed(#[from] InstallError),

    #[error("store failure during activation: {0}")]
    Store(#[from] StoreError),
}

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid application origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("could not find {0} directory")]
    MissingDirectory(&'static str),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable {
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "storage unavailable: quota exceeded");
    }

    #[test]
    fn test_install_error_wraps_store_error() {
        let err: InstallError = StoreError::Unavailable {
            message: "disabled".to_string(),
        }
        .into();
        assert!(matches!(err, InstallError::Storage(_)));
        assert!(err.to_string().contains("disabled"));
    }
}
