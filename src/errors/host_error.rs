use std::io;

use thiserror::Error;

// SFTP status codes (draft-ietf-secsh-filexfer) surfaced by libssh2.
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;
const SFTP_FILE_ALREADY_EXISTS: i32 = 11;

pub type Result<T> = std::result::Result<T, HostError>;

/// Error taxonomy shared by every host operation. Variants are cloneable so
/// a recorded dial failure can be replayed verbatim during the backoff
/// window.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}: not found")]
    NotFound(String),

    #[error("{0}: already exists")]
    AlreadyExists(String),

    #[error("{0}: not supported on this host")]
    NotSupported(String),

    #[error("{host} not available: {cause}")]
    NotAvailable { host: String, cause: String },

    /// Non-zero exit; carries whatever output was captured before the
    /// process failed, so callers can inspect partial results.
    #[error("command exited with status {code}")]
    ExitStatus { code: i32, output: Vec<u8> },

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("ssh: {0}")]
    Ssh(String),
}

impl HostError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        HostError::InvalidArgs(message.into())
    }

    pub fn not_supported(op: impl Into<String>) -> Self {
        HostError::NotSupported(op.into())
    }

    pub fn not_available(host: impl Into<String>, cause: impl Into<String>) -> Self {
        HostError::NotAvailable {
            host: host.into(),
            cause: cause.into(),
        }
    }

    pub fn ssh(message: impl Into<String>) -> Self {
        HostError::Ssh(message.into())
    }

    /// Map an io error onto the taxonomy, keeping the path as context.
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => HostError::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => HostError::AlreadyExists(path.to_string()),
            _ => HostError::Io {
                path: path.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// Map a libssh2/SFTP error onto the taxonomy, keeping the path as
    /// context. Non-SFTP (transport) errors pass through as `Ssh`.
    pub fn from_ssh2(path: &str, err: ssh2::Error) -> Self {
        match err.code() {
            ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => HostError::NotFound(path.to_string()),
            ssh2::ErrorCode::SFTP(SFTP_FILE_ALREADY_EXISTS) => {
                HostError::AlreadyExists(path.to_string())
            }
            ssh2::ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => HostError::Io {
                path: path.to_string(),
                message: format!("permission denied: {}", err),
            },
            ssh2::ErrorCode::SFTP(_) => HostError::Io {
                path: path.to_string(),
                message: err.to_string(),
            },
            ssh2::ErrorCode::Session(_) => HostError::Ssh(err.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, HostError::NotSupported(_))
    }
}
