use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors surfaced by the client.
///
/// Soft outcomes (a target that already exists, or is already gone) are not
/// errors; see [`Outcome`](crate::client::Outcome).
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration directory or one of its files failed a check
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The configuration could not be turned into a live filesystem handle
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// An open, read, write, delete or mkdir call failed
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io<P: Into<String>>(op: &'static str, path: P, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// The condition a configuration path failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("does not exist")]
    Missing,
    #[error("must be a directory")]
    NotADirectory,
    #[error("must be a file")]
    NotAFile,
    #[error("is not readable")]
    Unreadable,
}

/// A configuration path that failed validation.
#[derive(Debug, Error)]
#[error("The argument {} {failure}", .path.display())]
pub struct ValidationError {
    pub path: PathBuf,
    pub failure: ValidationFailure,
}

impl ValidationError {
    pub(crate) fn new<P: Into<PathBuf>>(path: P, failure: ValidationFailure) -> Self {
        Self {
            path: path.into(),
            failure,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to read {}: {source}", .path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: quick_xml::de::DeError,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("invalid filesystem URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("no filesystem for scheme \"{0}\"")]
    UnsupportedScheme(String),
    #[error("local root {}: {source}", .path.display())]
    LocalRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no user configured for {0}")]
    NoUser(String),
    #[error("no password or key file configured for {user}@{host}")]
    NoCredentials { user: String, host: String },
    #[error("authentication failed for {user}@{host}")]
    AuthFailed { user: String, host: String },
    #[error("timed out connecting to {0}")]
    Timeout(String),
    #[error("SSH: {0}")]
    Ssh(#[from] russh::Error),
    #[error("SSH key: {0}")]
    Key(#[from] russh::keys::Error),
    #[error("SFTP: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
