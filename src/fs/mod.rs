//! Remote filesystem handles.
//!
//! A [`FileSystem`] is the live connection every remote operation goes
//! through. [`get`] picks the implementation from the scheme of
//! `fs.defaultFS`, the way a Hadoop client does.

mod local;
mod sftp;
mod ssh;

use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::{config::Configuration, error::ConnectionError};

pub use local::LocalFileSystem;
pub use sftp::SftpFileSystem;

pub const FS_DEFAULT_NAME_KEY: &str = "fs.defaultFS";
/// Deprecated spelling of [`FS_DEFAULT_NAME_KEY`], still honoured.
pub const FS_DEFAULT_NAME_DEPRECATED_KEY: &str = "fs.default.name";
pub const FS_DEFAULT_NAME_DEFAULT: &str = "file:///";

/// Kind and size of a remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub is_dir: bool,
    pub len: u64,
}

/// A readable stream that can be released explicitly.
#[async_trait]
pub trait InputStream: AsyncRead + Send + Unpin {
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl InputStream for tokio::fs::File {}

#[async_trait]
impl InputStream for russh_sftp::client::fs::File {
    async fn close(&mut self) -> io::Result<()> {
        self.shutdown().await
    }
}

/// A writable stream; `shutdown` flushes and releases it.
pub type OutputStream = Box<dyn AsyncWrite + Send + Unpin>;

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// The URI this handle was created for.
    fn uri(&self) -> &str;

    /// Returns `None` when nothing exists at `path`.
    async fn get_file_status(&self, path: &str) -> io::Result<Option<FileStatus>>;

    async fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.get_file_status(path).await?.is_some())
    }

    /// Creates or truncates a file, creating missing parent directories.
    async fn create(&self, path: &str) -> io::Result<OutputStream>;

    /// Opens a file for reading. Fails on directories.
    async fn open(&self, path: &str) -> io::Result<Box<dyn InputStream>>;

    /// Removes `path`. Non-empty directories need `recursive`.
    /// Returns `false` when there was nothing to remove.
    async fn delete(&self, path: &str, recursive: bool) -> io::Result<bool>;

    /// Creates a directory and its missing ancestors.
    async fn mkdirs(&self, path: &str) -> io::Result<bool>;

    /// Releases the connection. No further calls are made afterwards.
    async fn close(&mut self) -> io::Result<()>;
}

/// Builds the filesystem named by `fs.defaultFS`.
pub async fn get(conf: &Configuration) -> Result<Box<dyn FileSystem>, ConnectionError> {
    let uri = conf
        .get(FS_DEFAULT_NAME_KEY)
        .or_else(|| conf.get(FS_DEFAULT_NAME_DEPRECATED_KEY))
        .unwrap_or_else(|| FS_DEFAULT_NAME_DEFAULT.to_owned());

    let url = Url::parse(uri.trim()).map_err(|e| ConnectionError::InvalidUri {
        uri: uri.clone(),
        reason: e.to_string(),
    })?;

    debug!("connecting to {url}");

    match url.scheme() {
        "file" => Ok(Box::new(LocalFileSystem::from_url(&url)?)),
        "sftp" => Ok(Box::new(SftpFileSystem::connect(conf, &url).await?)),
        scheme => Err(ConnectionError::UnsupportedScheme(scheme.to_owned())),
    }
}
