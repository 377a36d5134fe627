//! The four operations against the remote filesystem.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    config::{ConfigLocation, Configuration},
    error::{ConnectionError, Error, Result},
    fs::{self, FileSystem, InputStream},
    utils,
};

pub const IO_FILE_BUFFER_SIZE_KEY: &str = "io.file.buffer.size";
pub const IO_FILE_BUFFER_SIZE_DEFAULT: u64 = 4096;
/// Largest accepted copy buffer, 64 MiB.
pub const IO_FILE_BUFFER_SIZE_MAX: u64 = 64 * 1024 * 1024;

/// What an operation did.
///
/// `AlreadyExists` and `DoesNotExist` mean the target was already in the
/// requested state and nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Uploaded { path: String, bytes: u64 },
    Downloaded { path: PathBuf, bytes: u64 },
    Deleted(String),
    Created(String),
    AlreadyExists(String),
    DoesNotExist(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploaded { path, bytes } => write!(f, "Added {path} ({bytes} bytes)"),
            Self::Downloaded { path, bytes } => {
                write!(f, "Read into {} ({bytes} bytes)", path.display())
            }
            Self::Deleted(path) => write!(f, "Deleted {path}"),
            Self::Created(path) => write!(f, "Created {path}"),
            Self::AlreadyExists(path) => write!(f, "{path} already exists"),
            Self::DoesNotExist(path) => write!(f, "{path} does not exist"),
        }
    }
}

/// Client bound to one remote filesystem handle.
///
/// The handle stays open until [`close`](DfsClient::close), which consumes
/// the client.
pub struct DfsClient {
    conf: Configuration,
    fs: Box<dyn FileSystem>,
    buffer_size: usize,
}

impl DfsClient {
    /// Loads both site files of `location` and connects to `fs.defaultFS`.
    pub async fn new(location: &ConfigLocation) -> Result<Self> {
        let conf = location.load()?;
        Self::connect(conf).await
    }

    pub async fn connect(conf: Configuration) -> Result<Self> {
        let fs = fs::get(&conf).await?;
        Self::with_filesystem(conf, fs)
    }

    /// Wraps an already open handle.
    pub fn with_filesystem(conf: Configuration, fs: Box<dyn FileSystem>) -> Result<Self> {
        let configured = conf.get_u64(IO_FILE_BUFFER_SIZE_KEY, IO_FILE_BUFFER_SIZE_DEFAULT)?;
        let buffer_size = usize::try_from(configured)
            .ok()
            .filter(|_| configured <= IO_FILE_BUFFER_SIZE_MAX)
            .ok_or_else(|| ConnectionError::InvalidValue {
                key: IO_FILE_BUFFER_SIZE_KEY.to_owned(),
                value: configured.to_string(),
            })?
            .max(1);

        debug!("using {} with a {buffer_size} byte copy buffer", fs.uri());

        Ok(Self {
            conf,
            fs,
            buffer_size,
        })
    }

    pub fn configuration(&self) -> &Configuration {
        &self.conf
    }

    pub fn filesystem(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Copies the local file `source` into the remote directory `dest`.
    ///
    /// The remote name is the part of `source` after its last `/`. An existing
    /// remote object is never overwritten.
    pub async fn upload(&self, source: &str, dest: &str) -> Result<Outcome> {
        let path = utils::upload_destination(source, dest);
        info!("adding file to {path}");

        if self.remote_exists(&path).await? {
            info!("file {path} already exists");
            return Ok(Outcome::AlreadyExists(path));
        }

        let input = tokio::fs::File::open(source)
            .await
            .map_err(|e| Error::io("open", source, e))?;
        let output = self
            .fs
            .create(&path)
            .await
            .map_err(|e| Error::io("create", path.as_str(), e))?;

        let bytes = transfer(Box::new(input), output, self.buffer_size)
            .await
            .map_err(|e| Error::io("copy", path.as_str(), e))?;

        info!("added {path} ({bytes} bytes)");
        Ok(Outcome::Uploaded { path, bytes })
    }

    /// Copies the remote file `path` into the current working directory.
    pub async fn download(&self, path: &str) -> Result<Outcome> {
        self.download_into(path, ".").await
    }

    /// Copies the remote file `path` into `dir`, named after the part of
    /// `path` after its last `/`.
    pub async fn download_into<P: AsRef<Path>>(&self, path: &str, dir: P) -> Result<Outcome> {
        if !self.remote_exists(path).await? {
            info!("file {path} does not exist");
            return Ok(Outcome::DoesNotExist(path.to_owned()));
        }

        let input = self
            .fs
            .open(path)
            .await
            .map_err(|e| Error::io("open", path, e))?;

        let local = dir.as_ref().join(utils::file_name(path));
        let output = match tokio::fs::File::create(&local).await {
            Ok(file) => file,
            Err(e) => {
                release(input).await;
                return Err(Error::io("create", local.display().to_string(), e));
            }
        };

        let bytes = transfer(input, Box::new(output), self.buffer_size)
            .await
            .map_err(|e| Error::io("copy", path, e))?;

        info!("read {path} into {} ({bytes} bytes)", local.display());
        Ok(Outcome::Downloaded { path: local, bytes })
    }

    /// Removes `path`, including everything beneath it.
    pub async fn delete(&self, path: &str) -> Result<Outcome> {
        if !self.remote_exists(path).await? {
            info!("file {path} does not exist");
            return Ok(Outcome::DoesNotExist(path.to_owned()));
        }

        self.fs
            .delete(path, true)
            .await
            .map_err(|e| Error::io("delete", path, e))?;

        info!("deleted {path}");
        Ok(Outcome::Deleted(path.to_owned()))
    }

    /// Creates `path` and any missing ancestors.
    pub async fn make_directory(&self, path: &str) -> Result<Outcome> {
        match self
            .fs
            .get_file_status(path)
            .await
            .map_err(|e| Error::io("stat", path, e))?
        {
            Some(status) => {
                if !status.is_dir {
                    warn!("{path} exists but is not a directory");
                }
                info!("dir {path} already exists");
                Ok(Outcome::AlreadyExists(path.to_owned()))
            }
            None => {
                self.fs
                    .mkdirs(path)
                    .await
                    .map_err(|e| Error::io("mkdir", path, e))?;

                info!("created {path}");
                Ok(Outcome::Created(path.to_owned()))
            }
        }
    }

    /// Releases the remote handle.
    pub async fn close(mut self) -> Result<()> {
        let uri = self.fs.uri().to_owned();
        self.fs
            .close()
            .await
            .map_err(|e| Error::io("close", uri, e))
    }

    async fn remote_exists(&self, path: &str) -> Result<bool> {
        self.fs
            .exists(path)
            .await
            .map_err(|e| Error::io("stat", path, e))
    }
}

/// Copies `input` into `output` and closes both, whether or not the copy
/// succeeded. The first error wins.
async fn transfer(
    mut input: Box<dyn InputStream>,
    mut output: Box<dyn AsyncWrite + Send + Unpin>,
    buffer_size: usize,
) -> io::Result<u64> {
    let copied = utils::copy(&mut input, &mut output, buffer_size).await;

    let closed_out = output.shutdown().await;
    let closed_in = input.close().await;

    if copied.is_err() {
        if let Err(e) = &closed_out {
            warn!("failed to close output stream: {e}");
        }
        if let Err(e) = &closed_in {
            warn!("failed to close input stream: {e}");
        }
    }

    let bytes = copied?;
    closed_out?;
    closed_in?;
    Ok(bytes)
}

async fn release(mut input: Box<dyn InputStream>) {
    if let Err(e) = input.close().await {
        warn!("failed to close input stream: {e}");
    }
}
