use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tokio::fs;
use url::Url;

use super::{FileStatus, FileSystem, InputStream, OutputStream};
use crate::error::ConnectionError;

/// Filesystem on the local disk, for `file://` URIs.
///
/// Paths are resolved beneath `root`; `file:///` addresses the whole disk.
pub struct LocalFileSystem {
    root: PathBuf,
    uri: String,
}

impl LocalFileSystem {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        let uri = Url::from_directory_path(&root)
            .map(String::from)
            .unwrap_or_else(|()| format!("file://{}", root.display()));

        Self { root, uri }
    }

    pub(crate) fn from_url(url: &Url) -> Result<Self, ConnectionError> {
        let root = url
            .to_file_path()
            .map_err(|()| ConnectionError::InvalidUri {
                uri: url.to_string(),
                reason: "not a local path".to_owned(),
            })?;

        match std::fs::metadata(&root) {
            Ok(metadata) if metadata.is_dir() => Ok(Self {
                root,
                uri: url.to_string(),
            }),
            Ok(_) => Err(ConnectionError::LocalRoot {
                path: root,
                source: io::Error::new(io::ErrorKind::Other, "not a directory"),
            }),
            Err(source) => Err(ConnectionError::LocalRoot { path: root, source }),
        }
    }

    /// Maps a remote path onto the disk. `..` never climbs above the root.
    fn resolve(&self, path: &str) -> PathBuf {
        let mut relative = PathBuf::new();

        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::ParentDir => {
                    relative.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => (),
            }
        }

        self.root.join(relative)
    }
}

/// Nothing exists at the path, including the case of a file standing where a
/// parent directory should be.
fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("{} is a directory", path.display()),
    )
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn get_file_status(&self, path: &str) -> io::Result<Option<FileStatus>> {
        match fs::metadata(self.resolve(path)).await {
            Ok(metadata) => Ok(Some(FileStatus {
                is_dir: metadata.is_dir(),
                len: metadata.len(),
            })),
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, path: &str) -> io::Result<OutputStream> {
        let local = self.resolve(path);

        if fs::metadata(&local).await.is_ok_and(|m| m.is_dir()) {
            return Err(is_a_directory(&local));
        }
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }

        debug!("creating {}", local.display());
        Ok(Box::new(fs::File::create(&local).await?))
    }

    async fn open(&self, path: &str) -> io::Result<Box<dyn InputStream>> {
        let local = self.resolve(path);

        if fs::metadata(&local).await?.is_dir() {
            return Err(is_a_directory(&local));
        }

        debug!("opening {}", local.display());
        Ok(Box::new(fs::File::open(&local).await?))
    }

    async fn delete(&self, path: &str, recursive: bool) -> io::Result<bool> {
        let local = self.resolve(path);

        let metadata = match fs::symlink_metadata(&local).await {
            Ok(metadata) => metadata,
            Err(err) if is_missing(&err) => return Ok(false),
            Err(err) => return Err(err),
        };

        if local == self.root {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "refusing to delete the filesystem root",
            ));
        }

        match (metadata.is_dir(), recursive) {
            (true, true) => fs::remove_dir_all(&local).await?,
            (true, false) => fs::remove_dir(&local).await?,
            (false, _) => fs::remove_file(&local).await?,
        }

        Ok(true)
    }

    async fn mkdirs(&self, path: &str) -> io::Result<bool> {
        let local = self.resolve(path);

        // A file ancestor must fail with its own path.
        for ancestor in local.ancestors() {
            match fs::metadata(ancestor).await {
                Ok(metadata) if metadata.is_dir() => break,
                Ok(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", ancestor.display()),
                    ))
                }
                Err(_) => (),
            }
        }

        fs::create_dir_all(&local).await?;
        Ok(true)
    }

    async fn close(&mut self) -> io::Result<()> {
        debug!("closing {}", self.uri);
        Ok(())
    }
}
