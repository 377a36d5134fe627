use std::{
    collections::HashMap,
    fs as stdfs, io,
    io::SeekFrom,
    path::{Path, PathBuf},
};

use dfs_client::{fs::SftpFileSystem, Configuration, DfsClient, Outcome};
use russh_sftp::protocol::{
    Attrs, Data, File, FileAttributes, Handle, Name, OpenFlags, Status, StatusCode, Version,
};
use tempfile::{tempdir, TempDir};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

/// SFTP server exporting a local directory.
struct Export {
    root: PathBuf,
    files: HashMap<String, fs::File>,
    dirs: HashMap<String, Option<Vec<File>>>,
    next: u64,
}

impl Export {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_owned(),
            files: HashMap::new(),
            dirs: HashMap::new(),
            next: 0,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn handle(&mut self) -> String {
        self.next += 1;
        self.next.to_string()
    }
}

fn status(err: io::Error) -> StatusCode {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => StatusCode::NoSuchFile,
        io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
        _ => StatusCode::Failure,
    }
}

fn ok(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_owned(),
        language_tag: "en-US".to_owned(),
    }
}

impl russh_sftp::server::Handler for Export {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn init(
        &mut self,
        _version: u32,
        _extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        Ok(Version::new())
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        let file = fs::OpenOptions::new()
            .read(pflags.contains(OpenFlags::READ))
            .write(pflags.contains(OpenFlags::WRITE))
            .create(pflags.contains(OpenFlags::CREATE))
            .truncate(pflags.contains(OpenFlags::TRUNCATE))
            .open(self.resolve(&filename))
            .await
            .map_err(status)?;

        let handle = self.handle();
        self.files.insert(handle.clone(), file);
        Ok(Handle { id, handle })
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        let file = self.files.remove(&handle);
        let dir = self.dirs.remove(&handle);

        match (file, dir) {
            (Some(mut file), _) => {
                file.flush().await.map_err(status)?;
                Ok(ok(id))
            }
            (None, Some(_)) => Ok(ok(id)),
            (None, None) => Err(StatusCode::Failure),
        }
    }

    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        let file = self.files.get_mut(&handle).ok_or(StatusCode::Failure)?;
        file.seek(SeekFrom::Start(offset)).await.map_err(status)?;

        let mut data = vec![0; len as usize];
        let read = file.read(&mut data).await.map_err(status)?;
        if read == 0 {
            return Err(StatusCode::Eof);
        }

        data.truncate(read);
        Ok(Data { id, data })
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        let file = self.files.get_mut(&handle).ok_or(StatusCode::Failure)?;
        file.seek(SeekFrom::Start(offset)).await.map_err(status)?;
        file.write_all(&data).await.map_err(status)?;
        Ok(ok(id))
    }

    async fn stat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let metadata = fs::metadata(self.resolve(&path)).await.map_err(status)?;
        Ok(Attrs {
            id,
            attrs: FileAttributes::from(&metadata),
        })
    }

    async fn lstat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let metadata = fs::symlink_metadata(self.resolve(&path))
            .await
            .map_err(status)?;
        Ok(Attrs {
            id,
            attrs: FileAttributes::from(&metadata),
        })
    }

    async fn opendir(&mut self, id: u32, path: String) -> Result<Handle, Self::Error> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(self.resolve(&path)).await.map_err(status)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(status)? {
            let metadata = entry.metadata().await.map_err(status)?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            entries.push(File {
                longname: filename.clone(),
                filename,
                attrs: FileAttributes::from(&metadata),
            });
        }

        let handle = self.handle();
        self.dirs.insert(handle.clone(), Some(entries));
        Ok(Handle { id, handle })
    }

    async fn readdir(&mut self, id: u32, handle: String) -> Result<Name, Self::Error> {
        match self.dirs.get_mut(&handle) {
            Some(entries) => match entries.take() {
                Some(files) => Ok(Name { id, files }),
                None => Err(StatusCode::Eof),
            },
            None => Err(StatusCode::Failure),
        }
    }

    async fn mkdir(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        fs::create_dir(self.resolve(&path)).await.map_err(status)?;
        Ok(ok(id))
    }

    async fn rmdir(&mut self, id: u32, path: String) -> Result<Status, Self::Error> {
        fs::remove_dir(self.resolve(&path)).await.map_err(status)?;
        Ok(ok(id))
    }

    async fn remove(&mut self, id: u32, filename: String) -> Result<Status, Self::Error> {
        fs::remove_file(self.resolve(&filename))
            .await
            .map_err(status)?;
        Ok(ok(id))
    }
}

/// A client talking SFTP to an in-process server rooted at `remote`.
async fn connect(remote: &TempDir) -> anyhow::Result<DfsClient> {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    russh_sftp::server::run(server_end, Export::new(remote.path())).await;

    let fs = SftpFileSystem::from_stream(client_end, "sftp://localhost:22").await?;
    Ok(DfsClient::with_filesystem(Configuration::new(), Box::new(fs))?)
}

#[tokio::test]
async fn round_trip_over_sftp() -> anyhow::Result<()> {
    let remote = tempdir()?;
    let local = tempdir()?;
    let client = connect(&remote).await?;

    let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    let source = local.path().join("archive.tar");
    stdfs::write(&source, &payload)?;

    let outcome = client
        .upload(&source.display().to_string(), "/backups/daily")
        .await?;
    assert_eq!(
        outcome,
        Outcome::Uploaded {
            path: "/backups/daily/archive.tar".to_owned(),
            bytes: 50_000
        }
    );
    assert_eq!(
        stdfs::read(remote.path().join("backups/daily/archive.tar"))?,
        payload
    );

    let out = tempdir()?;
    let outcome = client
        .download_into("/backups/daily/archive.tar", out.path())
        .await?;
    assert!(matches!(outcome, Outcome::Downloaded { bytes: 50_000, .. }));
    assert_eq!(stdfs::read(out.path().join("archive.tar"))?, payload);

    client.close().await?;
    Ok(())
}

#[tokio::test]
async fn upload_is_idempotent_over_sftp() -> anyhow::Result<()> {
    let remote = tempdir()?;
    let local = tempdir()?;
    let client = connect(&remote).await?;

    let source = local.path().join("a.txt");
    stdfs::write(&source, b"one")?;
    client.upload(&source.display().to_string(), "/in/").await?;

    stdfs::write(&source, b"two")?;
    let outcome = client.upload(&source.display().to_string(), "/in").await?;

    assert_eq!(outcome, Outcome::AlreadyExists("/in/a.txt".to_owned()));
    assert_eq!(stdfs::read(remote.path().join("in/a.txt"))?, b"one");

    client.close().await?;
    Ok(())
}

#[tokio::test]
async fn recursive_delete_over_sftp() -> anyhow::Result<()> {
    let remote = tempdir()?;
    stdfs::create_dir_all(remote.path().join("logs/2024/01"))?;
    stdfs::write(remote.path().join("logs/2024/01/app.log"), b"x")?;
    stdfs::write(remote.path().join("logs/top.log"), b"y")?;
    let client = connect(&remote).await?;

    assert_eq!(client.delete("/logs").await?, Outcome::Deleted("/logs".to_owned()));
    assert!(!remote.path().join("logs").exists());
    assert_eq!(
        client.delete("/logs").await?,
        Outcome::DoesNotExist("/logs".to_owned())
    );

    client.close().await?;
    Ok(())
}

#[tokio::test]
async fn mkdir_over_sftp() -> anyhow::Result<()> {
    let remote = tempdir()?;
    stdfs::write(remote.path().join("plain"), b"")?;
    let client = connect(&remote).await?;

    assert_eq!(
        client.make_directory("/x/y/z").await?,
        Outcome::Created("/x/y/z".to_owned())
    );
    assert!(remote.path().join("x/y/z").is_dir());
    assert_eq!(
        client.make_directory("/x/y").await?,
        Outcome::AlreadyExists("/x/y".to_owned())
    );
    assert!(client.make_directory("/plain/sub").await.is_err());
    assert_eq!(
        client.delete("/plain/sub").await?,
        Outcome::DoesNotExist("/plain/sub".to_owned())
    );

    client.close().await?;
    Ok(())
}

#[tokio::test]
async fn download_of_missing_file_over_sftp() -> anyhow::Result<()> {
    let remote = tempdir()?;
    let client = connect(&remote).await?;
    let out = tempdir()?;

    assert_eq!(
        client.download_into("/missing.bin", out.path()).await?,
        Outcome::DoesNotExist("/missing.bin".to_owned())
    );

    client.close().await?;
    Ok(())
}
