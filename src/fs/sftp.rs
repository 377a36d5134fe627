use russh_sftp::{
    client::{error::Error as SftpError, SftpSession},
    protocol::StatusCode,
};
use std::{io, path::PathBuf, time::Duration};
use tokio::io::{AsyncRead, AsyncWrite};
use url::Url;

use super::{
    ssh::{self, Credentials, HostKeyCheck, Target},
    FileStatus, FileSystem, InputStream, OutputStream,
};
use crate::{config::Configuration, error::ConnectionError, utils};

pub const SFTP_HOST_PORT_KEY: &str = "fs.sftp.host.port";
pub const SFTP_HOST_PORT_DEFAULT: u16 = 22;
/// Suffixed with `.<host>`.
pub const SFTP_USER_PREFIX: &str = "fs.sftp.user";
/// Suffixed with `.<host>.<user>`.
pub const SFTP_PASSWORD_PREFIX: &str = "fs.sftp.password";
pub const SFTP_KEYFILE_KEY: &str = "fs.sftp.keyfile";
pub const SFTP_KEYFILE_PASSPHRASE_KEY: &str = "fs.sftp.keyfile.passphrase";
pub const SFTP_KNOWN_HOSTS_KEY: &str = "fs.sftp.known_hosts";
pub const SFTP_STRICT_HOST_KEY_CHECKING_KEY: &str = "fs.sftp.strict.host.key.checking";
/// Seconds allowed for connecting and authenticating.
pub const SFTP_TIMEOUT_KEY: &str = "fs.sftp.timeout";
pub const SFTP_TIMEOUT_DEFAULT: u64 = 10;

/// Filesystem reached through the `sftp` subsystem of an SSH server, for
/// `sftp://` URIs.
pub struct SftpFileSystem {
    sftp: SftpSession,
    session: Option<ssh::Session>,
    uri: String,
}

impl SftpFileSystem {
    /// Opens an SSH session described by `url` and `conf`.
    pub async fn connect(conf: &Configuration, url: &Url) -> Result<Self, ConnectionError> {
        let target = target(conf, url)?;
        let (session, stream) = ssh::open_sftp_channel(&target).await?;

        let sftp = SftpSession::new(stream).await?;

        info!("connected to {}@{}:{}", target.user, target.host, target.port);

        Ok(Self {
            sftp,
            session: Some(session),
            uri: format!("sftp://{}:{}", target.host, target.port),
        })
    }

    /// Speaks SFTP over an already established stream.
    pub async fn from_stream<S>(stream: S, uri: &str) -> Result<Self, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Ok(Self {
            sftp: SftpSession::new(stream).await?,
            session: None,
            uri: uri.to_owned(),
        })
    }
}

fn target(conf: &Configuration, url: &Url) -> Result<Target, ConnectionError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConnectionError::InvalidUri {
            uri: url.to_string(),
            reason: "missing host".to_owned(),
        })?
        .to_owned();

    let port = match url.port() {
        Some(port) => port,
        None => {
            let port = conf.get_u64(SFTP_HOST_PORT_KEY, SFTP_HOST_PORT_DEFAULT.into())?;
            u16::try_from(port).map_err(|_| ConnectionError::InvalidValue {
                key: SFTP_HOST_PORT_KEY.to_owned(),
                value: port.to_string(),
            })?
        }
    };

    let user = Some(url.username())
        .filter(|u| !u.is_empty())
        .map(str::to_owned)
        .or_else(|| conf.get(&format!("{SFTP_USER_PREFIX}.{host}")))
        .or_else(|| std::env::var("USER").ok())
        .ok_or_else(|| ConnectionError::NoUser(host.clone()))?;

    let password = url
        .password()
        .map(str::to_owned)
        .or_else(|| conf.get(&format!("{SFTP_PASSWORD_PREFIX}.{host}.{user}")));

    let credentials = match (password, conf.get(SFTP_KEYFILE_KEY)) {
        (Some(password), _) => Credentials::Password(password),
        (None, Some(path)) => Credentials::KeyFile {
            path: PathBuf::from(path),
            passphrase: conf.get(SFTP_KEYFILE_PASSPHRASE_KEY),
        },
        (None, None) => return Err(ConnectionError::NoCredentials { user, host }),
    };

    let host_key_check = if !conf.get_bool(SFTP_STRICT_HOST_KEY_CHECKING_KEY, true)? {
        HostKeyCheck::NoCheck
    } else if let Some(path) = conf.get(SFTP_KNOWN_HOSTS_KEY) {
        HostKeyCheck::KnownHostsFile(PathBuf::from(path))
    } else {
        HostKeyCheck::DefaultKnownHosts
    };

    let timeout = Duration::from_secs(conf.get_u64(SFTP_TIMEOUT_KEY, SFTP_TIMEOUT_DEFAULT)?);

    Ok(Target {
        host,
        port,
        user,
        credentials,
        host_key_check,
        timeout,
    })
}

fn into_io(err: SftpError) -> io::Error {
    let kind = match &err {
        SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile => {
            io::ErrorKind::NotFound
        }
        SftpError::Timeout => io::ErrorKind::TimedOut,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err.to_string())
}

fn is_missing(err: &SftpError) -> bool {
    matches!(err, SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile)
}

impl SftpFileSystem {
    async fn remove_tree(&self, root: &str) -> io::Result<()> {
        // (path, children already removed)
        let mut stack = vec![(root.to_owned(), false)];

        while let Some((dir, emptied)) = stack.pop() {
            if emptied {
                self.sftp.remove_dir(dir.as_str()).await.map_err(into_io)?;
                continue;
            }

            stack.push((dir.clone(), true));
            for entry in self.sftp.read_dir(dir.as_str()).await.map_err(into_io)? {
                let name = entry.file_name();
                if name == "." || name == ".." {
                    continue;
                }

                let child = utils::join(&dir, &name);
                if entry.metadata().is_dir() {
                    stack.push((child, false));
                } else {
                    self.sftp.remove_file(child).await.map_err(into_io)?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl FileSystem for SftpFileSystem {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn get_file_status(&self, path: &str) -> io::Result<Option<FileStatus>> {
        match self.sftp.metadata(path).await {
            Ok(metadata) => Ok(Some(FileStatus {
                is_dir: metadata.is_dir(),
                len: metadata.size.unwrap_or(0),
            })),
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(into_io(err)),
        }
    }

    async fn create(&self, path: &str) -> io::Result<OutputStream> {
        if let Some((parent, _)) = path.rsplit_once(utils::SEPARATOR) {
            if !parent.is_empty() {
                self.mkdirs(parent).await?;
            }
        }

        debug!("creating {path} on {}", self.uri);
        let file = self.sftp.create(path).await.map_err(into_io)?;
        Ok(Box::new(file))
    }

    async fn open(&self, path: &str) -> io::Result<Box<dyn InputStream>> {
        if let Some(status) = self.get_file_status(path).await? {
            if status.is_dir {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{path} is a directory"),
                ));
            }
        }

        debug!("opening {path} on {}", self.uri);
        let file = self.sftp.open(path).await.map_err(into_io)?;
        Ok(Box::new(file))
    }

    async fn delete(&self, path: &str, recursive: bool) -> io::Result<bool> {
        let Some(status) = self.get_file_status(path).await? else {
            return Ok(false);
        };

        match (status.is_dir, recursive) {
            (true, true) => self.remove_tree(path).await?,
            (true, false) => self.sftp.remove_dir(path).await.map_err(into_io)?,
            (false, _) => self.sftp.remove_file(path).await.map_err(into_io)?,
        }

        Ok(true)
    }

    async fn mkdirs(&self, path: &str) -> io::Result<bool> {
        for dir in utils::ancestors_and_self(path) {
            match self.get_file_status(&dir).await? {
                Some(status) if status.is_dir => (),
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{dir} exists and is not a directory"),
                    ))
                }
                None => {
                    debug!("creating directory {dir} on {}", self.uri);
                    self.sftp.create_dir(dir).await.map_err(into_io)?;
                }
            }
        }

        Ok(true)
    }

    async fn close(&mut self) -> io::Result<()> {
        debug!("closing {}", self.uri);
        self.sftp.close().await.map_err(into_io)?;

        if let Some(session) = self.session.take() {
            ssh::disconnect(&session)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        }

        Ok(())
    }
}
