use russh::{
    client::{self, Handle},
    keys::{self, PrivateKeyWithHashAlg},
    ChannelStream, Disconnect,
};
use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::error::ConnectionError;

/// How the server's host key is verified.
#[derive(Debug, Clone)]
pub enum HostKeyCheck {
    /// Accept whatever key the server presents
    NoCheck,
    /// `~/.ssh/known_hosts`
    DefaultKnownHosts,
    KnownHostsFile(PathBuf),
}

#[derive(Debug, Clone)]
pub enum Credentials {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

/// Everything needed to open an SSH session.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credentials: Credentials,
    pub host_key_check: HostKeyCheck,
    pub timeout: Duration,
}

pub struct HostKeyVerifier {
    host: String,
    port: u16,
    check: HostKeyCheck,
}

impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        let known = match &self.check {
            HostKeyCheck::NoCheck => {
                warn!("host key of {} not verified", self.host);
                Ok(true)
            }
            HostKeyCheck::DefaultKnownHosts => {
                keys::check_known_hosts(&self.host, self.port, server_public_key)
            }
            HostKeyCheck::KnownHostsFile(path) => {
                keys::check_known_hosts_path(&self.host, self.port, server_public_key, path)
            }
        };

        match known {
            Ok(true) => Ok(true),
            Ok(false) => {
                error!("host key of {}:{} is not known", self.host, self.port);
                Ok(false)
            }
            Err(err) => {
                error!("host key check for {} failed: {err}", self.host);
                Ok(false)
            }
        }
    }
}

pub type Session = Handle<HostKeyVerifier>;

/// Connects, authenticates and opens the `sftp` subsystem.
pub async fn open_sftp_channel(
    target: &Target,
) -> Result<(Session, ChannelStream<client::Msg>), ConnectionError> {
    let address = format!("{}:{}", target.host, target.port);

    tokio::time::timeout(target.timeout, async {
        let config = client::Config {
            inactivity_timeout: Some(target.timeout * 6),
            ..Default::default()
        };
        let verifier = HostKeyVerifier {
            host: target.host.clone(),
            port: target.port,
            check: target.host_key_check.clone(),
        };

        let mut session =
            client::connect(Arc::new(config), (target.host.as_str(), target.port), verifier)
                .await?;
        debug!("ssh connection to {address} established");

        authenticate(&mut session, target).await?;

        let channel = session.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        debug!("sftp subsystem started on {address}");

        Ok::<_, ConnectionError>((session, channel.into_stream()))
    })
    .await
    .map_err(|_| ConnectionError::Timeout(address.clone()))?
}

async fn authenticate(session: &mut Session, target: &Target) -> Result<(), ConnectionError> {
    let result = match &target.credentials {
        Credentials::Password(password) => {
            session
                .authenticate_password(target.user.as_str(), password.as_str())
                .await?
        }
        Credentials::KeyFile { path, passphrase } => {
            let key = keys::load_secret_key(path, passphrase.as_deref())?;
            let hash_alg = session.best_supported_rsa_hash().await?.flatten();
            session
                .authenticate_publickey(
                    target.user.as_str(),
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await?
        }
    };

    if !result.success() {
        return Err(ConnectionError::AuthFailed {
            user: target.user.clone(),
            host: target.host.clone(),
        });
    }

    debug!("authenticated as {}@{}", target.user, target.host);
    Ok(())
}

pub async fn disconnect(session: &Session) -> Result<(), russh::Error> {
    session
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
}
