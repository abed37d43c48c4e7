//! Outbound SSH connector
//!
//! Establishes one authenticated connection per tailed file.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::Disconnect;
use russh_keys::key::PublicKey;

use rt_core::traits::{Connector, RemoteSession, RemoteShell};
use rt_core::types::{Credential, ServerTarget};
use rt_core::TailError;

use crate::shell::SshShell;

/// Interval between keepalive probes on an otherwise idle connection.
///
/// `tail -f` can stay silent for hours, so idleness alone is never treated
/// as failure; only a peer that stops answering keepalives is dropped.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered keepalives before the connection is considered dead
const KEEPALIVE_MAX: usize = 3;

/// Opens SSH connections with password or public key authentication
pub struct SshConnector {
    /// Limit on TCP connect + handshake
    connect_timeout: Duration,
    /// Shared client configuration
    config: Arc<Config>,
}

impl SshConnector {
    /// Create a connector with the given connect timeout
    pub fn new(connect_timeout: Duration) -> Self {
        let config = Config {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            keepalive_max: KEEPALIVE_MAX,
            ..Default::default()
        };

        Self {
            connect_timeout,
            config: Arc::new(config),
        }
    }

    async fn authenticate(
        handle: &mut Handle<HostKeyCheck>,
        target: &ServerTarget,
        host: &str,
    ) -> Result<(), TailError> {
        let auth_failed = |e: russh::Error| TailError::Connect {
            host: host.to_string(),
            reason: format!("authentication error: {}", e),
        };

        let authenticated = match &target.credential {
            Credential::Password(password) => handle
                .authenticate_password(&target.user, password)
                .await
                .map_err(auth_failed)?,
            Credential::PrivateKey { path, passphrase } => {
                let key = russh_keys::load_secret_key(path, passphrase.as_deref()).map_err(
                    |e| TailError::Connect {
                        host: host.to_string(),
                        reason: format!("failed to load key {}: {}", path.display(), e),
                    },
                )?;
                handle
                    .authenticate_publickey(&target.user, Arc::new(key))
                    .await
                    .map_err(auth_failed)?
            }
        };

        if !authenticated {
            return Err(TailError::Auth {
                host: host.to_string(),
                user: target.user.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn RemoteSession>, TailError> {
        let host = target.address();
        let handler = HostKeyCheck {
            host: host.clone(),
            expected_host_key: target.host_key.clone(),
        };

        tracing::debug!(host = %host, "Connecting");
        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(Arc::clone(&self.config), host.clone(), handler),
        )
        .await
        .map_err(|_| TailError::Timeout {
            host: host.clone(),
            after: self.connect_timeout,
        })?
        .map_err(|e| TailError::Connect {
            host: host.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(host = %host, user = %target.user, "Authenticating");
        Self::authenticate(&mut handle, target, &host).await?;
        tracing::info!(host = %host, "Connected");

        Ok(Box::new(SshSession { host, handle }))
    }
}

/// An authenticated SSH connection
pub struct SshSession {
    host: String,
    handle: Handle<HostKeyCheck>,
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn new_shell(&mut self) -> Result<Box<dyn RemoteShell>, TailError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TailError::Session {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(SshShell::new(self.host.clone(), channel)))
    }

    async fn close(&mut self) -> Result<(), TailError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
            .map_err(|e| TailError::Session {
                host: self.host.clone(),
                reason: format!("disconnect failed: {}", e),
            })
    }
}

/// SSH client handler verifying the server key
struct HostKeyCheck {
    host: String,
    /// Pinned fingerprint, if configured
    expected_host_key: Option<String>,
}

#[async_trait]
impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    /// Accept any key unless a fingerprint is pinned for this server
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        tracing::debug!(host = %self.host, "Server host key: {}", fingerprint);

        Ok(host_key_matches(self.expected_host_key.as_deref(), &fingerprint, &self.host))
    }
}

fn host_key_matches(expected: Option<&str>, fingerprint: &str, host: &str) -> bool {
    match expected {
        Some(expected) if expected.trim_start_matches("SHA256:") != fingerprint => {
            tracing::error!(
                host = %host,
                "Host key differs from configured: expected {}, got {}",
                expected,
                fingerprint
            );
            false
        }
        _ => true,
    }
}
