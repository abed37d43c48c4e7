//! Tail configuration: global defaults plus the server table

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::duration_secs;
use super::sink::{SinkSettings, TlsFiles};
use crate::error::ConfigError;
use crate::types::{Credential, ServerTarget};

/// Port used when a server entry does not set one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Separator between multiple files in a `tail_file` value
const PATH_SEPARATOR: char = ';';

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// Default file (or glob) followed on every server
    pub tail_file: String,

    /// Verbosity hint, 0 (quiet) to 3 (trace)
    pub log_level: u8,

    /// Sink driver name, empty for none
    pub storage_driver: String,

    /// Broker addresses, comma separated
    pub kafka_brokers: String,

    /// Destination topic
    pub kafka_topic: String,

    /// TLS client certificate
    pub kafka_certfile: String,

    /// TLS client private key
    pub kafka_keyfile: String,

    /// TLS certificate authority bundle
    pub kafka_cafile: String,

    /// Verify the broker's certificate chain
    pub kafka_verifyssl: bool,

    /// Limit on establishing one SSH connection
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Limit on a single sink publish
    #[serde(with = "duration_secs")]
    pub sink_timeout: Duration,

    /// Servers keyed by name
    pub servers: BTreeMap<String, ServerEntry>,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            tail_file: String::new(),
            log_level: 0,
            storage_driver: String::new(),
            kafka_brokers: String::new(),
            kafka_topic: "remote-tail".to_string(),
            kafka_certfile: String::new(),
            kafka_keyfile: String::new(),
            kafka_cafile: String::new(),
            kafka_verifyssl: true,
            connect_timeout: Duration::from_secs(10),
            sink_timeout: Duration::from_secs(5),
            servers: BTreeMap::new(),
        }
    }
}

/// One `[servers.<name>]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEntry {
    /// Display name
    pub server_name: String,
    /// Hostname or IP, may carry `:port`
    pub hostname: String,
    /// SSH port, 0 means the default
    pub port: u16,
    /// Login user
    pub user: String,
    /// Password for password authentication
    pub password: String,
    /// Private key used instead of the password when set
    pub private_key: Option<PathBuf>,
    /// Passphrase for `private_key`
    pub passphrase: Option<String>,
    /// Expected SSH host key fingerprint
    pub host_key: Option<String>,
    /// Overrides the global `tail_file`
    pub tail_file: String,
}

impl TailConfig {
    /// Build a configuration from `--file` and `--hosts` values.
    ///
    /// Hosts are `user@host[:port]`, comma separated.
    pub fn from_hosts(tail_file: &str, hosts: &str) -> Result<Self, ConfigError> {
        let mut config = TailConfig {
            tail_file: tail_file.to_string(),
            ..Default::default()
        };

        for (index, entry) in hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .enumerate()
        {
            let name = format!("server_{}", index);
            let mut server = parse_host_entry(entry)?;
            server.server_name = name.clone();
            config.servers.insert(name, server);
        }

        Ok(config)
    }

    /// Effective tail file for a server
    pub fn tail_file_for<'a>(&'a self, server: &'a ServerEntry) -> &'a str {
        if server.tail_file.is_empty() {
            &self.tail_file
        } else {
            &server.tail_file
        }
    }

    /// Resolve every server into a [`ServerTarget`], ordered by name.
    ///
    /// Servers without any file to follow are skipped.
    pub fn targets(&self) -> Result<Vec<ServerTarget>, ConfigError> {
        let mut targets = Vec::with_capacity(self.servers.len());

        for (name, server) in &self.servers {
            if server.hostname.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "servers.{}.hostname",
                    name
                )));
            }

            let file_paths = split_paths(self.tail_file_for(server));
            if file_paths.is_empty() {
                tracing::warn!(server = %name, "No tail_file configured, skipping server");
                continue;
            }

            let credential = match &server.private_key {
                Some(path) => Credential::PrivateKey {
                    path: path.clone(),
                    passphrase: server.passphrase.clone(),
                },
                None => Credential::Password(server.password.clone()),
            };

            targets.push(ServerTarget {
                name: name.clone(),
                hostname: server.hostname.clone(),
                port: if server.port == 0 {
                    DEFAULT_SSH_PORT
                } else {
                    server.port
                },
                user: server.user.clone(),
                credential,
                host_key: server.host_key.clone(),
                file_paths,
            });
        }

        Ok(targets)
    }

    /// Settings handed to the sink factory
    pub fn sink_settings(&self) -> SinkSettings {
        let tls = if !self.kafka_certfile.is_empty()
            && !self.kafka_keyfile.is_empty()
            && !self.kafka_cafile.is_empty()
        {
            Some(TlsFiles {
                cert: PathBuf::from(&self.kafka_certfile),
                key: PathBuf::from(&self.kafka_keyfile),
                ca: PathBuf::from(&self.kafka_cafile),
            })
        } else {
            None
        };

        SinkSettings {
            brokers: self
                .kafka_brokers
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(String::from)
                .collect(),
            topic: self.kafka_topic.clone(),
            tls,
            verify_ssl: self.kafka_verifyssl,
            timeout: self.sink_timeout,
        }
    }
}

/// Split a `tail_file` value into individual paths
fn split_paths(value: &str) -> Vec<String> {
    value
        .split(PATH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `user@host[:port]`
fn parse_host_entry(entry: &str) -> Result<ServerEntry, ConfigError> {
    let invalid = || ConfigError::InvalidHost(entry.to_string());

    let (user, address) = entry.split_once('@').ok_or_else(invalid)?;
    if user.is_empty() || address.is_empty() {
        return Err(invalid());
    }

    let (hostname, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (address, 0),
    };
    if hostname.is_empty() {
        return Err(invalid());
    }

    Ok(ServerEntry {
        hostname: hostname.to_string(),
        port,
        user: user.to_string(),
        ..Default::default()
    })
}
