//! Settings shared by all sink drivers

use std::path::PathBuf;
use std::time::Duration;

/// Client TLS material; only engaged when all three files are configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Client certificate (PEM)
    pub cert: PathBuf,
    /// Client private key (PEM, PKCS#8)
    pub key: PathBuf,
    /// Certificate authority bundle (PEM)
    pub ca: PathBuf,
}

/// Connection parameters for a sink driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    /// Broker endpoints, tried in order
    pub brokers: Vec<String>,
    /// Destination topic
    pub topic: String,
    /// Optional client TLS
    pub tls: Option<TlsFiles>,
    /// Verify the peer certificate chain
    pub verify_ssl: bool,
    /// Upper bound on a single publish
    pub timeout: Duration,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            topic: "remote-tail".to_string(),
            tls: None,
            verify_ssl: true,
            timeout: Duration::from_secs(5),
        }
    }
}
