//! Kafka REST proxy sink
//!
//! Each message becomes one record POSTed to `{broker}/topics/{topic}` using
//! the proxy's JSON embedded format. Brokers are tried in order and the
//! first one to accept the record wins.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{Certificate, Client, Identity};
use serde::Serialize;

use rt_core::config::{SinkSettings, TlsFiles};
use rt_core::traits::Sink;
use rt_core::{Message, SinkError};

use crate::record::SinkRecord;

/// Content type of the REST proxy's JSON embedded format (v2)
const KAFKA_JSON_CONTENT_TYPE: &str = "application/vnd.kafka.json.v2+json";

#[derive(Serialize)]
struct ProduceRequest<'a> {
    records: [ProduceRecord<'a>; 1],
}

#[derive(Serialize)]
struct ProduceRecord<'a> {
    value: SinkRecord<'a>,
}

/// Publishes messages to a Kafka REST proxy
pub struct KafkaRestSink {
    client: Client,
    /// Fully qualified produce URLs, one per broker
    endpoints: Vec<String>,
    closed: AtomicBool,
}

impl KafkaRestSink {
    /// Registry name of this driver
    pub const DRIVER: &'static str = "kafka_rest";

    /// Build the HTTP client and produce endpoints from `settings`
    pub fn new(settings: &SinkSettings) -> Result<Self, SinkError> {
        if settings.brokers.is_empty() {
            return Err(SinkError::Config("no brokers configured".to_string()));
        }
        if settings.topic.is_empty() {
            return Err(SinkError::Config("no topic configured".to_string()));
        }

        let mut builder = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl);

        if let Some(tls) = &settings.tls {
            let (identity, ca) = load_tls(tls)?;
            builder = builder.identity(identity).add_root_certificate(ca);
        }

        let client = builder
            .build()
            .map_err(|e| SinkError::Config(format!("failed to build HTTP client: {}", e)))?;

        let scheme = if settings.tls.is_some() { "https" } else { "http" };
        let endpoints = settings
            .brokers
            .iter()
            .map(|broker| produce_url(broker, &settings.topic, scheme))
            .collect();

        Ok(Self {
            client,
            endpoints,
            closed: AtomicBool::new(false),
        })
    }

    /// Produce URLs in the order they are tried
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

#[async_trait]
impl Sink for KafkaRestSink {
    async fn publish(&self, message: &Message) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }

        let body = serde_json::to_vec(&ProduceRequest {
            records: [ProduceRecord {
                value: SinkRecord::from(message),
            }],
        })?;

        let mut last_error = None;
        for endpoint in &self.endpoints {
            let result = self
                .client
                .post(endpoint)
                .header(reqwest::header::CONTENT_TYPE, KAFKA_JSON_CONTENT_TYPE)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    tracing::debug!(endpoint = %endpoint, status = %response.status(), "Broker rejected record");
                    last_error = Some(format!("{} returned {}", endpoint, response.status()));
                }
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, "Broker unreachable: {}", e);
                    last_error = Some(format!("{}: {}", endpoint, e));
                }
            }
        }

        Err(SinkError::Transport(
            last_error.unwrap_or_else(|| "no brokers".to_string()),
        ))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

fn load_tls(tls: &TlsFiles) -> Result<(Identity, Certificate), SinkError> {
    let cert = std::fs::read(&tls.cert)?;
    let key = std::fs::read(&tls.key)?;
    let ca = std::fs::read(&tls.ca)?;

    let identity = Identity::from_pkcs8_pem(&cert, &key)
        .map_err(|e| SinkError::Config(format!("invalid client certificate/key: {}", e)))?;
    let ca = Certificate::from_pem(&ca)
        .map_err(|e| SinkError::Config(format!("invalid CA certificate: {}", e)))?;

    Ok((identity, ca))
}

/// `{broker}/topics/{topic}`, adding a scheme when the broker has none
fn produce_url(broker: &str, topic: &str, default_scheme: &str) -> String {
    let base = broker.trim_end_matches('/');
    if base.contains("://") {
        format!("{}/topics/{}", base, topic)
    } else {
        format!("{}://{}/topics/{}", default_scheme, base, topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_core::StreamKind;

    fn settings(brokers: &[&str]) -> SinkSettings {
        SinkSettings {
            brokers: brokers.iter().map(|b| b.to_string()).collect(),
            topic: "remote-tail".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_produce_url() {
        assert_eq!(
            produce_url("broker-1:8082", "logs", "http"),
            "http://broker-1:8082/topics/logs"
        );
        assert_eq!(
            produce_url("https://proxy.internal/", "logs", "http"),
            "https://proxy.internal/topics/logs"
        );
    }

    #[test]
    fn test_requires_brokers() {
        assert!(matches!(
            KafkaRestSink::new(&settings(&[])),
            Err(SinkError::Config(_))
        ));
    }

    #[test]
    fn test_endpoints_follow_broker_order() {
        let sink = KafkaRestSink::new(&settings(&["b1:8082", "b2:8082"])).unwrap();
        assert_eq!(
            sink.endpoints(),
            &[
                "http://b1:8082/topics/remote-tail".to_string(),
                "http://b2:8082/topics/remote-tail".to_string()
            ]
        );
    }

    #[test]
    fn test_missing_tls_files() {
        let mut settings = settings(&["b1:8082"]);
        settings.tls = Some(TlsFiles {
            cert: "/nonexistent/client.pem".into(),
            key: "/nonexistent/client.key".into(),
            ca: "/nonexistent/ca.pem".into(),
        });
        assert!(matches!(
            KafkaRestSink::new(&settings),
            Err(SinkError::Io(_))
        ));
    }

    #[test]
    fn test_tls_identity_and_ca_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("client.pem");
        let key = dir.path().join("client.key");
        let ca = dir.path().join("ca.pem");
        std::fs::write(&cert, include_str!("../tests/fixtures/client.pem")).unwrap();
        std::fs::write(&key, include_str!("../tests/fixtures/client.key")).unwrap();
        std::fs::write(&ca, include_str!("../tests/fixtures/ca.pem")).unwrap();

        let mut settings = settings(&["b1:8443"]);
        settings.tls = Some(TlsFiles { cert, key, ca });

        let sink = KafkaRestSink::new(&settings).unwrap();
        assert_eq!(sink.endpoints(), &["https://b1:8443/topics/remote-tail".to_string()]);
    }

    #[test]
    fn test_garbage_tls_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("client.pem");
        let key = dir.path().join("client.key");
        let ca = dir.path().join("ca.pem");
        for path in [&cert, &key, &ca] {
            std::fs::write(path, "not a pem file").unwrap();
        }

        let mut settings = settings(&["b1:8443"]);
        settings.tls = Some(TlsFiles { cert, key, ca });

        assert!(matches!(
            KafkaRestSink::new(&settings),
            Err(SinkError::Config(_))
        ));
    }

    #[test]
    fn test_produce_body_shape() {
        let message = Message::new("web:22", "/var/log/syslog", "up\n", StreamKind::Primary);
        let body = serde_json::to_value(ProduceRequest {
            records: [ProduceRecord {
                value: SinkRecord::from(&message),
            }],
        })
        .unwrap();
        assert_eq!(body["records"][0]["value"]["content"], "up");
        assert_eq!(body["records"][0]["value"]["host"], "web:22");
    }

    #[tokio::test]
    async fn test_publish_after_close() {
        let sink = KafkaRestSink::new(&settings(&["127.0.0.1:9"])).unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();
        let message = Message::new("web:22", "/var/log/syslog", "up\n", StreamKind::Primary);
        assert!(matches!(
            sink.publish(&message).await,
            Err(SinkError::Closed)
        ));
    }
}
