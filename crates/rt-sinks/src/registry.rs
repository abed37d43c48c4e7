//! Name-keyed sink factory registry

use std::sync::Arc;

use dashmap::DashMap;

use rt_core::config::SinkSettings;
use rt_core::traits::Sink;
use rt_core::SinkError;

use crate::jsonl::JsonlSink;
use crate::kafka_rest::KafkaRestSink;

/// Constructor for one sink driver
pub type SinkFactory =
    Arc<dyn Fn(&SinkSettings) -> Result<Arc<dyn Sink>, SinkError> + Send + Sync>;

/// Registry of sink drivers.
///
/// Registration may happen concurrently from independent startup code; once
/// aggregation begins the registry is only read.
pub struct SinkRegistry {
    factories: DashMap<String, SinkFactory>,
}

impl SinkRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Create a registry holding the built-in drivers
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(KafkaRestSink::DRIVER, |settings: &SinkSettings| {
            Ok(Arc::new(KafkaRestSink::new(settings)?) as Arc<dyn Sink>)
        });
        registry.register(JsonlSink::DRIVER, |settings: &SinkSettings| {
            Ok(Arc::new(JsonlSink::open(settings)?) as Arc<dyn Sink>)
        });
        registry
    }

    /// Register a driver under `name`.
    ///
    /// Registering a name again replaces the earlier factory; returns true
    /// when that happened.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&SinkSettings) -> Result<Arc<dyn Sink>, SinkError> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(driver = %name, "Registering sink driver");
        self.factories.insert(name, Arc::new(factory)).is_some()
    }

    /// Construct the sink registered under `name`.
    ///
    /// An empty name means no sink is configured and yields `Ok(None)`.
    pub fn create(
        &self,
        name: &str,
        settings: &SinkSettings,
    ) -> Result<Option<Arc<dyn Sink>>, SinkError> {
        if name.is_empty() {
            return Ok(None);
        }

        // Clone the factory out so no map guard is held while it runs
        let factory = self
            .factories
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SinkError::UnknownDriver(name.to_string()))?;

        factory(settings).map(Some)
    }

    /// Registered driver names, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
