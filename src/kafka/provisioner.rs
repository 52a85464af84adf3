use crate::kafka::admin::BrokerAdmin;
use crate::{Error, Result};
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Desired shape of a topic: identity is `name`; immutable once submitted
/// to the broker.
#[derive(Debug, Clone)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    /// Topic-level config pairs (`cleanup.policy`, `compression.type`, ...)
    /// submitted with the create request.
    pub config: Vec<(String, String)>,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
            config: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Vec<(String, String)>) -> Self {
        self.config = config;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Provision {
                topic: self.name.clone(),
                message: "topic name must not be empty".to_string(),
            });
        }
        if self.partitions < 1 {
            return Err(Error::Provision {
                topic: self.name.clone(),
                message: format!("partitions must be >= 1, got {}", self.partitions),
            });
        }
        if self.replication_factor < 1 {
            return Err(Error::Provision {
                topic: self.name.clone(),
                message: format!(
                    "replication factor must be >= 1, got {}",
                    self.replication_factor
                ),
            });
        }
        Ok(())
    }
}

/// Process-wide set of topic names confirmed to exist.
///
/// Constructed once at startup and cloned into every producer/consumer
/// construction. A name is inserted only after the provisioner has
/// confirmed existence or successfully created the topic.
#[derive(Clone, Default)]
pub struct TopicRegistry {
    known: Arc<Mutex<HashSet<String>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, topic_name: &str) -> bool {
        self.known.lock().await.contains(topic_name)
    }
}

/// Guarantees a topic exists exactly once across all producer and consumer
/// constructions in the process, tolerating concurrent callers and
/// "already exists" races with other processes.
pub struct TopicProvisioner {
    admin: BrokerAdmin,
    registry: TopicRegistry,
}

impl TopicProvisioner {
    pub fn new(admin: BrokerAdmin, registry: TopicRegistry) -> Self {
        Self { admin, registry }
    }

    /// Ensure the topic described by `spec` exists.
    ///
    /// The registry lock is held across the check-then-create sequence, so
    /// concurrent `ensure` calls for the same name issue at most one
    /// broker-level create attempt per process. A broker-side "already
    /// exists" rejection is a benign race with another creator and is
    /// treated as success; any other rejection is fatal and not retried.
    #[instrument(skip(self, spec), fields(topic = %spec.name))]
    pub async fn ensure(&self, spec: &TopicSpec) -> Result<()> {
        spec.validate()?;

        let mut known = self.registry.known.lock().await;
        if known.contains(&spec.name) {
            debug!("Topic '{}' already verified to exist", spec.name);
            return Ok(());
        }

        if self.admin.topic_exists(&spec.name).await? {
            info!("Topic '{}' already exists", spec.name);
            known.insert(spec.name.clone());
            return Ok(());
        }

        info!(
            partitions = spec.partitions,
            replication_factor = spec.replication_factor,
            "Creating topic '{}'",
            spec.name
        );
        match self.admin.create_topic(spec).await {
            Ok(()) => {}
            Err(Error::Kafka(KafkaError::AdminOp(RDKafkaErrorCode::TopicAlreadyExists))) => {
                info!("Topic '{}' was created concurrently", spec.name);
            }
            Err(Error::Kafka(e)) => {
                warn!("Failed to create topic '{}': {}", spec.name, e);
                return Err(Error::Provision {
                    topic: spec.name.clone(),
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        known.insert(spec.name.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validation_rejects_empty_name() {
        let spec = TopicSpec::new("", 1, 1);
        assert!(matches!(spec.validate(), Err(Error::Provision { .. })));
    }

    #[test]
    fn test_spec_validation_rejects_zero_partitions() {
        let spec = TopicSpec::new("events", 0, 1);
        assert!(matches!(spec.validate(), Err(Error::Provision { .. })));
    }

    #[test]
    fn test_spec_validation_rejects_zero_replication() {
        let spec = TopicSpec::new("events", 1, 0);
        assert!(matches!(spec.validate(), Err(Error::Provision { .. })));
    }

    #[test]
    fn test_spec_validation_accepts_minimal_spec() {
        let spec = TopicSpec::new("events", 1, 1);
        assert!(spec.validate().is_ok());
    }

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = TopicRegistry::new();
        assert!(!registry.contains("weather-events").await);
    }

    #[tokio::test]
    #[ignore] // Requires running Kafka
    async fn test_concurrent_ensure_converges() {
        let registry = TopicRegistry::new();
        let brokers = vec![std::env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())];
        let topic_name = format!("test-concurrent-ensure-{}", std::process::id());
        let spec = TopicSpec::new(&topic_name, 1, 1);

        let first = TopicProvisioner::new(BrokerAdmin::new(&brokers).unwrap(), registry.clone());
        let second = TopicProvisioner::new(BrokerAdmin::new(&brokers).unwrap(), registry.clone());

        // Both callers must observe success with no duplicate-creation
        // error leaking out, and the registry must record the name once.
        let (a, b) = tokio::join!(first.ensure(&spec), second.ensure(&spec));
        a.unwrap();
        b.unwrap();
        assert!(registry.contains(&topic_name).await);

        first.admin.delete_topic(&topic_name).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires running Kafka
    async fn test_ensure_is_idempotent_across_calls() {
        let registry = TopicRegistry::new();
        let brokers = vec![std::env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())];
        let topic_name = format!("test-ensure-twice-{}", std::process::id());
        let spec = TopicSpec::new(&topic_name, 1, 1);

        let provisioner =
            TopicProvisioner::new(BrokerAdmin::new(&brokers).unwrap(), registry.clone());

        provisioner.ensure(&spec).await.unwrap();
        // Second call takes the registry fast path
        provisioner.ensure(&spec).await.unwrap();

        provisioner.admin.delete_topic(&topic_name).await.unwrap();
    }
}
