use crate::kafka::provisioner::TopicSpec;
use crate::{Error, Result};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::info;

/// Thin facade over the broker's cluster-metadata and topic-administration
/// API. Surfaces broker rejections unchanged; discrimination between benign
/// and fatal rejections is the provisioner's job.
pub struct BrokerAdmin {
    admin_client: AdminClient<DefaultClientContext>,
}

impl BrokerAdmin {
    pub fn new(brokers: &[String]) -> Result<Self> {
        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .create()?;

        Ok(Self { admin_client })
    }

    pub async fn topic_exists(&self, topic_name: &str) -> Result<bool> {
        let metadata = self
            .admin_client
            .inner()
            .fetch_metadata(Some(topic_name), Duration::from_secs(5))?;

        Ok(metadata
            .topics()
            .iter()
            .any(|topic| topic.name() == topic_name && topic.error().is_none()))
    }

    pub async fn create_topic(&self, spec: &TopicSpec) -> Result<()> {
        let mut new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        for (key, value) in &spec.config {
            new_topic = new_topic.set(key, value);
        }

        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(30)));

        let results = self.admin_client.create_topics(&[new_topic], &opts).await?;

        for result in results {
            match result {
                Ok(topic) => {
                    info!("Successfully created topic: {}", topic);
                }
                Err((_topic, error)) => {
                    return Err(Error::Kafka(rdkafka::error::KafkaError::AdminOp(error)));
                }
            }
        }

        Ok(())
    }

    pub async fn delete_topic(&self, topic_name: &str) -> Result<()> {
        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(30)));

        let results = self.admin_client.delete_topics(&[topic_name], &opts).await?;

        for result in results {
            match result {
                Ok(topic) => {
                    info!("Successfully deleted topic: {}", topic);
                }
                Err((_topic, error)) => {
                    return Err(Error::Kafka(rdkafka::error::KafkaError::AdminOp(error)));
                }
            }
        }

        Ok(())
    }
}
