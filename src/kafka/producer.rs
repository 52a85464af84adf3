use crate::config::KafkaConfig;
use crate::kafka::admin::BrokerAdmin;
use crate::kafka::provisioner::{TopicProvisioner, TopicRegistry, TopicSpec};
use crate::kafka::HandleState;
use crate::schema::{EventCodec, SchemaPair};
use crate::{Error, Result};
use rdkafka::error::KafkaError;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Publishes schema-bound events to a single topic.
///
/// Owns one broker connection, one topic binding, and one codec. The topic
/// is provisioned and both schemas registered before the constructor
/// returns, so a handle is never usable against a missing or misconfigured
/// topic.
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
    schemas: SchemaPair,
    codec: EventCodec,
    in_flight: Vec<DeliveryFuture>,
    state: HandleState,
}

impl EventProducer {
    pub async fn connect(
        spec: TopicSpec,
        schemas: SchemaPair,
        topic_registry: &TopicRegistry,
        codec: EventCodec,
        config: &KafkaConfig,
    ) -> Result<Self> {
        let admin = BrokerAdmin::new(&config.brokers)?;
        TopicProvisioner::new(admin, topic_registry.clone())
            .ensure(&spec)
            .await?;

        // Fail construction on schema conflicts, not the first publish
        codec.register_schemas(&spec.name, &schemas).await?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("compression.type", &config.compression)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            .set(
                "queue.buffering.max.kbytes",
                (config.buffer_memory / 1024).max(1).to_string(),
            )
            .create()?;

        info!("Producer connected for topic '{}'", spec.name);

        Ok(Self {
            producer,
            topic: spec.name,
            schemas,
            codec,
            in_flight: Vec::new(),
            state: HandleState::Open,
        })
    }

    /// Encode and submit one event.
    ///
    /// Submission is asynchronous at the transport level: the call returns
    /// once the envelope is accepted into the local send buffer, and
    /// broker-side delivery failures become observable via [`flush`].
    /// Suspends when the local send buffer is full.
    ///
    /// [`flush`]: EventProducer::flush
    pub async fn publish(
        &mut self,
        key: &JsonValue,
        value: &JsonValue,
        partition_hint: Option<i32>,
    ) -> Result<()> {
        self.check_open()?;

        let mut envelope = self
            .codec
            .encode(&self.topic, key, value, &self.schemas)
            .await?;
        envelope.partition_hint = partition_hint;

        let mut record = FutureRecord::to(&envelope.topic)
            .key(&envelope.key)
            .payload(&envelope.value);
        if let Some(partition) = envelope.partition_hint {
            record = record.partition(partition);
        }

        loop {
            match self.producer.send_result(record) {
                Ok(delivery) => {
                    self.in_flight.push(delivery);
                    return Ok(());
                }
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned)) => {
                    record = returned;
                    // Resolve the oldest outstanding send to free buffer space
                    if self.in_flight.is_empty() {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    } else {
                        let delivery = self.in_flight.remove(0);
                        Self::await_delivery(&self.topic, delivery).await?;
                    }
                }
                Err((e, _)) => return Err(Error::Kafka(e)),
            }
        }
    }

    /// Block until every previously submitted envelope is acknowledged or
    /// has failed. Fails if any outstanding send ultimately failed.
    pub async fn flush(&mut self) -> Result<()> {
        self.check_open()?;

        let pending = std::mem::take(&mut self.in_flight);
        let count = pending.len();
        let mut first_failure = None;

        for delivery in pending {
            if let Err(e) = Self::await_delivery(&self.topic, delivery).await {
                warn!("Delivery failed during flush: {}", e);
                first_failure.get_or_insert(e);
            }
        }

        debug!("Flushed {} outstanding deliveries for '{}'", count, self.topic);
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush all in-flight sends, then release the connection.
    ///
    /// Safe to call more than once; a second call is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == HandleState::Closed {
            debug!("Producer for '{}' already closed", self.topic);
            return Ok(());
        }

        let flushed = self.flush().await;
        self.state = HandleState::Closed;
        info!("Producer for '{}' closed", self.topic);
        flushed
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            HandleState::Open => Ok(()),
            HandleState::Closed => Err(Error::ClosedHandle("producer")),
        }
    }

    async fn await_delivery(topic: &str, delivery: DeliveryFuture) -> Result<()> {
        match delivery.await {
            Ok(Ok((partition, offset))) => {
                debug!(topic, partition, offset, "Delivery acknowledged");
                Ok(())
            }
            Ok(Err((e, _message))) => Err(Error::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            }),
            Err(_canceled) => Err(Error::Publish {
                topic: topic.to_string(),
                message: "delivery future canceled before resolution".to_string(),
            }),
        }
    }
}
