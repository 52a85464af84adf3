use crate::config::{ConsumerConfig, KafkaConfig};
use crate::handler::{DispatchOutcome, HandlerRegistry};
use crate::kafka::admin::BrokerAdmin;
use crate::kafka::provisioner::{TopicProvisioner, TopicRegistry, TopicSpec};
use crate::kafka::HandleState;
use crate::schema::{Envelope, EventCodec, SchemaPair};
use crate::{Error, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pulls messages from one or more subscribed topics, decodes them, and
/// dispatches each to the handler registered for its topic.
///
/// Per-message failures (decode, unhandled topic, handler error) are
/// reported and skipped; a single malformed message never stops the
/// stream. Only connection-level errors propagate.
pub struct EventConsumer {
    consumer: StreamConsumer,
    codec: EventCodec,
    schemas: HashMap<String, SchemaPair>,
    handlers: HandlerRegistry,
    poll_timeout: Duration,
    state: HandleState,
}

impl EventConsumer {
    /// Provision and subscribe to the given topics.
    ///
    /// Consumers provision too: racing a producer to a topic's first boot
    /// is the normal case, and the provisioner converges both sides.
    pub async fn connect(
        topics: Vec<(TopicSpec, SchemaPair)>,
        handlers: HandlerRegistry,
        topic_registry: &TopicRegistry,
        codec: EventCodec,
        kafka: &KafkaConfig,
        config: &ConsumerConfig,
    ) -> Result<Self> {
        let provisioner =
            TopicProvisioner::new(BrokerAdmin::new(&kafka.brokers)?, topic_registry.clone());
        for (spec, _) in &topics {
            provisioner.ensure(spec).await?;
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", kafka.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", config.enable_auto_commit.to_string())
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set("enable.partition.eof", "false")
            .create()?;

        let names: Vec<&str> = topics.iter().map(|(spec, _)| spec.name.as_str()).collect();
        consumer.subscribe(&names)?;
        info!(topics = ?names, "Consumer subscribed");

        let schemas = topics
            .into_iter()
            .map(|(spec, pair)| (spec.name, pair))
            .collect();

        Ok(Self {
            consumer,
            codec,
            schemas,
            handlers,
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            state: HandleState::Open,
        })
    }

    /// Wait up to the poll timeout for one message and process it.
    ///
    /// Returns `Ok(true)` if a message was received (whether or not it was
    /// ultimately dispatched), `Ok(false)` on timeout.
    pub async fn poll_once(&mut self) -> Result<bool> {
        self.check_open()?;

        let envelope = match tokio::time::timeout(self.poll_timeout, self.consumer.recv()).await {
            Ok(Ok(message)) => Envelope {
                topic: message.topic().to_string(),
                key: message.key().map(|k| k.to_vec()).unwrap_or_default(),
                value: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
                partition_hint: Some(message.partition()),
            },
            Ok(Err(e)) => return Err(Error::Kafka(e)),
            Err(_elapsed) => return Ok(false),
        };

        self.process_envelope(&envelope).await;
        Ok(true)
    }

    /// Drive the polling loop until the shutdown signal flips.
    ///
    /// A pending poll is cancelled promptly on shutdown; the handle is
    /// still open afterwards and must be released with [`close`].
    ///
    /// [`close`]: EventConsumer::close
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.check_open()?;
        info!("Consumer loop starting");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                polled = self.poll_once() => {
                    polled?;
                }
            }
        }

        info!("Consumer loop stopped");
        Ok(())
    }

    /// Unsubscribe and release the connection.
    ///
    /// Safe to call more than once; a second call is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == HandleState::Closed {
            debug!("Consumer already closed");
            return Ok(());
        }

        self.consumer.unsubscribe();
        self.state = HandleState::Closed;
        info!("Consumer closed");
        Ok(())
    }

    async fn process_envelope(&self, envelope: &Envelope) {
        let topic = envelope.topic.as_str();
        let Some(schemas) = self.schemas.get(topic) else {
            warn!("No schema binding for topic '{}', discarding message", topic);
            return;
        };

        let (key, value) = match self.codec.decode(envelope, schemas).await {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(topic, "Failed to decode message, skipping: {}", e);
                return;
            }
        };

        match self.handlers.dispatch(topic, &key, &value) {
            DispatchOutcome::Handled => {
                debug!(topic, "Message dispatched");
            }
            DispatchOutcome::NoHandler => {
                warn!("No handler registered for topic '{}', discarding message", topic);
            }
            DispatchOutcome::Failed(e) => {
                error!(topic, "Handler failed, continuing: {}", e);
            }
        }
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            HandleState::Open => Ok(()),
            HandleState::Closed => Err(Error::ClosedHandle("consumer")),
        }
    }
}
