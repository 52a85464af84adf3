use crate::config::Config;
use crate::handler::HandlerRegistry;
use crate::kafka::{EventConsumer, EventProducer, TopicRegistry, TopicSpec};
use crate::models::weather::{self, Weather, WeatherReading};
use crate::schema::{EventCodec, SchemaRegistryClient};
use crate::{Error, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Demo weather pipeline: one producer emitting simulated readings and one
/// consumer feeding the [`Weather`] model, sharing a topic registry so the
/// topic is provisioned exactly once.
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&mut self) -> Result<()> {
        let registry_client = Arc::new(SchemaRegistryClient::new(&self.config.schema_registry)?);
        let codec = EventCodec::new(registry_client);
        let topic_registry = TopicRegistry::new();

        let topic = TopicSpec::new(
            &self.config.pipeline.weather_topic,
            self.config.topic_defaults.partitions,
            self.config.topic_defaults.replication_factor,
        )
        .with_config(self.config.topic_defaults.topic_config());
        let schemas = weather::schema_pair()?;

        let weather = Arc::new(Weather::new());
        let mut handlers = HandlerRegistry::new();
        handlers.register(self.config.pipeline.weather_topic.clone(), weather.clone());

        let mut producer = EventProducer::connect(
            topic.clone(),
            schemas.clone(),
            &topic_registry,
            codec.clone(),
            &self.config.kafka,
        )
        .await?;

        let mut consumer = EventConsumer::connect(
            vec![(topic, schemas)],
            handlers,
            &topic_registry,
            codec,
            &self.config.kafka,
            &self.config.consumer,
        )
        .await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer_task = tokio::spawn(async move {
            let result = consumer.run(shutdown_rx).await;
            if let Err(e) = consumer.close().await {
                error!("Consumer close failed: {}", e);
            }
            result
        });

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.pipeline.publish_interval_ms));
        let mut seq: u64 = 0;

        let outcome = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break Err(Error::Shutdown);
                }
                _ = ticker.tick() => {
                    let reading = simulated_reading(seq);
                    seq += 1;

                    let key = json!({ "timestamp": time_millis() });
                    let value = serde_json::to_value(&reading)?;
                    if let Err(e) = producer.publish(&key, &value, None).await {
                        break Err(e);
                    }
                    info!(
                        temperature = reading.temperature,
                        status = %reading.status,
                        "Published weather reading"
                    );
                }
            }
        };

        // Drain in-flight work before releasing the connections
        let _ = shutdown_tx.send(true);
        if let Err(e) = producer.close().await {
            error!("Producer close failed: {}", e);
        }
        match consumer_task.await {
            Ok(consumer_result) => {
                if let Err(e) = consumer_result {
                    error!("Consumer loop failed: {}", e);
                }
            }
            Err(e) => error!("Consumer task panicked: {}", e),
        }

        info!(
            temperature = weather.temperature(),
            status = %weather.status(),
            "Last observed weather"
        );

        match outcome {
            Err(Error::Shutdown) => Ok(()),
            other => other,
        }
    }
}

/// Wall-clock milliseconds, used as the key for published events.
fn time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// Deterministic oscillation over a 24-tick cycle.
fn simulated_reading(seq: u64) -> WeatherReading {
    let phase = (seq % 24) as f64 / 24.0 * std::f64::consts::TAU;
    let temperature = 70.0 + 8.0 * phase.sin();
    let status = if temperature >= 70.0 { "sunny" } else { "cloudy" };

    WeatherReading {
        temperature,
        status: status.to_string(),
    }
}
