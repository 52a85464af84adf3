use super::*;
use crate::config::{ConsumerConfig, KafkaConfig, SchemaRegistryConfig};
use crate::handler::HandlerRegistry;
use crate::models::weather;
use crate::schema::{EventCodec, SchemaRegistryClient};
use crate::Error;
use serde_json::json;
use std::sync::Arc;

fn create_test_kafka_config() -> KafkaConfig {
    KafkaConfig {
        brokers: vec![std::env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())],
        compression: "none".to_string(),
        acks: "1".to_string(),
        linger_ms: 0,
        batch_size: 1,
        buffer_memory: 1_048_576, // 1MB for tests
    }
}

fn create_test_registry_config() -> SchemaRegistryConfig {
    SchemaRegistryConfig {
        url: std::env::var("TEST_SCHEMA_REGISTRY_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string()),
        timeout_secs: 5,
    }
}

fn create_test_codec() -> EventCodec {
    EventCodec::new(Arc::new(
        SchemaRegistryClient::new(&create_test_registry_config()).unwrap(),
    ))
}

#[test]
fn test_topic_spec_carries_config_pairs() {
    let spec = TopicSpec::new("weather-events", 3, 1).with_config(vec![
        ("cleanup.policy".to_string(), "delete".to_string()),
        ("compression.type".to_string(), "lz4".to_string()),
    ]);

    assert_eq!(spec.name, "weather-events");
    assert_eq!(spec.partitions, 3);
    assert_eq!(spec.replication_factor, 1);
    assert_eq!(spec.config.len(), 2);
}

#[tokio::test]
#[ignore] // Requires running Kafka and schema registry
async fn test_producer_connect_provisions_topic() {
    let kafka = create_test_kafka_config();
    let registry = TopicRegistry::new();
    let topic = format!("test-producer-connect-{}", std::process::id());
    let spec = TopicSpec::new(&topic, 1, 1);

    let mut producer = EventProducer::connect(
        spec,
        weather::schema_pair().unwrap(),
        &registry,
        create_test_codec(),
        &kafka,
    )
    .await
    .unwrap();

    assert!(registry.contains(&topic).await);

    producer.close().await.unwrap();
    BrokerAdmin::new(&kafka.brokers)
        .unwrap()
        .delete_topic(&topic)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore] // Requires running Kafka and schema registry
async fn test_operations_on_closed_handles_are_rejected() {
    let kafka = create_test_kafka_config();
    let registry = TopicRegistry::new();
    let topic = format!("test-closed-handle-{}", std::process::id());
    let spec = TopicSpec::new(&topic, 1, 1);
    let schemas = weather::schema_pair().unwrap();
    let codec = create_test_codec();

    let mut producer = EventProducer::connect(
        spec.clone(),
        schemas.clone(),
        &registry,
        codec.clone(),
        &kafka,
    )
    .await
    .unwrap();
    producer.close().await.unwrap();
    // Second close is a benign no-op
    producer.close().await.unwrap();

    let key = json!({"timestamp": 1});
    let value = json!({"temperature": 70.0, "status": "sunny"});
    assert!(matches!(
        producer.publish(&key, &value, None).await,
        Err(Error::ClosedHandle("producer"))
    ));
    assert!(matches!(producer.flush().await, Err(Error::ClosedHandle("producer"))));

    let mut consumer = EventConsumer::connect(
        vec![(spec, schemas)],
        HandlerRegistry::new(),
        &registry,
        codec,
        &kafka,
        &ConsumerConfig::default(),
    )
    .await
    .unwrap();
    consumer.close().await.unwrap();
    consumer.close().await.unwrap();
    assert!(matches!(
        consumer.poll_once().await,
        Err(Error::ClosedHandle("consumer"))
    ));

    BrokerAdmin::new(&kafka.brokers)
        .unwrap()
        .delete_topic(&topic)
        .await
        .unwrap();
}
