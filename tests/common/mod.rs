use kafka_eventbus::config::{
    Config, ConsumerConfig, KafkaConfig, PipelineConfig, SchemaRegistryConfig, TopicDefaults,
};
use std::env;

/// Get test configuration from environment variables
pub fn get_test_config() -> Config {
    // Use TEST_ prefix for test environment variables
    let kafka = KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        compression: "none".to_string(), // No compression for tests
        acks: "all".to_string(),
        linger_ms: 0,  // Immediate sending for tests
        batch_size: 1, // Small batches for tests
        buffer_memory: 1_048_576, // 1MB for tests
    };

    let schema_registry = SchemaRegistryConfig {
        url: env::var("TEST_SCHEMA_REGISTRY_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string()),
        timeout_secs: 5,
    };

    let consumer = ConsumerConfig {
        group_id: format!("test_group_{}", std::process::id()),
        auto_offset_reset: "earliest".to_string(),
        session_timeout_ms: 6000,
        enable_auto_commit: true,
        poll_timeout_ms: 500,
    };

    Config {
        kafka,
        schema_registry,
        topic_defaults: TopicDefaults::default(),
        consumer,
        pipeline: PipelineConfig::default(),
    }
}

/// Per-process topic name so parallel test runs do not collide
pub fn test_topic(prefix: &str) -> String {
    format!("{}_{}", prefix, std::process::id())
}
