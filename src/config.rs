use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub schema_registry: SchemaRegistryConfig,
    #[serde(default)]
    pub topic_defaults: TopicDefaults,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_buffer_memory")]
    pub buffer_memory: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaRegistryConfig {
    pub url: String,
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

/// Per-topic partition/replication and retention defaults applied by the
/// provisioner when a spec does not override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopicDefaults {
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i32,
    #[serde(default = "default_cleanup_policy")]
    pub cleanup_policy: String,
    #[serde(default = "default_topic_compression")]
    pub compression_type: String,
    #[serde(default = "default_delete_retention_ms")]
    pub delete_retention_ms: u64,
    #[serde(default = "default_file_delete_delay_ms")]
    pub file_delete_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u32,
    #[serde(default = "default_enable_auto_commit")]
    pub enable_auto_commit: bool,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

/// Settings for the demo weather pipeline run by the binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_weather_topic")]
    pub weather_topic: String,
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("EVENTBUS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn bootstrap_servers(&self) -> String {
        self.kafka.brokers.join(",")
    }
}

impl TopicDefaults {
    /// Topic-level config pairs submitted with a create-topic request,
    /// using the broker's standard config keys.
    pub fn topic_config(&self) -> Vec<(String, String)> {
        vec![
            ("cleanup.policy".to_string(), self.cleanup_policy.clone()),
            ("compression.type".to_string(), self.compression_type.clone()),
            (
                "delete.retention.ms".to_string(),
                self.delete_retention_ms.to_string(),
            ),
            (
                "file.delete.delay.ms".to_string(),
                self.file_delete_delay_ms.to_string(),
            ),
        ]
    }
}

impl Default for TopicDefaults {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            replication_factor: default_replication_factor(),
            cleanup_policy: default_cleanup_policy(),
            compression_type: default_topic_compression(),
            delete_retention_ms: default_delete_retention_ms(),
            file_delete_delay_ms: default_file_delete_delay_ms(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: default_group_id(),
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout_ms(),
            enable_auto_commit: default_enable_auto_commit(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weather_topic: default_weather_topic(),
            publish_interval_ms: default_publish_interval_ms(),
        }
    }
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    100
}

fn default_batch_size() -> usize {
    16384
}

fn default_buffer_memory() -> usize {
    33_554_432 // 32MB
}

fn default_registry_timeout() -> u64 {
    30
}

fn default_partitions() -> i32 {
    1
}

fn default_replication_factor() -> i32 {
    1
}

fn default_cleanup_policy() -> String {
    "delete".to_string()
}

fn default_topic_compression() -> String {
    "lz4".to_string()
}

fn default_delete_retention_ms() -> u64 {
    2000
}

fn default_file_delete_delay_ms() -> u64 {
    2000
}

fn default_group_id() -> String {
    "kafka-eventbus".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout_ms() -> u32 {
    6000
}

fn default_enable_auto_commit() -> bool {
    true
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_weather_topic() -> String {
    "weather-events".to_string()
}

fn default_publish_interval_ms() -> u64 {
    1000
}
