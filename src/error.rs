//! Error types and result handling for kafka-eventbus.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use kafka_eventbus::{Error, Result};
//!
//! fn provision() -> Result<()> {
//!     // Simulating a provisioning failure
//!     Err(Error::Provision {
//!         topic: "weather-events".to_string(),
//!         message: "replication factor exceeds broker count".to_string(),
//!     })
//! }
//!
//! match provision() {
//!     Ok(()) => println!("Provisioned"),
//!     Err(Error::Provision { topic, message }) => {
//!         eprintln!("Provisioning '{}' failed: {}", topic, message)
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for kafka-eventbus operations.
///
/// Construction-time failures (provisioning, schema registration) are fatal
/// to the constructing call; per-message failures during steady-state
/// operation (decode, dispatch) are reported and skipped by the consumer
/// loop rather than propagated.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, typically from an invalid config file or
    /// environment variable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client, producer, or admin error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Topic creation or verification failed for a reason other than a
    /// benign "already exists" race.
    #[error("Provisioning error for topic '{topic}': {message}")]
    Provision {
        /// Topic the provisioner was asked to ensure
        topic: String,
        /// Underlying broker rejection or constraint violation
        message: String,
    },

    /// Schema rejected as incompatible with a previously registered schema
    /// for the same subject. Indicates a producer code defect; not retried.
    #[error("Schema conflict for subject '{subject}': {message}")]
    SchemaConflict {
        /// Registry subject, e.g. `weather-events-value`
        subject: String,
        /// Registry rejection detail
        message: String,
    },

    /// Schema registry could not be reached. Retryable by caller policy;
    /// never retried internally.
    #[error("Schema registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Malformed payload encountered while decoding a received message.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Broker-side delivery failure surfaced through `publish` or `flush`.
    #[error("Publish error for topic '{topic}': {message}")]
    Publish {
        /// Topic the envelope was bound for
        topic: String,
        /// Delivery failure detail
        message: String,
    },

    /// An operation other than `close` was invoked on a closed handle.
    /// This is a programming error at the call site.
    #[error("Operation on closed {0} handle")]
    ClosedHandle(&'static str),

    /// JSON serialization error when encoding passthrough values.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Avro schema parsing or datum encoding error.
    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    /// I/O error, typically from config file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Graceful shutdown was requested (e.g., via Ctrl+C).
    ///
    /// This is not really an error but uses the error mechanism
    /// to cleanly exit the pipeline loop.
    #[error("Shutdown requested")]
    Shutdown,
}

/// A convenient Result type alias for kafka-eventbus operations.
///
/// This is equivalent to `std::result::Result<T, kafka_eventbus::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
