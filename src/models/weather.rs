//! The weather model: a concrete event handler tracking the latest
//! observed reading.

use crate::handler::{EventHandler, HandlerError};
use crate::schema::{AvroSchema, SchemaPair};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::RwLock;
use tracing::debug;

/// Applied when an incoming value is missing the `temperature` field.
pub const DEFAULT_TEMPERATURE: f64 = -255.0;
/// Applied when an incoming value is missing the `status` field.
pub const DEFAULT_STATUS: &str = "read_error";

pub const KEY_SCHEMA: &str = r#"{
    "type": "record",
    "name": "WeatherKey",
    "namespace": "eventbus.weather",
    "fields": [
        {"name": "timestamp", "type": "long"}
    ]
}"#;

pub const VALUE_SCHEMA: &str = r#"{
    "type": "record",
    "name": "WeatherReading",
    "namespace": "eventbus.weather",
    "fields": [
        {"name": "temperature", "type": "double"},
        {"name": "status", "type": "string"}
    ]
}"#;

/// The schemas bound to a weather topic at producer/consumer construction.
pub fn schema_pair() -> Result<SchemaPair> {
    Ok(SchemaPair::new(
        AvroSchema::parse(KEY_SCHEMA)?,
        AvroSchema::parse(VALUE_SCHEMA)?,
    ))
}

/// One published weather observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: f64,
    pub status: String,
}

#[derive(Debug, Clone)]
struct WeatherState {
    temperature: f64,
    status: String,
}

/// Tracks the most recent weather reading seen on a subscribed topic.
#[derive(Debug)]
pub struct Weather {
    state: RwLock<WeatherState>,
}

impl Weather {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(WeatherState {
                temperature: 70.0,
                status: "sunny".to_string(),
            }),
        }
    }

    pub fn temperature(&self) -> f64 {
        self.state.read().expect("weather state poisoned").temperature
    }

    pub fn status(&self) -> String {
        self.state.read().expect("weather state poisoned").status.clone()
    }
}

impl Default for Weather {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for Weather {
    fn process(
        &self,
        topic: &str,
        _key: &JsonValue,
        value: &JsonValue,
    ) -> std::result::Result<(), HandlerError> {
        debug!("Processing message for topic '{}'", topic);

        let mut state = self
            .state
            .write()
            .map_err(|_| HandlerError::new("weather state poisoned"))?;
        state.temperature = value
            .get("temperature")
            .and_then(JsonValue::as_f64)
            .unwrap_or(DEFAULT_TEMPERATURE);
        state.status = value
            .get("status")
            .and_then(JsonValue::as_str)
            .unwrap_or(DEFAULT_STATUS)
            .to_string();

        Ok(())
    }
}
