use crate::config::SchemaRegistryConfig;
use crate::{Error, Result};
use apache_avro::Schema;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Client for a Confluent-compatible schema registry.
///
/// Registered schema ids and resolved schemas are cached for the lifetime
/// of the client, so steady-state encode/decode paths do not touch the
/// registry after the first message per subject.
pub struct SchemaRegistryClient {
    http: reqwest::Client,
    base_url: String,
    subject_ids: RwLock<HashMap<String, u32>>,
    schemas_by_id: RwLock<HashMap<u32, Schema>>,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
}

impl SchemaRegistryClient {
    pub fn new(config: &SchemaRegistryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build registry client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            subject_ids: RwLock::new(HashMap::new()),
            schemas_by_id: RwLock::new(HashMap::new()),
        })
    }

    /// Register a schema under the given subject, or resolve its id if an
    /// identical schema is already registered.
    ///
    /// An incompatible schema for an existing subject is a fatal
    /// [`Error::SchemaConflict`]; an unreachable registry is
    /// [`Error::RegistryUnavailable`] and is not retried here.
    pub async fn register(&self, subject: &str, schema_json: &str) -> Result<u32> {
        if let Some(id) = self.subject_ids.read().await.get(subject) {
            return Ok(*id);
        }

        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let body = serde_json::json!({ "schema": schema_json });

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/vnd.schemaregistry.v1+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::RegistryUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let parsed: RegisterResponse = response
                .json()
                .await
                .map_err(|e| Error::RegistryUnavailable(format!("malformed registry response: {e}")))?;
            info!(subject, schema_id = parsed.id, "Registered schema");
            self.subject_ids
                .write()
                .await
                .insert(subject.to_string(), parsed.id);
            return Ok(parsed.id);
        }

        let detail = response.text().await.unwrap_or_default();
        match status {
            // 409: incompatible with a previous version; 422: rejected as invalid
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(Error::SchemaConflict {
                subject: subject.to_string(),
                message: detail,
            }),
            _ => Err(Error::RegistryUnavailable(format!(
                "registry returned {status} for subject '{subject}': {detail}"
            ))),
        }
    }

    /// Resolve the schema that was used to write a payload, by the id
    /// carried in its wire-format header.
    pub async fn schema_by_id(&self, id: u32) -> Result<Schema> {
        if let Some(schema) = self.schemas_by_id.read().await.get(&id) {
            return Ok(schema.clone());
        }

        let url = format!("{}/schemas/ids/{id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::RegistryUnavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::Decode(format!("schema id {id} not found in registry")));
        }
        if !status.is_success() {
            return Err(Error::RegistryUnavailable(format!(
                "registry returned {status} for schema id {id}"
            )));
        }

        let parsed: SchemaResponse = response
            .json()
            .await
            .map_err(|e| Error::RegistryUnavailable(format!("malformed registry response: {e}")))?;
        let schema = Schema::parse_str(&parsed.schema)
            .map_err(|e| Error::Decode(format!("registry returned unparseable schema {id}: {e}")))?;

        debug!(schema_id = id, "Resolved schema from registry");
        self.schemas_by_id.write().await.insert(id, schema.clone());
        Ok(schema)
    }
}
