//! Schema-bound encoding and decoding of event payloads.
//!
//! Payloads written with a registered schema use the registry wire format:
//!
//! ```text
//! [0x00][schema_id: 4 bytes big-endian][avro binary datum]
//! ```
//!
//! so any consumer with access to the same registry can recover the exact
//! schema a payload was written with. Topics without a value schema carry
//! their value bytes unframed (raw passthrough).

use crate::schema::registry::SchemaRegistryClient;
use crate::{Error, Result};
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value as JsonValue;
use std::sync::Arc;

const WIRE_MAGIC: u8 = 0x00;
const WIRE_HEADER_LEN: usize = 5;

/// A parsed Avro schema together with its registry-submittable definition.
#[derive(Debug, Clone)]
pub struct AvroSchema {
    definition: String,
    schema: Schema,
}

impl AvroSchema {
    pub fn parse(definition: &str) -> Result<Self> {
        let schema = Schema::parse_str(definition)?;
        Ok(Self {
            definition: definition.to_string(),
            schema,
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// The key schema and optional value schema bound to a topic.
///
/// An absent value schema puts the topic in raw passthrough mode: value
/// bytes are not framed or validated, supporting externally-typed payloads.
#[derive(Debug, Clone)]
pub struct SchemaPair {
    pub key: AvroSchema,
    pub value: Option<AvroSchema>,
}

impl SchemaPair {
    pub fn new(key: AvroSchema, value: AvroSchema) -> Self {
        Self {
            key,
            value: Some(value),
        }
    }

    pub fn keyed_only(key: AvroSchema) -> Self {
        Self { key, value: None }
    }
}

/// The wire-level unit exchanged with the broker.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub partition_hint: Option<i32>,
}

/// Encodes and decodes key/value pairs against registry-bound schemas.
#[derive(Clone)]
pub struct EventCodec {
    registry: Arc<SchemaRegistryClient>,
}

impl EventCodec {
    pub fn new(registry: Arc<SchemaRegistryClient>) -> Self {
        Self { registry }
    }

    /// Register (or resolve) the schemas a topic is bound to.
    ///
    /// Called at producer construction so schema conflicts fail the
    /// constructor instead of the first publish.
    pub async fn register_schemas(&self, topic: &str, schemas: &SchemaPair) -> Result<()> {
        self.registry
            .register(&key_subject(topic), schemas.key.definition())
            .await?;
        if let Some(value) = &schemas.value {
            self.registry
                .register(&value_subject(topic), value.definition())
                .await?;
        }
        Ok(())
    }

    pub async fn encode(
        &self,
        topic: &str,
        key: &JsonValue,
        value: &JsonValue,
        schemas: &SchemaPair,
    ) -> Result<Envelope> {
        let key_id = self
            .registry
            .register(&key_subject(topic), schemas.key.definition())
            .await?;
        let key_bytes = frame_datum(key_id, &encode_datum(key, schemas.key.schema())?);

        let value_bytes = match &schemas.value {
            Some(value_schema) => {
                let value_id = self
                    .registry
                    .register(&value_subject(topic), value_schema.definition())
                    .await?;
                frame_datum(value_id, &encode_datum(value, value_schema.schema())?)
            }
            None => serde_json::to_vec(value)?,
        };

        Ok(Envelope {
            topic: topic.to_string(),
            key: key_bytes,
            value: value_bytes,
            partition_hint: None,
        })
    }

    pub async fn decode(
        &self,
        envelope: &Envelope,
        schemas: &SchemaPair,
    ) -> Result<(JsonValue, JsonValue)> {
        let key = self.decode_framed(&envelope.key).await?;
        let value = match &schemas.value {
            Some(_) => self.decode_framed(&envelope.value).await?,
            None => passthrough_value(&envelope.value),
        };
        Ok((key, value))
    }

    async fn decode_framed(&self, payload: &[u8]) -> Result<JsonValue> {
        let (schema_id, datum) = parse_frame(payload)?;
        let schema = self.registry.schema_by_id(schema_id).await?;
        let mut reader = datum;
        let avro = apache_avro::from_avro_datum(&schema, &mut reader, None)
            .map_err(|e| Error::Decode(format!("avro decode: {e}")))?;
        Ok(avro_to_json(&avro))
    }
}

fn key_subject(topic: &str) -> String {
    format!("{topic}-key")
}

fn value_subject(topic: &str) -> String {
    format!("{topic}-value")
}

fn encode_datum(value: &JsonValue, schema: &Schema) -> Result<Vec<u8>> {
    let avro = json_to_avro(value, schema);
    apache_avro::to_avro_datum(schema, avro).map_err(Into::into)
}

fn frame_datum(schema_id: u32, datum: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(WIRE_HEADER_LEN + datum.len());
    buf.put_u8(WIRE_MAGIC);
    buf.put_u32(schema_id);
    buf.put_slice(datum);
    buf.to_vec()
}

fn parse_frame(payload: &[u8]) -> Result<(u32, &[u8])> {
    if payload.len() < WIRE_HEADER_LEN {
        return Err(Error::Decode(format!(
            "payload too short for wire format: {} bytes",
            payload.len()
        )));
    }
    if payload[0] != WIRE_MAGIC {
        return Err(Error::Decode(format!(
            "unexpected magic byte {:#04x}",
            payload[0]
        )));
    }
    let mut header = &payload[1..WIRE_HEADER_LEN];
    let schema_id = header.get_u32();
    Ok((schema_id, &payload[WIRE_HEADER_LEN..]))
}

/// Lenient parse for passthrough payloads: handlers always receive a
/// structured value, never raw bytes.
fn passthrough_value(payload: &[u8]) -> JsonValue {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(payload).into_owned()))
}

fn avro_to_json(value: &AvroValue) -> JsonValue {
    match value {
        AvroValue::Null => JsonValue::Null,
        AvroValue::Boolean(b) => JsonValue::Bool(*b),
        AvroValue::Int(i) => serde_json::json!(i),
        AvroValue::Long(l) => serde_json::json!(l),
        AvroValue::Float(f) => serde_json::json!(f),
        AvroValue::Double(d) => serde_json::json!(d),
        AvroValue::Bytes(b) | AvroValue::Fixed(_, b) => JsonValue::String(BASE64.encode(b)),
        AvroValue::String(s) | AvroValue::Enum(_, s) => JsonValue::String(s.clone()),
        AvroValue::Union(_, inner) => avro_to_json(inner),
        AvroValue::Array(items) => JsonValue::Array(items.iter().map(avro_to_json).collect()),
        AvroValue::Map(entries) => {
            let map: serde_json::Map<String, JsonValue> = entries
                .iter()
                .map(|(k, v)| (k.clone(), avro_to_json(v)))
                .collect();
            JsonValue::Object(map)
        }
        AvroValue::Record(fields) => {
            let map: serde_json::Map<String, JsonValue> = fields
                .iter()
                .map(|(k, v)| (k.clone(), avro_to_json(v)))
                .collect();
            JsonValue::Object(map)
        }
        AvroValue::Date(d) => serde_json::json!(d),
        AvroValue::TimeMillis(t) => serde_json::json!(t),
        AvroValue::TimeMicros(t) => serde_json::json!(t),
        AvroValue::TimestampMillis(t) => serde_json::json!(t),
        AvroValue::TimestampMicros(t) => serde_json::json!(t),
        AvroValue::TimestampNanos(t) => serde_json::json!(t),
        AvroValue::Decimal(d) => {
            let bytes: Vec<u8> = d.try_into().unwrap_or_default();
            JsonValue::String(BASE64.encode(&bytes))
        }
        AvroValue::BigDecimal(d) => JsonValue::String(d.to_string()),
        AvroValue::Uuid(u) => JsonValue::String(u.to_string()),
        AvroValue::Duration(_) => JsonValue::Null,
        AvroValue::LocalTimestampMillis(t) => serde_json::json!(t),
        AvroValue::LocalTimestampMicros(t) => serde_json::json!(t),
        AvroValue::LocalTimestampNanos(t) => serde_json::json!(t),
    }
}

/// Shape a JSON value to the given schema. Mismatches degrade to `Null`
/// and are caught by avro's own validation inside `to_avro_datum`, so
/// encode failures surface synchronously to the publisher.
fn json_to_avro(value: &JsonValue, schema: &Schema) -> AvroValue {
    match (value, schema) {
        (JsonValue::Null, _) => AvroValue::Null,
        (val, Schema::Union(union_schema)) => {
            match union_variant_for(val, union_schema.variants()) {
                Some((idx, variant)) => {
                    AvroValue::Union(idx, Box::new(json_to_avro(val, variant)))
                }
                None => AvroValue::Null,
            }
        }
        (JsonValue::Bool(b), _) => AvroValue::Boolean(*b),
        (JsonValue::Number(n), Schema::Int) => AvroValue::Int(n.as_i64().unwrap_or(0) as i32),
        (JsonValue::Number(n), Schema::Long) => AvroValue::Long(n.as_i64().unwrap_or(0)),
        (JsonValue::Number(n), Schema::Float) => {
            AvroValue::Float(n.as_f64().unwrap_or(0.0) as f32)
        }
        (JsonValue::Number(n), Schema::Double) => AvroValue::Double(n.as_f64().unwrap_or(0.0)),
        (JsonValue::Number(n), _) => {
            if let Some(i) = n.as_i64() {
                AvroValue::Long(i)
            } else if let Some(f) = n.as_f64() {
                AvroValue::Double(f)
            } else {
                AvroValue::Null
            }
        }
        (JsonValue::String(s), _) => AvroValue::String(s.clone()),
        (JsonValue::Array(items), Schema::Array(inner)) => AvroValue::Array(
            items
                .iter()
                .map(|item| json_to_avro(item, &inner.items))
                .collect(),
        ),
        (JsonValue::Object(map), Schema::Record(record_schema)) => {
            let mut fields = Vec::new();
            for field in &record_schema.fields {
                let field_val = map.get(&field.name).unwrap_or(&JsonValue::Null);
                fields.push((field.name.clone(), json_to_avro(field_val, &field.schema)));
            }
            AvroValue::Record(fields)
        }
        (JsonValue::Object(map), Schema::Map(inner)) => AvroValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_avro(v, &inner.types)))
                .collect(),
        ),
        _ => AvroValue::Null,
    }
}

fn union_variant_for<'a>(
    value: &JsonValue,
    variants: &'a [Schema],
) -> Option<(u32, &'a Schema)> {
    let matches = |variant: &Schema| match value {
        JsonValue::Null => matches!(variant, Schema::Null),
        JsonValue::Bool(_) => matches!(variant, Schema::Boolean),
        JsonValue::Number(_) => matches!(
            variant,
            Schema::Int | Schema::Long | Schema::Float | Schema::Double
        ),
        JsonValue::String(_) => {
            matches!(variant, Schema::String | Schema::Enum(_) | Schema::Bytes)
        }
        JsonValue::Array(_) => matches!(variant, Schema::Array(_)),
        JsonValue::Object(_) => matches!(variant, Schema::Record(_) | Schema::Map(_)),
    };

    variants
        .iter()
        .enumerate()
        .find(|(_, variant)| matches(variant))
        .map(|(idx, variant)| (idx as u32, variant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_value_schema() -> AvroSchema {
        AvroSchema::parse(
            r#"{
                "type": "record",
                "name": "WeatherReading",
                "fields": [
                    {"name": "temperature", "type": "double"},
                    {"name": "status", "type": "string"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_frame_round_trip() {
        let framed = frame_datum(42, b"datum-bytes");

        assert_eq!(framed[0], 0x00);
        assert_eq!(&framed[1..5], &42u32.to_be_bytes());

        let (schema_id, datum) = parse_frame(&framed).unwrap();
        assert_eq!(schema_id, 42);
        assert_eq!(datum, b"datum-bytes");
    }

    #[test]
    fn test_parse_frame_rejects_short_payload() {
        let err = parse_frame(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_parse_frame_rejects_bad_magic() {
        let err = parse_frame(&[0x01, 0, 0, 0, 7, 0xFF]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_avro_datum_round_trip() {
        let schema = weather_value_schema();
        let value = json!({"temperature": 72.5, "status": "sunny"});

        let datum = encode_datum(&value, schema.schema()).unwrap();
        let mut reader = datum.as_slice();
        let decoded =
            apache_avro::from_avro_datum(schema.schema(), &mut reader, None).unwrap();

        assert_eq!(avro_to_json(&decoded), value);
    }

    #[test]
    fn test_encode_rejects_value_missing_required_field() {
        let schema = weather_value_schema();
        let value = json!({"status": "sunny"}); // temperature absent, not nullable

        assert!(encode_datum(&value, schema.schema()).is_err());
    }

    #[test]
    fn test_nullable_union_field_round_trip() {
        let schema = AvroSchema::parse(
            r#"{
                "type": "record",
                "name": "Sparse",
                "fields": [
                    {"name": "label", "type": "string"},
                    {"name": "reading", "type": ["null", "double"], "default": null}
                ]
            }"#,
        )
        .unwrap();

        let present = json!({"label": "a", "reading": 1.5});
        let datum = encode_datum(&present, schema.schema()).unwrap();
        let mut reader = datum.as_slice();
        let decoded = apache_avro::from_avro_datum(schema.schema(), &mut reader, None).unwrap();
        assert_eq!(avro_to_json(&decoded), present);

        let absent = json!({"label": "b"});
        let datum = encode_datum(&absent, schema.schema()).unwrap();
        let mut reader = datum.as_slice();
        let decoded = apache_avro::from_avro_datum(schema.schema(), &mut reader, None).unwrap();
        assert_eq!(avro_to_json(&decoded), json!({"label": "b", "reading": null}));
    }

    #[test]
    fn test_passthrough_value_parses_json() {
        let parsed = passthrough_value(br#"{"raw": true}"#);
        assert_eq!(parsed, json!({"raw": true}));
    }

    #[test]
    fn test_passthrough_value_falls_back_to_string() {
        let parsed = passthrough_value(b"not json at all");
        assert_eq!(parsed, json!("not json at all"));
    }
}
