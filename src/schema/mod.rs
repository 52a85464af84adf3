pub mod codec;
pub mod registry;

pub use codec::{AvroSchema, Envelope, EventCodec, SchemaPair};
pub use registry::SchemaRegistryClient;
