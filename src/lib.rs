pub mod config;
pub mod error;
pub mod handler;
pub mod kafka;
pub mod models;
pub mod pipeline;
pub mod schema;

pub use config::Config;
pub use error::{Error, Result};
pub use handler::{DispatchOutcome, EventHandler, HandlerError, HandlerRegistry};
pub use kafka::{
    BrokerAdmin, EventConsumer, EventProducer, TopicProvisioner, TopicRegistry, TopicSpec,
};
pub use pipeline::Pipeline;
pub use schema::{AvroSchema, Envelope, EventCodec, SchemaPair, SchemaRegistryClient};
