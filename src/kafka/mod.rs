pub mod admin;
pub mod consumer;
pub mod producer;
pub mod provisioner;

#[cfg(test)]
mod tests;

pub use admin::BrokerAdmin;
pub use consumer::EventConsumer;
pub use producer::EventProducer;
pub use provisioner::{TopicProvisioner, TopicRegistry, TopicSpec};

/// Lifecycle of a producer or consumer handle. Construction hands back an
/// open handle; no operation besides `close` is valid once closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandleState {
    Open,
    Closed,
}
