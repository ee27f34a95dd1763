//! Hatchery integrations: provider connectors and the concrete cloud and
//! HTTP collaborators the core engine runs against.

pub mod aws;
pub mod connectors;
pub mod http;
#[cfg(feature = "gcs")]
pub mod object_sink;
pub mod registry;
pub mod webhook;

pub use http::ReqwestTransport;
#[cfg(feature = "gcs")]
pub use object_sink::ObjectStoreSink;
pub use registry::default_registry;
pub use webhook::WebhookReporter;
