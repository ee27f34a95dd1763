//! Hatchery core library: action model, selector, executor and the generic
//! harvester loops shared by every connector.

pub mod clock;
pub mod connector;
pub mod error;
pub mod executor;
pub mod http;
pub mod models;
pub mod naming;
pub mod o11y;
pub mod report;
pub mod selector;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use connector::{
    Connector, ConnectorProvider, ConnectorRegistry, HarvestContext, PageRequest, PollingSource,
    QueueDrainSource,
};
pub use error::{ActionFailure, Error, Result};
pub use executor::{ExecuteOptions, Executor};
pub use http::{HttpRequest, HttpResponse, HttpTransport};
pub use models::{Action, RequestId};
pub use naming::Partition;
pub use report::{ErrorReporter, FailureReport, NoopReporter};
pub use selector::Selector;
pub use storage::{
    BytesStream, FileRef, MessageQueue, ObjectSink, ObjectSource, ObjectWriter, QueueMessage,
};
