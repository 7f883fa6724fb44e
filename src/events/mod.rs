//! In-process lifecycle event bus. The orchestrator publishes every
//! significant transition here; tests and embedding hosts subscribe for
//! observability.

mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};
