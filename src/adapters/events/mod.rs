//! Event publishing adapters.
//!
//! - `InMemoryEventBus` - Recording, in-process bus for tests
//! - `TracingEventPublisher` - Emits events to the structured log

mod in_memory;
mod tracing_publisher;

pub use in_memory::InMemoryEventBus;
pub use tracing_publisher::TracingEventPublisher;
