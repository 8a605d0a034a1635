//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `postgres` - sqlx-backed persistence
//! - `memory` - In-process persistence with the same transactional contract
//! - `events` - Event publishers (recording bus, structured log)

pub mod events;
pub mod memory;
pub mod postgres;

pub use events::{InMemoryEventBus, TracingEventPublisher};
pub use memory::InMemoryDelphiStore;
pub use postgres::{
    PostgresCaseRepository, PostgresCaseUnitOfWork, PostgresEvaluationReader,
    PostgresRoundResultReader,
};
