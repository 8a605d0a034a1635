//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the engine and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `CaseRepository` - Case creation and lookup
//! - `EvaluationReader` - Filtered evaluation reads
//! - `RoundResultReader` - Round analysis history
//! - `CaseUnitOfWork` / `CaseTransaction` - Locked, atomic per-case writes
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing domain events

mod case_repository;
mod case_unit_of_work;
mod evaluation_reader;
mod event_publisher;
mod round_result_reader;

pub use case_repository::CaseRepository;
pub use case_unit_of_work::{CaseTransaction, CaseUnitOfWork};
pub use evaluation_reader::EvaluationReader;
pub use event_publisher::EventPublisher;
pub use round_result_reader::RoundResultReader;
