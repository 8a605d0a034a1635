//! PostgreSQL adapters - Database implementations of the persistence ports.
//!
//! - `PostgresCaseRepository` - Case creation and lookup
//! - `PostgresEvaluationReader` - Filtered evaluation reads
//! - `PostgresRoundResultReader` - Round analysis history
//! - `PostgresCaseUnitOfWork` - Row-locked transactions for round writes

mod case_repository;
mod evaluation_reader;
mod round_result_reader;
mod rows;
mod unit_of_work;

pub use case_repository::PostgresCaseRepository;
pub use evaluation_reader::PostgresEvaluationReader;
pub use round_result_reader::PostgresRoundResultReader;
pub use unit_of_work::{PostgresCaseTransaction, PostgresCaseUnitOfWork};
