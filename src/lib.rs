//! Fuzzy Delphi - round convergence engine for expert consensus studies
//!
//! Evaluators score criteria and technology×criterion pairs as triangular
//! fuzzy numbers. Each round is analyzed for convergence; diverging opinions
//! are flagged and collected again until the panel agrees.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
