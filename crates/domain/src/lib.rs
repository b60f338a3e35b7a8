//! poem-enricher domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Fetching, date selection, enrichment and the pipeline
//! - `policy`: Tag vocabulary constraints
//! - `reply`: Parsing of raw model completions
//! - `record`: Output record shape of enriched posts

pub mod model;
pub mod policy;
pub mod ports;
pub mod record;
pub mod reply;
pub mod usecases;

pub use model::*;
pub use ports::*;
