//! poem-enricher adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `bluesky`: Bluesky feed reader (and a stub source)
//! - `llm`: Language-model adapters (OpenAI chat completions, stub)
//! - `json_file`: JSON input and output files

pub mod bluesky;
pub mod json_file;
pub mod llm;

pub use json_file::{JsonFileError, load_posts, write_json};
