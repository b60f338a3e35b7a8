//! Application use cases / business logic

pub mod enrich;
pub mod fetch;
pub mod pipeline;
pub mod window;

pub use enrich::{EnrichConfig, EnrichConfigError, Enricher, FeatureFlags};
pub use fetch::FeedFetcher;
pub use pipeline::{EnrichedRun, Pipeline, PipelineConfig, Selection};
pub use window::{DateBounds, DateWindow, WindowFilter};
