//! Scrape Orchestration
//!
//! Runs the active collectors concurrently under a deadline and records
//! per-collector meta-metrics.

mod meta;
mod scrape;

pub use meta::{MetaMetrics, ScrapeOutcome, ScrapeResult};
pub use scrape::{OrchestratorConfig, ScrapeBatch, ScrapeOrchestrator, DEFAULT_SCRAPE_TIMEOUT};
