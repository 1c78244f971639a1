//! nodestat - Host Telemetry Exporter
//!
//! Gathers host metrics from a set of pluggable collectors and exposes them in
//! the Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! CollectorRegistry → CollectorSelection → ScrapeOrchestrator → exposition
//!   (name, default,     (defaults, file,     (one blocking task    (text
//!    factory)            CLI overrides)       per collector)        format)
//! ```
//!
//! Every scrape runs all active collectors concurrently under a deadline. A
//! failing, slow or panicking collector only affects its own meta-metrics:
//! `<namespace>_scrape_collector_duration_seconds` and
//! `<namespace>_scrape_collector_success`.
//!
//! # Modules
//!
//! - [`collector`] - The `Collector` contract, `Sink` and `CollectorError`
//! - [`collectors`] - Built-in collectors
//! - [`config`] - Collector selection, host paths, config file and CLI flags
//! - [`error`] - Error types
//! - [`exposition`] - Prometheus text encoding
//! - [`metric`] - Metric descriptors and observations
//! - [`orchestrator`] - Concurrent scrape execution
//! - [`registry`] - Name to factory mapping

pub mod collector;
pub mod collectors;
pub mod config;
pub mod error;
pub mod exposition;
pub mod metric;
pub mod orchestrator;
pub mod registry;

pub use collector::{Collector, CollectorContext, CollectorError, Sink};
pub use error::{Error, Result};
pub use metric::{MetricDescriptor, Observation, TypedDesc, ValueKind};
pub use orchestrator::{
    OrchestratorConfig, ScrapeBatch, ScrapeOrchestrator, ScrapeOutcome, ScrapeResult,
};
pub use registry::CollectorRegistry;
