//! Collector Contract
//!
//! The capability every metric source implements, the per-update sink it
//! writes into, and the error taxonomy the orchestrator classifies.

mod traits;

pub use traits::{Collector, CollectorContext, CollectorError, Sink, DEFAULT_NAMESPACE};
