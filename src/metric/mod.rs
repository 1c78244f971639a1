//! Metric Model
//!
//! Descriptors, observations and the helper collectors use to emit them.
//!
//! ```text
//! TypedDesc ──observe(value, labels)──▶ Observation ──▶ Sink
//!     │                                     │
//!     └──────── Arc<MetricDescriptor> ◀─────┘
//! ```

mod descriptor;
mod observation;

pub use descriptor::{build_fq_name, sanitize_metric_name, MetricDescriptor, ValueKind};
pub use observation::{Observation, TypedDesc};
