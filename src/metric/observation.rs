//! Observations and the typed emission helper.

use std::sync::Arc;

use super::descriptor::{MetricDescriptor, ValueKind};
use crate::error::Result;

/// One concrete metric value bound to a descriptor and its label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    descriptor: Arc<MetricDescriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl Observation {
    /// Descriptor this value belongs to
    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.descriptor
    }

    /// Fully-qualified metric name
    pub fn fq_name(&self) -> &str {
        self.descriptor.fq_name()
    }

    /// Observed value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label values, in descriptor label order
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Look up a label value by label name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .label_names()
            .iter()
            .position(|n| n == name)
            .map(|i| self.label_values[i].as_str())
    }
}

/// A descriptor ready to produce observations.
///
/// Collectors hold one `TypedDesc` per metric family and call
/// [`observe`](Self::observe) during every update.
#[derive(Debug, Clone)]
pub struct TypedDesc {
    desc: Arc<MetricDescriptor>,
}

impl TypedDesc {
    /// Build a descriptor and wrap it.
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
        value_kind: ValueKind,
    ) -> Result<Self> {
        Ok(Self {
            desc: MetricDescriptor::new(fq_name, help, label_names, value_kind)?,
        })
    }

    /// Shorthand for a gauge family.
    pub fn gauge(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Result<Self> {
        Self::new(fq_name, help, label_names, ValueKind::Gauge)
    }

    /// Shorthand for a counter family.
    pub fn counter(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Result<Self> {
        Self::new(fq_name, help, label_names, ValueKind::Counter)
    }

    /// Underlying descriptor
    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.desc
    }

    /// Value kind of the family
    pub fn value_kind(&self) -> ValueKind {
        self.desc.value_kind()
    }

    /// Produce an observation.
    ///
    /// # Panics
    ///
    /// Panics when the number of label values differs from the descriptor's
    /// label names. That is a bug in the calling collector. Release builds
    /// abort the process (`panic = "abort"`). Development and test builds
    /// unwind instead; the orchestrator contains the panic and reports the
    /// collector as [`ScrapeOutcome::Panicked`](crate::orchestrator::ScrapeOutcome::Panicked)
    /// with `success=0`.
    pub fn observe<S: AsRef<str>>(&self, value: f64, label_values: &[S]) -> Observation {
        let expected = self.desc.label_names().len();
        assert!(
            label_values.len() == expected,
            "metric {} expects {} label values, got {}",
            self.desc.fq_name(),
            expected,
            label_values.len()
        );

        Observation {
            descriptor: Arc::clone(&self.desc),
            value,
            label_values: label_values
                .iter()
                .map(|v| v.as_ref().to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_LABELS: &[&str] = &[];

    #[test]
    fn test_observe_with_labels() {
        let desc = TypedDesc::counter("node_disk_reads_total", "Reads.", &["device"]).unwrap();
        let obs = desc.observe(42.0, &["sda"]);

        assert_eq!(obs.fq_name(), "node_disk_reads_total");
        assert_eq!(obs.value(), 42.0);
        assert_eq!(obs.label("device"), Some("sda"));
        assert_eq!(obs.label("missing"), None);
        assert_eq!(obs.descriptor().value_kind(), ValueKind::Counter);
    }

    #[test]
    fn test_observe_without_labels() {
        let desc = TypedDesc::gauge("node_load1", "1m load average.", &[]).unwrap();
        let obs = desc.observe(0.25, NO_LABELS);
        assert!(obs.label_values().is_empty());
    }

    #[test]
    fn test_observations_share_descriptor() {
        let desc = TypedDesc::gauge("node_x", "x", &["a"]).unwrap();
        let first = desc.observe(1.0, &["one"]);
        let second = desc.observe(2.0, &[String::from("two")]);
        assert!(Arc::ptr_eq(first.descriptor(), second.descriptor()));
    }

    #[test]
    #[should_panic(expected = "expects 1 label values, got 2")]
    fn test_label_arity_mismatch_panics() {
        let desc = TypedDesc::gauge("node_x", "x", &["device"]).unwrap();
        let _ = desc.observe(1.0, &["sda", "extra"]);
    }

    #[test]
    #[should_panic(expected = "expects 2 label values, got 0")]
    fn test_missing_labels_panics() {
        let desc = TypedDesc::gauge("node_x", "x", &["a", "b"]).unwrap();
        let _ = desc.observe(1.0, NO_LABELS);
    }
}
