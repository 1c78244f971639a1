//! Per-collector scrape results and the meta-metrics that describe them.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::collector::DEFAULT_NAMESPACE;
use crate::error::Result;
use crate::metric::{build_fq_name, Observation, TypedDesc};

/// How a collector's part of a scrape ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeOutcome {
    /// Update returned `Ok`
    Success,
    /// Update returned the no-data sentinel
    NoData,
    /// Update returned an error
    Failed,
    /// Update did not finish before the scrape deadline
    TimedOut,
    /// Previous update on the same instance still held it at the deadline
    Busy,
    /// Update panicked
    Panicked,
}

impl ScrapeOutcome {
    /// Value of `scrape_collector_success`.
    pub fn is_success(self) -> bool {
        matches!(self, ScrapeOutcome::Success | ScrapeOutcome::NoData)
    }
}

impl fmt::Display for ScrapeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScrapeOutcome::Success => "success",
            ScrapeOutcome::NoData => "no_data",
            ScrapeOutcome::Failed => "failed",
            ScrapeOutcome::TimedOut => "timed_out",
            ScrapeOutcome::Busy => "busy",
            ScrapeOutcome::Panicked => "panicked",
        };
        f.write_str(s)
    }
}

/// One collector's result for one scrape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeResult {
    /// Collector name
    pub collector: String,
    /// Wall-clock time spent, in seconds
    pub duration_seconds: f64,
    /// Whether the collector counts as successful
    pub success: bool,
    /// Detailed outcome
    pub outcome: ScrapeOutcome,
}

impl ScrapeResult {
    pub(crate) fn new(collector: &str, duration: Duration, outcome: ScrapeOutcome) -> Self {
        Self {
            collector: collector.to_string(),
            duration_seconds: duration.as_secs_f64(),
            success: outcome.is_success(),
            outcome,
        }
    }
}

/// Descriptors for `scrape_collector_duration_seconds` and
/// `scrape_collector_success`.
#[derive(Debug, Clone)]
pub struct MetaMetrics {
    duration: TypedDesc,
    success: TypedDesc,
}

impl MetaMetrics {
    /// Build the descriptors under `namespace`.
    pub fn new(namespace: &str) -> Result<Self> {
        Ok(Self {
            duration: TypedDesc::gauge(
                build_fq_name(namespace, "scrape", "collector_duration_seconds"),
                format!("{}: Duration of a collector scrape.", namespace),
                &["collector"],
            )?,
            success: TypedDesc::gauge(
                build_fq_name(namespace, "scrape", "collector_success"),
                format!("{}: Whether a collector succeeded.", namespace),
                &["collector"],
            )?,
        })
    }

    /// Duration descriptor
    pub fn duration(&self) -> &TypedDesc {
        &self.duration
    }

    /// Success descriptor
    pub fn success(&self) -> &TypedDesc {
        &self.success
    }

    /// The two meta observations for one result, duration first.
    pub fn observe(&self, result: &ScrapeResult) -> [Observation; 2] {
        let labels = [result.collector.as_str()];
        [
            self.duration.observe(result.duration_seconds, &labels),
            self.success
                .observe(if result.success { 1.0 } else { 0.0 }, &labels),
        ]
    }
}

impl Default for MetaMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE).expect("default namespace is a valid metric prefix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_success_mapping() {
        assert!(ScrapeOutcome::Success.is_success());
        assert!(ScrapeOutcome::NoData.is_success());
        assert!(!ScrapeOutcome::Failed.is_success());
        assert!(!ScrapeOutcome::TimedOut.is_success());
        assert!(!ScrapeOutcome::Busy.is_success());
        assert!(!ScrapeOutcome::Panicked.is_success());
    }

    #[test]
    fn test_meta_metric_names() {
        let meta = MetaMetrics::new("node").unwrap();
        assert_eq!(
            meta.duration().descriptor().fq_name(),
            "node_scrape_collector_duration_seconds"
        );
        assert_eq!(
            meta.success().descriptor().fq_name(),
            "node_scrape_collector_success"
        );
    }

    #[test]
    fn test_meta_observations() {
        let meta = MetaMetrics::default();
        let result = ScrapeResult::new("cpu", Duration::from_millis(250), ScrapeOutcome::Failed);
        let [duration, success] = meta.observe(&result);

        assert_eq!(duration.value(), 0.25);
        assert_eq!(duration.label("collector"), Some("cpu"));
        assert_eq!(success.value(), 0.0);
    }

    #[test]
    fn test_custom_namespace() {
        let meta = MetaMetrics::new("host").unwrap();
        assert_eq!(
            meta.success().descriptor().fq_name(),
            "host_scrape_collector_success"
        );
    }

    #[test]
    fn test_invalid_namespace() {
        assert!(MetaMetrics::new("bad namespace").is_err());
    }

    #[test]
    fn test_result_serializes() {
        let result = ScrapeResult::new("time", Duration::ZERO, ScrapeOutcome::NoData);
        let yaml = serde_yaml::to_string(&result).unwrap();
        assert!(yaml.contains("outcome: no_data"));
        assert!(yaml.contains("success: true"));
    }
}
