//! Core collector trait and types.

use thiserror::Error;

use crate::config::PathConfig;
use crate::metric::Observation;

/// Default metric namespace.
pub const DEFAULT_NAMESPACE: &str = "node";

/// Errors a collector can return from a single update.
///
/// [`CollectorError::NoData`] is the sentinel for expected absence: the source
/// does not exist on this host or build. The orchestrator reports it as a
/// successful scrape with no observations. Every other variant is a failure
/// contained to the collector that returned it.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Source is legitimately unavailable
    #[error("collector returned no data")]
    NoData,

    /// I/O failure with the path, socket or call that failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Source content could not be interpreted
    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

impl CollectorError {
    /// Wrap an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Build a parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// True for the expected-absence sentinel.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Per-update buffer that receives a collector's observations.
///
/// The orchestrator hands every update a fresh sink and forwards its contents
/// only when the update succeeds.
#[derive(Debug, Default)]
pub struct Sink {
    observations: Vec<Observation>,
}

impl Sink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one observation.
    pub fn emit(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Number of buffered observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True when nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Buffered observations
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Consume the sink.
    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }
}

impl Extend<Observation> for Sink {
    fn extend<I: IntoIterator<Item = Observation>>(&mut self, iter: I) {
        self.observations.extend(iter);
    }
}

/// Shared settings handed to every collector factory.
#[derive(Debug, Clone)]
pub struct CollectorContext {
    /// Metric namespace (prefix)
    pub namespace: String,
    /// Host mount points
    pub paths: PathConfig,
}

impl Default for CollectorContext {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            paths: PathConfig::default(),
        }
    }
}

/// A source of metrics.
///
/// `update` is called once per scrape on a blocking-pool thread. The
/// orchestrator never runs two updates on the same instance at once, so
/// implementations may keep plain mutable state between calls.
///
/// Return `Ok(())` after emitting zero or more observations,
/// [`CollectorError::NoData`] when the source does not exist here, or any other
/// error to report a failure. Observations emitted before an error are dropped.
pub trait Collector: Send + 'static {
    /// Gather current values into `sink`.
    fn update(&mut self, sink: &mut Sink) -> Result<(), CollectorError>;
}

impl<F> Collector for F
where
    F: FnMut(&mut Sink) -> Result<(), CollectorError> + Send + 'static,
{
    fn update(&mut self, sink: &mut Sink) -> Result<(), CollectorError> {
        self(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::TypedDesc;

    #[test]
    fn test_no_data_sentinel() {
        assert!(CollectorError::NoData.is_no_data());
        assert!(!CollectorError::Other("boom".into()).is_no_data());
    }

    #[test]
    fn test_io_error_carries_context() {
        let err = CollectorError::io(
            "/proc/loadavg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "/proc/loadavg: denied");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_parse_error_message() {
        let err = CollectorError::parse("/proc/loadavg", "empty file");
        assert_eq!(err.to_string(), "failed to parse /proc/loadavg: empty file");
    }

    #[test]
    fn test_sink_buffers_in_order() {
        let desc = TypedDesc::gauge("node_x", "x", &["i"]).unwrap();
        let mut sink = Sink::new();
        assert!(sink.is_empty());

        sink.emit(desc.observe(1.0, &["a"]));
        sink.extend(vec![desc.observe(2.0, &["b"]), desc.observe(3.0, &["c"])]);

        assert_eq!(sink.len(), 3);
        let values: Vec<f64> = sink.into_observations().iter().map(|o| o.value()).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_closure_collector() {
        let desc = TypedDesc::gauge("node_y", "y", &[]).unwrap();
        let mut calls = 0;
        let mut collector = move |sink: &mut Sink| -> Result<(), CollectorError> {
            calls += 1;
            sink.emit(desc.observe(calls as f64, &[] as &[&str]));
            Ok(())
        };

        let mut sink = Sink::new();
        Collector::update(&mut collector, &mut sink).unwrap();
        Collector::update(&mut collector, &mut sink).unwrap();
        assert_eq!(sink.observations()[1].value(), 2.0);
    }

    #[test]
    fn test_default_context() {
        let ctx = CollectorContext::default();
        assert_eq!(ctx.namespace, "node");
    }
}
