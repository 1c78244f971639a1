//! Text Exposition
//!
//! Renders a [`ScrapeBatch`] in the Prometheus text format. Observations are
//! grouped into families by fully-qualified name, loaded into a throwaway
//! `prometheus::Registry` and encoded with its `TextEncoder`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::error::{Error, Result};
use crate::metric::{MetricDescriptor, Observation, ValueKind};
use crate::orchestrator::ScrapeBatch;

/// `Content-Type` of [`encode_text`] output
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

struct Family<'a> {
    descriptor: &'a Arc<MetricDescriptor>,
    samples: Vec<&'a Observation>,
}

/// Group observations by family.
///
/// An observation whose descriptor disagrees with the first one seen for the
/// same name, or that repeats a label set already seen, is dropped with a
/// warning.
fn group(observations: &[Observation]) -> BTreeMap<&str, Family<'_>> {
    let mut families: BTreeMap<&str, Family<'_>> = BTreeMap::new();
    let mut seen: HashSet<(&str, &[String])> = HashSet::new();

    for obs in observations {
        let family = families.entry(obs.fq_name()).or_insert_with(|| Family {
            descriptor: obs.descriptor(),
            samples: Vec::new(),
        });

        let first = family.descriptor;
        let desc = obs.descriptor();
        if first.label_names() != desc.label_names() || first.value_kind() != desc.value_kind() {
            warn!(
                metric = obs.fq_name(),
                expected = %first,
                got = %desc,
                "Inconsistent descriptor for metric family, dropping observation"
            );
            continue;
        }
        if !seen.insert((obs.fq_name(), obs.label_values())) {
            warn!(
                metric = obs.fq_name(),
                labels = ?obs.label_values(),
                "Duplicate label set in metric family, dropping observation"
            );
            continue;
        }
        family.samples.push(obs);
    }
    families
}

fn opts(descriptor: &MetricDescriptor) -> Opts {
    let help = if descriptor.help().is_empty() {
        format!("Metric {}", descriptor.fq_name())
    } else {
        descriptor.help().to_string()
    };
    Opts::new(descriptor.fq_name(), help)
}

fn load_family(registry: &Registry, family: &Family<'_>) -> Result<()> {
    let descriptor = family.descriptor;
    let labels: Vec<&str> = descriptor.label_names().iter().map(String::as_str).collect();

    match descriptor.value_kind() {
        ValueKind::Counter => {
            let vec = CounterVec::new(opts(descriptor), &labels)?;
            registry.register(Box::new(vec.clone()))?;
            for obs in &family.samples {
                let values: Vec<&str> = obs.label_values().iter().map(String::as_str).collect();
                let value = obs.value();
                if value.is_nan() || value < 0.0 {
                    warn!(metric = obs.fq_name(), value, "Counter value is negative or NaN, dropping");
                    continue;
                }
                vec.get_metric_with_label_values(&values)?.inc_by(value);
            }
        }
        // Untyped families are exposed as gauges.
        ValueKind::Gauge | ValueKind::Untyped => {
            let vec = GaugeVec::new(opts(descriptor), &labels)?;
            registry.register(Box::new(vec.clone()))?;
            for obs in &family.samples {
                let values: Vec<&str> = obs.label_values().iter().map(String::as_str).collect();
                vec.get_metric_with_label_values(&values)?.set(obs.value());
            }
        }
    }
    Ok(())
}

/// Encode observations as Prometheus text.
///
/// Families are sorted by name. Samples within a family keep the order in
/// which they were first observed.
pub fn encode_observations(observations: &[Observation]) -> Result<String> {
    let registry = Registry::new();
    for family in group(observations).values() {
        if family.samples.is_empty() {
            continue;
        }
        load_family(&registry, family)?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Exposition(e.to_string()))
}

/// Encode a scrape batch as Prometheus text.
pub fn encode_text(batch: &ScrapeBatch) -> Result<String> {
    encode_observations(&batch.observations)
}
