//! Metric Descriptors
//!
//! Immutable definitions of metric families plus the naming helpers used to
//! build them.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};

/// Kind of value a metric family carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Monotonically increasing value
    Counter,
    /// Value that can go up and down
    Gauge,
    /// Value of unknown semantics
    Untyped,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Counter => write!(f, "counter"),
            ValueKind::Gauge => write!(f, "gauge"),
            ValueKind::Untyped => write!(f, "untyped"),
        }
    }
}

/// Definition of one metric family.
///
/// Descriptors are built once, usually in a collector factory, and shared by
/// every [`Observation`](super::Observation) produced against them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    fq_name: String,
    help: String,
    label_names: Vec<String>,
    value_kind: ValueKind,
}

impl MetricDescriptor {
    /// Create a validated descriptor.
    ///
    /// Fails if the metric name or any label name is not valid in the
    /// exposition format, or if a label name is repeated.
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
        value_kind: ValueKind,
    ) -> Result<Arc<Self>> {
        let fq_name = fq_name.into();
        validate_metric_name(&fq_name)?;

        let mut names: Vec<String> = Vec::with_capacity(label_names.len());
        for label in label_names {
            validate_label_name(label)?;
            if names.iter().any(|n| n == label) {
                return Err(Error::InvalidMetricName {
                    name: fq_name,
                    reason: format!("duplicate label name {:?}", label),
                });
            }
            names.push((*label).to_string());
        }

        Ok(Arc::new(Self {
            fq_name,
            help: help.into(),
            label_names: names,
            value_kind,
        }))
    }

    /// Fully-qualified metric name
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    /// Help text
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Ordered label names
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Value kind
    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }
}

impl fmt::Display for MetricDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{}]",
            self.fq_name,
            self.value_kind,
            self.label_names.join(",")
        )
    }
}

// =============================================================================
// Naming Helpers
// =============================================================================

/// Join namespace, subsystem and name with underscores, skipping empty parts.
///
/// Returns an empty string when `name` is empty.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace every run of characters that are invalid in a metric name with a
/// single underscore, absorbing underscores that touch the run.
///
/// Colons are replaced as well; they are reserved for recording rules.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    // Underscores before this offset came from a previous replacement.
    let mut protected = 0;

    while let Some(c) = chars.next() {
        if is_word_char(c) {
            out.push(c);
            continue;
        }
        while out.len() > protected && out.ends_with('_') {
            out.pop();
        }
        while chars.peek().is_some_and(|n| !is_word_char(*n)) {
            chars.next();
        }
        while chars.peek() == Some(&'_') {
            chars.next();
        }
        out.push('_');
        protected = out.len();
    }
    out
}

fn validate_metric_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidMetricName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("empty name")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_' || c == ':') => {
            return Err(invalid("must start with a letter, '_' or ':'"))
        }
        Some(_) => {}
    }
    if chars.any(|c| !(is_word_char(c) || c == ':')) {
        return Err(invalid("may only contain [a-zA-Z0-9_:]"));
    }
    Ok(())
}

fn validate_label_name(label: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidMetricName {
        name: label.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = label.chars();
    match chars.next() {
        None => return Err(invalid("empty label name")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(invalid("label must start with a letter or '_'"))
        }
        Some(_) => {}
    }
    if chars.any(|c| !is_word_char(c)) {
        return Err(invalid("label may only contain [a-zA-Z0-9_]"));
    }
    if label.starts_with("__") {
        return Err(invalid("label names starting with '__' are reserved"));
    }
    Ok(())
}
