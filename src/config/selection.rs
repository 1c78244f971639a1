//! Collector selection.
//!
//! Decides, once per process run, which registered collectors are active.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::{CollectorEntry, CollectorRegistry};

/// User choices that turn the registry into an active collector set.
///
/// Resolution rules:
/// - An explicit override always wins.
/// - Otherwise `disable_defaults` turns every collector off.
/// - Otherwise the entry's `default_enabled` applies.
/// - `enable_collectors` then restricts the result to the listed names, each of
///   which must be enabled; `exclude_collectors` removes names instead. The two
///   lists cannot be combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorSelection {
    /// Turn every non-overridden collector off
    pub disable_defaults: bool,
    /// Explicit per-collector enable/disable toggles
    pub overrides: BTreeMap<String, bool>,
    /// Only build these collectors
    pub enable_collectors: Vec<String>,
    /// Build every enabled collector except these
    pub exclude_collectors: Vec<String>,
}

impl CollectorSelection {
    /// Selection that keeps every registry default
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style override.
    pub fn with_override(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.overrides.insert(name.into(), enabled);
        self
    }

    /// Builder-style `disable_defaults`.
    pub fn with_defaults_disabled(mut self) -> Self {
        self.disable_defaults = true;
        self
    }

    /// Resting state of one entry after overrides and `disable_defaults`.
    pub fn is_enabled(&self, entry: &CollectorEntry) -> bool {
        match self.overrides.get(entry.name()) {
            Some(forced) => *forced,
            None if self.disable_defaults => false,
            None => entry.default_enabled(),
        }
    }

    /// Layer `other` on top of `self`. Overrides in `other` win per name,
    /// `disable_defaults` is sticky, and non-empty lists in `other` replace
    /// the lists in `self`.
    pub fn merge(mut self, other: CollectorSelection) -> Self {
        self.disable_defaults |= other.disable_defaults;
        self.overrides.extend(other.overrides);
        if !other.enable_collectors.is_empty() {
            self.enable_collectors = other.enable_collectors;
        }
        if !other.exclude_collectors.is_empty() {
            self.exclude_collectors = other.exclude_collectors;
        }
        self
    }

    /// Compute the active collector names, ordered.
    pub fn resolve(&self, registry: &CollectorRegistry) -> Result<Vec<String>> {
        for name in self.overrides.keys() {
            if !registry.contains(name) {
                return Err(Error::UnknownCollector(name.clone()));
            }
        }
        if !self.enable_collectors.is_empty() && !self.exclude_collectors.is_empty() {
            return Err(Error::ConflictingSelection(
                "enable_collectors and exclude_collectors cannot be used together".to_string(),
            ));
        }

        let enabled: BTreeSet<&str> = registry
            .entries()
            .filter(|entry| self.is_enabled(entry))
            .map(|entry| entry.name())
            .collect();

        let active: BTreeSet<&str> = if !self.enable_collectors.is_empty() {
            let mut filtered = BTreeSet::new();
            for name in &self.enable_collectors {
                if !registry.contains(name) {
                    return Err(Error::UnknownCollector(name.clone()));
                }
                if !enabled.contains(name.as_str()) {
                    return Err(Error::DisabledCollector(name.clone()));
                }
                filtered.insert(name.as_str());
            }
            filtered
        } else {
            for name in &self.exclude_collectors {
                if !registry.contains(name) {
                    return Err(Error::UnknownCollector(name.clone()));
                }
            }
            enabled
                .into_iter()
                .filter(|name| !self.exclude_collectors.iter().any(|e| e == name))
                .collect()
        };

        debug!(active = ?active, "Resolved collector selection");
        Ok(active.into_iter().map(str::to_string).collect())
    }
}
