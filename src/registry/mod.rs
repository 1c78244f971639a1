//! Collector Registry
//!
//! Table of every collector the binary knows about: name, resting enabled
//! state, and the factory that builds an instance.
//!
//! The registry is filled at startup, before configuration is parsed, because
//! the configuration surface (one toggle per collector) is derived from it.
//! After that it is only read: the orchestrator takes `&CollectorRegistry`
//! while building instances and never mutates it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::collector::{Collector, CollectorContext};
use crate::error::{Error, Result};

/// Type-erased collector factory.
pub type CollectorFactory =
    Arc<dyn Fn(&CollectorContext) -> Result<Box<dyn Collector>> + Send + Sync>;

/// One registered collector.
#[derive(Clone)]
pub struct CollectorEntry {
    name: String,
    default_enabled: bool,
    factory: CollectorFactory,
}

impl CollectorEntry {
    /// Collector name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the collector runs when no override is given
    pub fn default_enabled(&self) -> bool {
        self.default_enabled
    }

    /// Build a fresh instance.
    pub fn build(&self, ctx: &CollectorContext) -> Result<Box<dyn Collector>> {
        (self.factory)(ctx)
    }
}

impl fmt::Debug for CollectorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorEntry")
            .field("name", &self.name)
            .field("default_enabled", &self.default_enabled)
            .finish_non_exhaustive()
    }
}

/// Name-keyed table of collector entries.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    entries: BTreeMap<String, CollectorEntry>,
}

impl CollectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector, replacing any entry with the same name.
    ///
    /// Replacement is the supported way to override a built-in collector.
    /// The only failure is a malformed name.
    pub fn register<C, F>(&mut self, name: &str, default_enabled: bool, factory: F) -> Result<()>
    where
        C: Collector,
        F: Fn(&CollectorContext) -> Result<C> + Send + Sync + 'static,
    {
        validate_collector_name(name)?;

        let factory: CollectorFactory =
            Arc::new(move |ctx| factory(ctx).map(|c| Box::new(c) as Box<dyn Collector>));
        let entry = CollectorEntry {
            name: name.to_string(),
            default_enabled,
            factory,
        };

        if let Some(previous) = self.entries.insert(name.to_string(), entry) {
            debug!(
                collector = %name,
                previous_default = previous.default_enabled,
                default_enabled,
                "Replaced registered collector"
            );
        } else {
            debug!(collector = %name, default_enabled, "Registered collector");
        }
        Ok(())
    }

    /// All entries, ordered by name.
    pub fn entries(&self) -> impl Iterator<Item = &CollectorEntry> {
        self.entries.values()
    }

    /// Registered names, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Look up one entry.
    pub fn get(&self, name: &str) -> Option<&CollectorEntry> {
        self.entries.get(name)
    }

    /// True if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.names())
            .finish()
    }
}

/// Collector names become flag names (`--collector.<name>`) and label values,
/// so they are restricted to `[a-z][a-z0-9_]*`.
pub fn validate_collector_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidCollectorName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("name is empty")),
        Some(c) if !c.is_ascii_lowercase() => {
            return Err(invalid("must start with a lowercase letter"))
        }
        Some(_) => {}
    }
    if chars.any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')) {
        return Err(invalid("may only contain [a-z0-9_]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{CollectorError, Sink};
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    struct Noop;

    impl Collector for Noop {
        fn update(&mut self, _sink: &mut Sink) -> std::result::Result<(), CollectorError> {
            Ok(())
        }
    }

    fn noop(_: &CollectorContext) -> Result<Noop> {
        Ok(Noop)
    }

    #[test]
    fn test_register_and_enumerate() {
        let mut registry = CollectorRegistry::new();
        registry.register("xfs", true, noop).unwrap();
        registry.register("loadavg", true, noop).unwrap();
        registry.register("ntp", false, noop).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["loadavg", "ntp", "xfs"]);
        assert!(!registry.get("ntp").unwrap().default_enabled());
        assert!(registry.contains("xfs"));
        assert!(!registry.contains("zfs"));
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = CollectorRegistry::new();
        registry.register("cpu", true, noop).unwrap();
        registry
            .register("cpu", false, |_: &CollectorContext| -> Result<Noop> {
                Err(Error::Internal("replacement".into()))
            })
            .unwrap();

        assert_eq!(registry.len(), 1);
        let entry = registry.get("cpu").unwrap();
        assert!(!entry.default_enabled());
        let err = entry.build(&CollectorContext::default()).err().unwrap();
        assert_matches!(err, Error::Internal(msg) if msg == "replacement");
    }

    #[test]
    fn test_malformed_names_rejected() {
        let mut registry = CollectorRegistry::new();
        for bad in ["", "Cpu", "9p", "disk-stats", "cpu freq", "disable.defaults"] {
            assert_matches!(
                registry.register(bad, true, noop),
                Err(Error::InvalidCollectorName { .. }),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_valid_names_accepted() {
        for good in ["cpu", "nvidia_gpu", "ipvs", "cpu_vulnerabilities", "zfs2"] {
            assert!(validate_collector_name(good).is_ok(), "{good:?}");
        }
    }

    #[test]
    fn test_build_uses_context() {
        let mut registry = CollectorRegistry::new();
        registry
            .register("nsaware", true, |ctx: &CollectorContext| {
                if ctx.namespace == "node" {
                    Ok(Noop)
                } else {
                    Err(Error::Config("wrong namespace".into()))
                }
            })
            .unwrap();

        let entry = registry.get("nsaware").unwrap();
        assert!(entry.build(&CollectorContext::default()).is_ok());

        let ctx = CollectorContext {
            namespace: "custom".into(),
            ..Default::default()
        };
        assert!(entry.build(&ctx).is_err());
    }

    #[test]
    fn test_debug_lists_names() {
        let mut registry = CollectorRegistry::new();
        registry.register("time", true, noop).unwrap();
        assert!(format!("{:?}", registry).contains("time"));
    }

    proptest! {
        #[test]
        fn prop_each_name_once_last_wins(
            ops in proptest::collection::vec((0usize..6, any::<bool>()), 0..40)
        ) {
            const NAMES: [&str; 6] = ["cpu", "xfs", "ntp", "loadavg", "zfs", "time"];
            let mut registry = CollectorRegistry::new();
            let mut expected = std::collections::HashMap::new();

            for (idx, enabled) in &ops {
                registry.register(NAMES[*idx], *enabled, noop).unwrap();
                expected.insert(NAMES[*idx], *enabled);
            }

            let names = registry.names();
            let mut deduped = names.clone();
            deduped.dedup();
            prop_assert_eq!(names.len(), deduped.len());
            prop_assert_eq!(names.len(), expected.len());

            for entry in registry.entries() {
                prop_assert_eq!(Some(&entry.default_enabled()), expected.get(entry.name()));
            }
        }
    }
}
