//! Built-in Collectors

mod loadavg;
mod time;

pub use loadavg::LoadavgCollector;
pub use time::TimeCollector;

use crate::error::Result;
use crate::registry::CollectorRegistry;

/// Register every built-in collector.
pub fn register_builtin(registry: &mut CollectorRegistry) -> Result<()> {
    registry.register("loadavg", true, LoadavgCollector::new)?;
    registry.register("time", true, TimeCollector::new)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin() {
        let mut registry = CollectorRegistry::new();
        register_builtin(&mut registry).unwrap();
        assert_eq!(registry.names(), vec!["loadavg", "time"]);
        assert!(registry.entries().all(|e| e.default_enabled()));
    }
}
