//! Wall-clock time collector.

use chrono::Utc;

use crate::collector::{Collector, CollectorContext, CollectorError, Sink};
use crate::error::Result;
use crate::metric::{build_fq_name, TypedDesc};

/// Reports the system time in seconds since the Unix epoch.
#[derive(Debug)]
pub struct TimeCollector {
    now: TypedDesc,
}

impl TimeCollector {
    pub fn new(ctx: &CollectorContext) -> Result<Self> {
        Ok(Self {
            now: TypedDesc::gauge(
                build_fq_name(&ctx.namespace, "", "time_seconds"),
                "System time in seconds since epoch (1970).",
                &[],
            )?,
        })
    }
}

impl Collector for TimeCollector {
    fn update(&mut self, sink: &mut Sink) -> std::result::Result<(), CollectorError> {
        let now = Utc::now().timestamp_micros() as f64 / 1e6;
        sink.emit(self.now.observe(now, &[] as &[&str]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_current_time() {
        let mut collector = TimeCollector::new(&CollectorContext::default()).unwrap();
        let mut sink = Sink::new();
        let before = Utc::now().timestamp() as f64;
        collector.update(&mut sink).unwrap();

        let obs = &sink.observations()[0];
        assert_eq!(obs.fq_name(), "node_time_seconds");
        assert!(obs.value() >= before);
        assert!(obs.value() < before + 60.0);
    }
}
