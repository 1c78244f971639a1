//! Load average collector.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::collector::{Collector, CollectorContext, CollectorError, Sink};
use crate::error::Result;
use crate::metric::{build_fq_name, TypedDesc};

/// Reads `<procfs>/loadavg` and reports the 1, 5 and 15 minute averages.
#[derive(Debug)]
pub struct LoadavgCollector {
    path: PathBuf,
    load: [TypedDesc; 3],
}

impl LoadavgCollector {
    /// Build the descriptors under the context namespace.
    pub fn new(ctx: &CollectorContext) -> Result<Self> {
        let desc = |name: &str, help: &str| {
            TypedDesc::gauge(build_fq_name(&ctx.namespace, "", name), help, &[])
        };
        Ok(Self {
            path: ctx.paths.proc_file_path("loadavg"),
            load: [
                desc("load1", "1m load average.")?,
                desc("load5", "5m load average.")?,
                desc("load15", "15m load average.")?,
            ],
        })
    }
}

impl Collector for LoadavgCollector {
    fn update(&mut self, sink: &mut Sink) -> std::result::Result<(), CollectorError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CollectorError::NoData),
            Err(e) => return Err(CollectorError::io(self.path.display().to_string(), e)),
        };

        let loads = parse_loadavg(&data)?;
        for (desc, value) in self.load.iter().zip(loads) {
            sink.emit(desc.observe(value, &[] as &[&str]));
        }
        Ok(())
    }
}

/// Parse the first three fields of a loadavg line.
fn parse_loadavg(data: &str) -> std::result::Result<[f64; 3], CollectorError> {
    let fields: Vec<&str> = data.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(CollectorError::parse(
            "loadavg",
            format!("expected at least 3 fields, got {}", fields.len()),
        ));
    }

    let mut loads = [0.0; 3];
    for (slot, field) in loads.iter_mut().zip(&fields) {
        *slot = field.parse().map_err(|e| {
            CollectorError::parse("loadavg", format!("could not parse load {:?}: {}", field, e))
        })?;
    }
    Ok(loads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathConfig;
    use assert_matches::assert_matches;

    fn context(procfs: &std::path::Path) -> CollectorContext {
        CollectorContext {
            paths: PathConfig::new(procfs, "/sys", "/"),
            ..Default::default()
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nodestat-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_loadavg() {
        let loads = parse_loadavg("0.21 0.37 0.39 1/719 19737\n").unwrap();
        assert_eq!(loads, [0.21, 0.37, 0.39]);
    }

    #[test]
    fn test_parse_loadavg_rejects_garbage() {
        assert_matches!(parse_loadavg("0.21 x 0.39"), Err(CollectorError::Parse { .. }));
        assert_matches!(parse_loadavg(""), Err(CollectorError::Parse { .. }));
    }

    #[test]
    fn test_update_reads_procfs() {
        let dir = scratch_dir("loadavg-ok");
        fs::write(dir.join("loadavg"), "1.5 2.5 3.5 2/100 42\n").unwrap();

        let mut collector = LoadavgCollector::new(&context(&dir)).unwrap();
        let mut sink = Sink::new();
        collector.update(&mut sink).unwrap();

        let got: Vec<(&str, f64)> = sink
            .observations()
            .iter()
            .map(|o| (o.fq_name(), o.value()))
            .collect();
        assert_eq!(
            got,
            vec![("node_load1", 1.5), ("node_load5", 2.5), ("node_load15", 3.5)]
        );
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file_is_no_data() {
        let dir = scratch_dir("loadavg-missing");
        let mut collector = LoadavgCollector::new(&context(&dir)).unwrap();
        let mut sink = Sink::new();

        assert_matches!(collector.update(&mut sink), Err(CollectorError::NoData));
        assert!(sink.is_empty());
        fs::remove_dir_all(dir).ok();
    }
}
