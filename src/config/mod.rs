//! Exporter Configuration
//!
//! - [`CollectorSelection`]: which registered collectors run
//! - [`PathConfig`]: where host filesystems are mounted
//! - [`FileConfig`]: optional YAML file
//! - [`augment_collector_flags`] / [`selection_from_matches`]: one CLI toggle
//!   per registered collector
//!
//! Precedence, lowest first: registry defaults, YAML file, command line.

mod file;
mod flags;
mod paths;
mod selection;

pub use file::{timeout_from_secs, FileConfig};
pub use flags::{augment_collector_flags, selection_from_matches, COLLECTOR_FLAGS_HEADING};
pub use paths::{PathConfig, DEFAULT_PROCFS, DEFAULT_ROOTFS, DEFAULT_SYSFS};
pub use selection::CollectorSelection;
