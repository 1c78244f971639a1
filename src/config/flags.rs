//! Command-line toggles derived from the registry.
//!
//! Every registered collector gets `--collector.<name>` and
//! `--no-collector.<name>`. The flags are added to an existing `clap::Command`
//! at runtime, which is why the registry must be complete before arguments are
//! parsed.

use clap::{Arg, ArgAction, ArgMatches, Command};

use super::selection::CollectorSelection;
use crate::registry::CollectorRegistry;

/// Heading used for the generated flags in `--help`.
pub const COLLECTOR_FLAGS_HEADING: &str = "Collectors";

fn enable_id(name: &str) -> String {
    format!("collector.{}", name)
}

fn disable_id(name: &str) -> String {
    format!("no-collector.{}", name)
}

/// Add one enable and one disable flag per registered collector.
pub fn augment_collector_flags(mut cmd: Command, registry: &CollectorRegistry) -> Command {
    for entry in registry.entries() {
        let name = entry.name();
        let state = if entry.default_enabled() {
            "enabled"
        } else {
            "disabled"
        };

        cmd = cmd
            .arg(
                Arg::new(enable_id(name))
                    .long(enable_id(name))
                    .action(ArgAction::SetTrue)
                    .overrides_with(disable_id(name))
                    .help_heading(COLLECTOR_FLAGS_HEADING)
                    .help(format!("Enable the {} collector (default: {}).", name, state)),
            )
            .arg(
                Arg::new(disable_id(name))
                    .long(disable_id(name))
                    .action(ArgAction::SetTrue)
                    .overrides_with(enable_id(name))
                    .help_heading(COLLECTOR_FLAGS_HEADING)
                    .hide(true),
            );
    }
    cmd
}

/// Read the generated flags back into per-collector overrides.
///
/// Only flags given on the command line become overrides; absent flags leave
/// the collector at its resting state. When both forms are given the last one
/// wins.
pub fn selection_from_matches(
    matches: &ArgMatches,
    registry: &CollectorRegistry,
) -> CollectorSelection {
    let mut selection = CollectorSelection::new();
    for entry in registry.entries() {
        let name = entry.name();
        if matches.get_flag(&enable_id(name)) {
            selection.overrides.insert(name.to_string(), true);
        } else if matches.get_flag(&disable_id(name)) {
            selection.overrides.insert(name.to_string(), false);
        }
    }
    selection
}
