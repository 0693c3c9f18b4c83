//! Node shape assertions over the captured fleet
//!
//! Every node is checked, and all offending nodes are reported together.

use crate::fleet::{FleetSnapshot, NodeRecord, Taint};
use crate::Error;

fn collect_failures<F>(stage: &str, fleet: &FleetSnapshot, check: F) -> Result<(), Error>
where
    F: Fn(&NodeRecord) -> Option<String>,
{
    let failures: Vec<String> = fleet.nodes().iter().filter_map(check).collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Aggregate {
            stage: stage.to_string(),
            failures,
        })
    }
}

/// Every node carries a label with key `label`
pub fn verify_worker_label(fleet: &FleetSnapshot, label: &str) -> Result<(), Error> {
    collect_failures("worker label check", fleet, |node| {
        if node.has_label(label) {
            return None;
        }
        Some(format!(
            "expected node label {label} was not present on {}",
            node.name
        ))
    })
}

/// Every node carries a taint equal to `taint` in key, value and effect
pub fn verify_taint(fleet: &FleetSnapshot, taint: &Taint) -> Result<(), Error> {
    collect_failures("node taint check", fleet, |node| {
        if node.has_taint(taint) {
            return None;
        }
        Some(format!(
            "expected taint {taint} to be present on node {}",
            node.name
        ))
    })
}
