//! Legend artifacts: the run's lookup tables persisted for downstream
//! tooling. Two tables are authoritative: (transient code, label, canonical
//! class) before reclassification, and (canonical class, final code) after.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::codes::CodeTable;
use crate::reclass::{RemapTable, UNCLASSIFIED};

/// One legend row: a transient run code, its category label, and the
/// canonical class it resolves to, when the external lookup has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub code: u32,
    pub label: String,
    pub dataset: String,
    pub canonical: Option<String>,
}

/// Join the run's code table with the external label -> class lookup.
pub fn build_legend(
    table: &CodeTable,
    lookup: &std::collections::HashMap<String, String>,
) -> Vec<LegendEntry> {
    table
        .entries()
        .iter()
        .map(|e| LegendEntry {
            code: e.code,
            label: e.label.clone(),
            dataset: e.dataset.clone(),
            canonical: lookup.get(&e.label).cloned(),
        })
        .collect()
}

/// Write the legend as CSV: ID, LU, dataset, SWATCODE.
pub fn write_legend_csv<W: Write>(writer: W, legend: &[LegendEntry]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["ID", "LU", "dataset", "SWATCODE"])?;
    for entry in legend {
        w.write_record([
            entry.code.to_string(),
            entry.label.clone(),
            entry.dataset.clone(),
            entry.canonical.clone().unwrap_or_default(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Write the post-reclassification legend as CSV: SWATCODE, final code.
/// The sentinel row is last so operators see unmatched coverage explicitly.
pub fn write_remap_csv<W: Write>(writer: W, remap: &RemapTable) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["SWATCODE", "ID"])?;
    for (i, class) in remap.classes.iter().enumerate() {
        w.write_record([class.clone(), (i as u32 + 1).to_string()])?;
    }
    w.write_record([UNCLASSIFIED.to_string(), remap.unclassified_code.to_string()])?;
    w.flush()?;
    Ok(())
}
