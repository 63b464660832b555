//! Code assignment: distinct category labels become dense integer codes,
//! unique across the whole run. Code 0 is reserved for background/nodata.
//!
//! The counter is explicit state owned by [`CodeTable`] and threaded through
//! each dataset call; no hidden globals. Datasets are not merged by label:
//! two datasets with a textually identical label still get distinct codes,
//! because layers are composited by priority, not by label identity.

use std::collections::HashMap;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::classify::ClassifiedDataset;
use crate::error::FuseError;

/// One row of the run-scoped code table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub code: u32,
    pub label: String,
    /// Dataset this label was observed in.
    pub dataset: String,
}

/// Run-scoped mapping from code to category label, built incrementally as
/// datasets are processed. Codes start at 1, strictly increase, and are
/// never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeTable {
    entries: Vec<CodeEntry>,
    next: u32,
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A dataset reduced to (code, geometry) pairs, ready for rasterisation.
#[derive(Debug, Clone)]
pub struct CodedDataset {
    pub name: String,
    pub coded: Vec<(u32, MultiPolygon<f64>)>,
}

impl CodeTable {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next: 1 }
    }

    pub fn entries(&self) -> &[CodeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next code the table will hand out.
    pub fn next_code(&self) -> u32 {
        self.next
    }

    pub fn label_for(&self, code: u32) -> Option<&str> {
        // Codes are dense and sorted; direct index with a fallback scan
        // would be equivalent, but binary search states the invariant.
        self.entries
            .binary_search_by_key(&code, |e| e.code)
            .ok()
            .map(|i| self.entries[i].label.as_str())
    }

    /// Assign codes to every distinct label of `dataset` in first-appearance
    /// order and reduce it to (code, geometry) pairs.
    ///
    /// Returns `CodeCollision` if the counter would reuse a live code; that
    /// is an invariant violation, not an input error.
    pub fn assign_dataset(&mut self, dataset: &ClassifiedDataset) -> Result<CodedDataset, FuseError> {
        let mut seen: HashMap<&str, u32> = HashMap::new();
        let mut coded = Vec::with_capacity(dataset.labeled.len());

        for (label, geometry) in &dataset.labeled {
            let code = match seen.get(label.as_str()) {
                Some(&code) => code,
                None => {
                    let code = self.next;
                    if let Some(last) = self.entries.last() {
                        if code <= last.code {
                            return Err(FuseError::CodeCollision { code });
                        }
                    }
                    self.entries.push(CodeEntry {
                        code,
                        label: label.clone(),
                        dataset: dataset.name.clone(),
                    });
                    self.next += 1;
                    seen.insert(label.as_str(), code);
                    code
                }
            };
            coded.push((code, geometry.clone()));
        }

        Ok(CodedDataset { name: dataset.name.clone(), coded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]])
    }

    fn classified(name: &str, labels: &[&str]) -> ClassifiedDataset {
        ClassifiedDataset {
            name: name.to_string(),
            labeled: labels.iter().map(|l| (l.to_string(), square())).collect(),
            dropped: 0,
        }
    }

    #[test]
    fn codes_start_at_one_and_are_dense() {
        let mut table = CodeTable::new();
        let out = table
            .assign_dataset(&classified("crops", &["C_KVI", "C_MIE", "C_KVI"]))
            .unwrap();

        let codes: Vec<u32> = table.entries().iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![1, 2]);
        // Repeated label reuses its code within the dataset.
        assert_eq!(out.coded.iter().map(|(c, _)| *c).collect::<Vec<_>>(), vec![1, 2, 1]);
        assert_eq!(table.next_code(), 3);
    }

    #[test]
    fn codes_continue_across_datasets_without_reuse() {
        let mut table = CodeTable::new();
        table.assign_dataset(&classified("crops", &["C_KVI"])).unwrap();
        let out = table.assign_dataset(&classified("forest", &["F_1_Oak", "C_KVI"])).unwrap();

        // Identical label in a later dataset gets a fresh code.
        assert_eq!(out.coded[1].0, 3);
        let codes: Vec<u32> = table.entries().iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![1, 2, 3]);
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn label_lookup_by_code() {
        let mut table = CodeTable::new();
        table.assign_dataset(&classified("crops", &["C_KVI", "C_MIE"])).unwrap();
        assert_eq!(table.label_for(2), Some("C_MIE"));
        assert_eq!(table.label_for(99), None);
    }
}
