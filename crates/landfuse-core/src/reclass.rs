//! Reclassification: the fused raster's transient run codes are remapped
//! onto the final, externally meaningful code space.
//!
//! Every code present in the fused raster resolves to a final code. Codes
//! whose label has no canonical class in the external lookup map to an
//! explicit "unclassified" sentinel, never to background; background (0)
//! maps to itself. The output pixel type shrinks to the smallest unsigned
//! width that can hold the final code range.

use std::collections::{BTreeSet, HashMap};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::codes::CodeTable;
use crate::raster::{Raster, NODATA};

/// Name reported for fused codes with no canonical class.
pub const UNCLASSIFIED: &str = "UNCLASSIFIED";

/// Mapping from fused codes to final codes and canonical class names.
/// The other primary deliverable besides the final raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemapTable {
    /// Fused code -> final code; total over every code observed in the
    /// fused raster.
    pub forward: HashMap<u32, u32>,
    /// Canonical class names; `classes[i]` owns final code `i + 1`.
    pub classes: Vec<String>,
    /// Final code for fused codes with no canonical class. Always
    /// `classes.len() + 1`, distinct from background 0.
    pub unclassified_code: u32,
    /// Fused codes that fell through to the sentinel, for operators to
    /// extend the external lookup.
    pub unmatched: Vec<u32>,
}

impl RemapTable {
    pub fn class_for(&self, final_code: u32) -> Option<&str> {
        if final_code == self.unclassified_code {
            return Some(UNCLASSIFIED);
        }
        self.classes.get(final_code as usize - 1).map(String::as_str)
    }

    pub fn final_code_for(&self, class: &str) -> Option<u32> {
        self.classes.iter().position(|c| c == class).map(|i| i as u32 + 1)
    }
}

/// Final deliverable raster, stored at the smallest unsigned pixel width
/// that fits the canonical classes plus the sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinalRaster {
    U8(Raster<u8>),
    U16(Raster<u16>),
    U32(Raster<u32>),
}

impl FinalRaster {
    pub fn width(&self) -> usize {
        match self {
            FinalRaster::U8(r) => r.width,
            FinalRaster::U16(r) => r.width,
            FinalRaster::U32(r) => r.width,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            FinalRaster::U8(r) => r.height,
            FinalRaster::U16(r) => r.height,
            FinalRaster::U32(r) => r.height,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        match self {
            FinalRaster::U8(r) => r.get(row, col) as u32,
            FinalRaster::U16(r) => r.get(row, col) as u32,
            FinalRaster::U32(r) => r.get(row, col),
        }
    }

    /// Pixel values widened to u32, row-major.
    pub fn values(&self) -> Vec<u32> {
        match self {
            FinalRaster::U8(r) => r.data.iter().map(|&v| v as u32).collect(),
            FinalRaster::U16(r) => r.data.iter().map(|&v| v as u32).collect(),
            FinalRaster::U32(r) => r.data.clone(),
        }
    }

    pub fn bits_per_pixel(&self) -> u8 {
        match self {
            FinalRaster::U8(_) => 8,
            FinalRaster::U16(_) => 16,
            FinalRaster::U32(_) => 32,
        }
    }
}

/// Build the remap table and apply it to the fused raster.
///
/// `lookup` is the external label -> canonical class correspondence
/// ("globalcode" -> "SWATCODE" in the source tables). `class_priority`,
/// when given, fixes the final-code order for the classes it names;
/// observed classes it omits follow in first-appearance order.
pub fn reclassify(
    fused: &Raster<u32>,
    table: &CodeTable,
    lookup: &HashMap<String, String>,
    class_priority: Option<&[String]>,
) -> (FinalRaster, RemapTable) {
    // Codes actually present, ascending; ascending order doubles as
    // first-appearance order because codes are assigned monotonically.
    let observed: BTreeSet<u32> =
        fused.data.iter().copied().filter(|&c| c != NODATA).collect();

    // Canonical class per observed code, None when the lookup has no entry.
    let mut code_class: Vec<(u32, Option<&String>)> = Vec::with_capacity(observed.len());
    for &code in &observed {
        let class = table.label_for(code).and_then(|label| lookup.get(label));
        code_class.push((code, class));
    }

    // Final-code enumeration: priority list first, then remaining observed
    // classes by first appearance.
    let mut classes: Vec<String> = Vec::new();
    if let Some(priority) = class_priority {
        let observed_classes: BTreeSet<&String> =
            code_class.iter().filter_map(|(_, c)| *c).collect();
        for class in priority {
            if observed_classes.contains(class) && !classes.contains(class) {
                classes.push(class.clone());
            }
        }
    }
    for (_, class) in &code_class {
        if let Some(class) = class {
            if !classes.contains(class) {
                classes.push((*class).clone());
            }
        }
    }

    let unclassified_code = classes.len() as u32 + 1;
    let mut forward: HashMap<u32, u32> = HashMap::with_capacity(code_class.len());
    let mut unmatched: Vec<u32> = Vec::new();
    for (code, class) in &code_class {
        let final_code = match class {
            Some(class) => classes.iter().position(|c| &c == class).map(|i| i as u32 + 1),
            None => None,
        };
        match final_code {
            Some(fc) => {
                forward.insert(*code, fc);
            }
            None => {
                forward.insert(*code, unclassified_code);
                unmatched.push(*code);
            }
        }
    }

    if !unmatched.is_empty() {
        warn!(
            "{} fused code(s) have no canonical class and map to the unclassified sentinel: {:?}",
            unmatched.len(),
            unmatched
        );
    }

    let remap = RemapTable { forward, classes, unclassified_code, unmatched };

    // Apply; background is preserved as-is.
    let remap_pixel = |v: u32| -> u32 {
        if v == NODATA {
            NODATA
        } else {
            // Total by construction: every observed code is in `forward`.
            remap.forward[&v]
        }
    };

    let final_raster = if remap.unclassified_code <= u8::MAX as u32 {
        let mut out: Raster<u8> = Raster {
            data: Vec::with_capacity(fused.data.len()),
            width: fused.width,
            height: fused.height,
            grid: fused.grid,
        };
        out.data.extend(fused.data.iter().map(|&v| remap_pixel(v) as u8));
        FinalRaster::U8(out)
    } else if remap.unclassified_code <= u16::MAX as u32 {
        let mut out: Raster<u16> = Raster {
            data: Vec::with_capacity(fused.data.len()),
            width: fused.width,
            height: fused.height,
            grid: fused.grid,
        };
        out.data.extend(fused.data.iter().map(|&v| remap_pixel(v) as u16));
        FinalRaster::U16(out)
    } else {
        let mut out = fused.clone();
        for v in &mut out.data {
            *v = remap_pixel(*v);
        }
        FinalRaster::U32(out)
    };

    (final_raster, remap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifiedDataset;
    use crate::raster::GridSpec;
    use geo::{polygon, MultiPolygon};

    fn square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]])
    }

    fn table_with(labels: &[&str]) -> CodeTable {
        let mut table = CodeTable::new();
        table
            .assign_dataset(&ClassifiedDataset {
                name: "t".into(),
                labeled: labels.iter().map(|l| (l.to_string(), square())).collect(),
                dropped: 0,
            })
            .unwrap();
        table
    }

    fn raster_2x2(data: [u32; 4]) -> Raster<u32> {
        let grid = GridSpec::new((0.0, 0.0, 10.0, 10.0), 5.0);
        let mut r = Raster::filled(grid, NODATA).unwrap();
        r.data = data.to_vec();
        r
    }

    fn lookup(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn worked_example_left_forest_right_crop() {
        // Fused raster from the compositor example: code 3 on the left
        // column, code 7 on the right.
        let mut table = CodeTable::new();
        for _ in 0..6 {
            // Burn through codes 1-6 so the raster codes 3 and 7 exist.
            table
                .assign_dataset(&ClassifiedDataset {
                    name: "x".into(),
                    labeled: vec![(format!("L{}", table.next_code()), square())],
                    dropped: 0,
                })
                .unwrap();
        }
        table
            .assign_dataset(&ClassifiedDataset {
                name: "x".into(),
                labeled: vec![("L7".into(), square())],
                dropped: 0,
            })
            .unwrap();

        let fused = raster_2x2([3, 7, 3, 7]);
        let lk = lookup(&[("L3", "Forest"), ("L7", "Crop")]);
        let (final_raster, remap) = reclassify(&fused, &table, &lk, None);

        assert_eq!(remap.classes, vec!["Forest", "Crop"]);
        assert_eq!(remap.final_code_for("Forest"), Some(1));
        assert_eq!(remap.final_code_for("Crop"), Some(2));
        assert_eq!(final_raster.values(), vec![1, 2, 1, 2]);
        assert!(remap.unmatched.is_empty());
    }

    #[test]
    fn unmatched_codes_hit_the_sentinel_not_background() {
        let table = table_with(&["C_KVI", "C_ZZZ"]);
        let fused = raster_2x2([1, 2, 0, 1]);
        let lk = lookup(&[("C_KVI", "WWHT")]);
        let (final_raster, remap) = reclassify(&fused, &table, &lk, None);

        assert_eq!(remap.classes, vec!["WWHT"]);
        assert_eq!(remap.unclassified_code, 2);
        assert_eq!(remap.unmatched, vec![2]);
        // Code 2 -> sentinel, background stays background.
        assert_eq!(final_raster.values(), vec![1, 2, 0, 1]);
        assert_eq!(remap.class_for(2), Some(UNCLASSIFIED));
    }

    #[test]
    fn reclassification_is_total_over_observed_codes() {
        let table = table_with(&["A_", "W_Pa", "G_hd1"]);
        let fused = raster_2x2([1, 2, 3, 0]);
        // Empty lookup: everything unmatched, nothing unmapped.
        let (final_raster, remap) = reclassify(&fused, &table, &HashMap::new(), None);
        for &code in fused.data.iter().filter(|&&c| c != 0) {
            assert!(remap.forward.contains_key(&code));
        }
        assert_eq!(final_raster.values(), vec![1, 1, 1, 0]);
    }

    #[test]
    fn priority_list_fixes_final_code_order() {
        let table = table_with(&["A_", "C_KVI"]);
        let fused = raster_2x2([1, 2, 1, 2]);
        let lk = lookup(&[("A_", "AGRL"), ("C_KVI", "WWHT")]);
        let priority = vec!["WWHT".to_string(), "AGRL".to_string()];
        let (_, remap) = reclassify(&fused, &table, &lk, Some(&priority));
        assert_eq!(remap.classes, vec!["WWHT", "AGRL"]);
        assert_eq!(remap.forward[&1], 2);
        assert_eq!(remap.forward[&2], 1);
    }

    #[test]
    fn pixel_width_shrinks_to_fit() {
        let table = table_with(&["C_KVI"]);
        let fused = raster_2x2([1, 0, 1, 0]);
        let lk = lookup(&[("C_KVI", "WWHT")]);
        let (final_raster, _) = reclassify(&fused, &table, &lk, None);
        assert_eq!(final_raster.bits_per_pixel(), 8);
        assert!(matches!(final_raster, FinalRaster::U8(_)));
    }

    #[test]
    fn area_is_conserved_through_reclassification() {
        let table = table_with(&["C_KVI", "C_ZZZ"]);
        let fused = raster_2x2([1, 2, 2, 0]);
        let lk = lookup(&[("C_KVI", "WWHT")]);
        let (final_raster, remap) = reclassify(&fused, &table, &lk, None);

        let values = final_raster.values();
        let nodata = values.iter().filter(|&&v| v == 0).count();
        let classified: usize = (1..=remap.unclassified_code)
            .map(|fc| values.iter().filter(|&&v| v == fc).count())
            .sum();
        assert_eq!(classified + nodata, values.len());
    }
}
