//! Pixel statistics for the deliverable raster: per-code counts and
//! per-canonical-class area summaries. Downstream consumer of the final
//! raster and remap table only; nothing here feeds back into the pipeline.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::legend::LegendEntry;
use crate::raster::{Raster, NODATA};
use crate::reclass::{FinalRaster, RemapTable, UNCLASSIFIED};

const M2_PER_KM2: f64 = 1_000_000.0;

/// Pixel count and area for one raster value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeCount {
    pub code: u32,
    pub pixels: u64,
    pub area_km2: f64,
}

/// Unique-value counts for a fused (u32) raster, ascending by code.
/// Background is included as code 0 so totals reconcile.
pub fn code_counts(raster: &Raster<u32>) -> Vec<CodeCount> {
    let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
    for &v in &raster.data {
        *counts.entry(v).or_insert(0) += 1;
    }
    let pixel_km2 = raster.grid.pixel_area() / M2_PER_KM2;
    counts
        .into_iter()
        .map(|(code, pixels)| CodeCount { code, pixels, area_km2: pixels as f64 * pixel_km2 })
        .collect()
}

/// One legend row joined with its pixel count in the fused raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendCount {
    pub code: u32,
    pub label: String,
    pub canonical: Option<String>,
    pub pixels: u64,
    pub area_km2: f64,
}

/// Left-join the legend with the fused raster's pixel counts: every legend
/// code gets a row, zero-pixel codes included. Background is not a legend
/// row and never appears.
pub fn legend_counts(raster: &Raster<u32>, legend: &[LegendEntry]) -> Vec<LegendCount> {
    let counts: HashMap<u32, u64> =
        code_counts(raster).into_iter().map(|c| (c.code, c.pixels)).collect();
    let pixel_km2 = raster.grid.pixel_area() / M2_PER_KM2;
    legend
        .iter()
        .map(|entry| {
            let pixels = counts.get(&entry.code).copied().unwrap_or(0);
            LegendCount {
                code: entry.code,
                label: entry.label.clone(),
                canonical: entry.canonical.clone(),
                pixels,
                area_km2: pixels as f64 * pixel_km2,
            }
        })
        .collect()
}

/// Area summary for one canonical class of the final raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassArea {
    pub class_name: String,
    pub final_code: u32,
    pub pixels: u64,
    pub area_km2: f64,
    /// Share of the classified (non-background) area, percent.
    pub area_pct: f64,
}

/// Group final-raster pixels by canonical class. Background pixels are
/// excluded from the summary and from the percentage base.
pub fn class_areas(raster: &FinalRaster, remap: &RemapTable, grid_resolution: f64) -> Vec<ClassArea> {
    let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
    for v in raster.values() {
        if v != NODATA {
            *counts.entry(v).or_insert(0) += 1;
        }
    }

    let pixel_km2 = grid_resolution * grid_resolution / M2_PER_KM2;
    let total_km2: f64 = counts.values().map(|&p| p as f64 * pixel_km2).sum();

    counts
        .into_iter()
        .map(|(final_code, pixels)| {
            let area_km2 = pixels as f64 * pixel_km2;
            ClassArea {
                class_name: remap.class_for(final_code).unwrap_or(UNCLASSIFIED).to_string(),
                final_code,
                pixels,
                area_km2,
                area_pct: if total_km2 > 0.0 { area_km2 / total_km2 * 100.0 } else { 0.0 },
            }
        })
        .collect()
}
