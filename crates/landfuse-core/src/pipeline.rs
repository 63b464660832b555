//! Pipeline orchestrator: runs the fusion stages in order for a whole run.
//!
//! Per dataset: CRS normalisation, attribute classification, code
//! assignment, rasterisation. Then the layer rasters are composited in
//! declaration order and the fused raster is reclassified against the
//! external lookup. Single-threaded and batch; each stage fully consumes
//! its input before the next begins.

use std::collections::HashMap;
use std::time::Instant;

use log::info;
use serde::{Deserialize, Serialize};

use crate::classify::{classify_dataset, ClassRule};
use crate::codes::CodeTable;
use crate::composite::composite;
use crate::crs::{normalize_crs, CrsOutcome, Reproject, CANONICAL_CRS};
use crate::dataset::VectorDataset;
use crate::error::FuseError;
use crate::legend::{build_legend, LegendEntry};
use crate::raster::{GridSpec, Raster};
use crate::rasterize::rasterize_layer;
use crate::reclass::{reclassify, FinalRaster, RemapTable};

/// One dataset's contribution to the run: the layer itself plus the rule
/// that classifies it. Declaration order is the compositing priority:
/// earlier entries override later ones.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub dataset: VectorDataset,
    pub rule: ClassRule,
}

/// Run-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub grid: GridSpec,
    /// External label -> canonical class correspondence
    /// ("globalcode" -> "SWATCODE").
    pub lookup: HashMap<String, String>,
    /// Optional final-code ordering for canonical classes.
    pub class_priority: Option<Vec<String>>,
}

/// Recoverable data-quality conditions observed during a run, surfaced on
/// the result rather than logged-and-lost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarnings {
    /// Datasets that declared no CRS and had the canonical one assigned.
    pub missing_crs: usize,
    /// Features dropped because their rule yielded no label.
    pub dropped_features: usize,
    /// Fused codes that mapped to the unclassified sentinel.
    pub unmatched_codes: usize,
}

/// Everything a run produces. The final raster and the remap table are the
/// deliverables; the rest is provenance.
#[derive(Debug)]
pub struct RunResult {
    pub fused: Raster<u32>,
    pub final_raster: FinalRaster,
    pub remap: RemapTable,
    pub code_table: CodeTable,
    pub legend: Vec<LegendEntry>,
    pub layer_names: Vec<String>,
    pub warnings: RunWarnings,
    pub elapsed_ms: u64,
}

/// Execute the full fusion pipeline over `datasets` in declaration order.
pub fn run(
    datasets: &[DatasetSpec],
    config: &RunConfig,
    reprojector: &dyn Reproject,
) -> Result<RunResult, FuseError> {
    if datasets.is_empty() {
        return Err(FuseError::EmptyRun);
    }
    let start = Instant::now();

    // Grid validity is a run precondition, checked before any work.
    config.grid.shape()?;

    let mut code_table = CodeTable::new();
    let mut warnings = RunWarnings::default();
    let mut layers: Vec<Raster<u32>> = Vec::with_capacity(datasets.len());
    let mut layer_names: Vec<String> = Vec::with_capacity(datasets.len());

    for spec in datasets {
        let (normalized, outcome) = normalize_crs(&spec.dataset, CANONICAL_CRS, reprojector)?;
        if outcome == CrsOutcome::AssignedMissing {
            warnings.missing_crs += 1;
        }

        let classified = classify_dataset(&spec.rule, &normalized);
        warnings.dropped_features += classified.dropped;

        let coded = code_table.assign_dataset(&classified)?;
        let layer = rasterize_layer(&coded, config.grid)?;

        info!(
            "layer '{}': {} labels, {} px covered",
            spec.dataset.name,
            code_table.len(),
            layer.coverage()
        );
        layer_names.push(spec.dataset.name.clone());
        layers.push(layer);
    }

    let fused = composite(&layers)?;
    let legend = build_legend(&code_table, &config.lookup);

    let (final_raster, remap) =
        reclassify(&fused, &code_table, &config.lookup, config.class_priority.as_deref());
    warnings.unmatched_codes = remap.unmatched.len();

    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        "run complete: {} layers, {} codes, {} classes, {} ms",
        layer_names.len(),
        code_table.len(),
        remap.classes.len(),
        elapsed_ms
    );

    Ok(RunResult {
        fused,
        final_raster,
        remap,
        code_table,
        legend,
        layer_names,
        warnings,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::NoReproject;
    use crate::dataset::{AttrValue, Crs, Feature};
    use geo::{polygon, MultiPolygon};

    fn rect(minx: f64, miny: f64, maxx: f64, maxy: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: minx, y: miny),
            (x: maxx, y: miny),
            (x: maxx, y: maxy),
            (x: minx, y: maxy),
        ]])
    }

    fn feature(geometry: MultiPolygon<f64>, attrs: &[(&str, AttrValue)]) -> Feature {
        Feature::new(
            geometry,
            attrs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        )
    }

    fn config(lookup: &[(&str, &str)]) -> RunConfig {
        RunConfig {
            grid: GridSpec::new((0.0, 0.0, 10.0, 10.0), 5.0),
            lookup: lookup.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            class_priority: None,
        }
    }

    #[test]
    fn end_to_end_two_layer_run() {
        // Crops cover the left column, abandoned land covers everything;
        // crops are declared first so they win.
        let crops = VectorDataset::new(
            "crops",
            Some(Crs(3346)),
            vec![feature(
                rect(0.0, 0.0, 5.0, 10.0),
                &[("KODAS", AttrValue::Text("KVI".into()))],
            )],
        );
        let abandoned = VectorDataset::new(
            "abandoned",
            Some(Crs(3346)),
            vec![feature(rect(0.0, 0.0, 10.0, 10.0), &[])],
        );

        let datasets = vec![
            DatasetSpec { dataset: crops, rule: ClassRule::crops("KODAS") },
            DatasetSpec { dataset: abandoned, rule: ClassRule::Abandoned },
        ];
        let cfg = config(&[("C_KVI", "WWHT"), ("A_", "AGRL")]);
        let result = run(&datasets, &cfg, &NoReproject).unwrap();

        // Code 1 = C_KVI, code 2 = A_.
        assert_eq!(result.fused.data, vec![1, 2, 1, 2]);
        assert_eq!(result.remap.classes, vec!["WWHT", "AGRL"]);
        assert_eq!(result.final_raster.values(), vec![1, 2, 1, 2]);
        assert_eq!(result.warnings, RunWarnings::default());
        assert_eq!(result.layer_names, vec!["crops", "abandoned"]);
        assert_eq!(result.legend.len(), 2);
    }

    #[test]
    fn warnings_are_counted_not_fatal() {
        // No CRS declared, one feature unclassifiable, one label missing
        // from the lookup: three recoverable conditions, zero errors.
        let crops = VectorDataset::new(
            "crops",
            None,
            vec![
                feature(rect(0.0, 0.0, 10.0, 10.0), &[("KODAS", AttrValue::Text("KVI".into()))]),
                feature(rect(0.0, 0.0, 10.0, 10.0), &[("KODAS", AttrValue::Text("NEP".into()))]),
            ],
        );
        let datasets = vec![DatasetSpec { dataset: crops, rule: ClassRule::crops("KODAS") }];
        let result = run(&datasets, &config(&[]), &NoReproject).unwrap();

        assert_eq!(result.warnings.missing_crs, 1);
        assert_eq!(result.warnings.dropped_features, 1);
        assert_eq!(result.warnings.unmatched_codes, 1);
        // The unmatched code still resolved to the sentinel.
        assert_eq!(result.final_raster.values(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn empty_run_is_rejected() {
        let cfg = config(&[]);
        assert!(matches!(run(&[], &cfg, &NoReproject), Err(FuseError::EmptyRun)));
    }

    #[test]
    fn invalid_grid_aborts_before_processing() {
        let crops = VectorDataset::new(
            "crops",
            Some(Crs(3346)),
            vec![feature(rect(0.0, 0.0, 10.0, 10.0), &[("KODAS", AttrValue::Text("KVI".into()))])],
        );
        let datasets = vec![DatasetSpec { dataset: crops, rule: ClassRule::crops("KODAS") }];
        let cfg = RunConfig {
            grid: GridSpec::new((0.0, 0.0, 2.0, 10.0), 5.0),
            lookup: HashMap::new(),
            class_priority: None,
        };
        assert!(matches!(run(&datasets, &cfg, &NoReproject), Err(FuseError::InvalidGrid { .. })));
    }
}
