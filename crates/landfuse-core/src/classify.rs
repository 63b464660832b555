//! Attribute classifier: reduces each dataset's native attribute schema to a
//! single category label per feature, or drops the feature.
//!
//! Rules are a closed set of variants carrying their configuration (source
//! column, allowed/excluded code sets) as plain data, dispatched by one
//! `match`. New datasets register a rule value; the control flow never grows.

use std::collections::BTreeSet;

use geo::MultiPolygon;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::dataset::{Feature, VectorDataset};

// ── Rule configuration defaults ──────────────────────────────────────────────
// Domain-given code sets. The meanings live in the source data dictionaries;
// here they are auditable configuration, not logic.

/// Wetland site-type codes that classify as wetland forest.
pub const WETLAND_SITE_TYPES: &[&str] = &["Pa", "Pan", "Pb"];
/// Crop declaration codes excluded from the land-use raster.
pub const EXCLUDED_CROP_CODES: &[&str] = &["NEP", "TPN"];
/// Drainage-network codes excluded from the land-use raster.
pub const EXCLUDED_DRAINAGE_CODES: &[&str] = &["pu0", "pu3"];
/// Forest stand groups excluded from the land-use raster.
pub const EXCLUDED_FOREST_GROUPS: &[i64] = &[0, 2, 4, 5];

fn str_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// One dataset's classification rule. A rule is a total function of a
/// feature's attributes: it yields exactly one label or drops the feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassRule {
    /// Constant label, no column lookup. Always succeeds.
    Abandoned,
    /// Succeeds only when the source value is an allowed wetland subtype.
    Wetland { column: String, allowed: BTreeSet<String> },
    /// Succeeds unless the source value is an excluded crop code.
    Crops { column: String, excluded: BTreeSet<String> },
    /// Succeeds unless the source value is an excluded drainage code.
    Drainage { column: String, excluded: BTreeSet<String> },
    /// Succeeds unless the rounded numeric discriminant is excluded;
    /// the label carries the rounded discriminant and the source value.
    Forest {
        column: String,
        discriminant: String,
        excluded: BTreeSet<i64>,
    },
    /// Bands a numeric impervious-cover percentage (1-100) into the five
    /// urban density classes; label = `U_<band>`. Out-of-range or zero
    /// cover drops the feature.
    ImpervPercent { column: String },
    /// Always succeeds; label is `<tag>_<value>`. Covers pre-banded
    /// impervious data ("U"), meadows ("M") and any future single-column
    /// dataset.
    Tagged { tag: String, column: String },
}

impl ClassRule {
    pub fn wetland(column: impl Into<String>) -> Self {
        ClassRule::Wetland { column: column.into(), allowed: str_set(WETLAND_SITE_TYPES) }
    }

    pub fn crops(column: impl Into<String>) -> Self {
        ClassRule::Crops { column: column.into(), excluded: str_set(EXCLUDED_CROP_CODES) }
    }

    pub fn drainage(column: impl Into<String>) -> Self {
        ClassRule::Drainage { column: column.into(), excluded: str_set(EXCLUDED_DRAINAGE_CODES) }
    }

    pub fn forest(column: impl Into<String>, discriminant: impl Into<String>) -> Self {
        ClassRule::Forest {
            column: column.into(),
            discriminant: discriminant.into(),
            excluded: EXCLUDED_FOREST_GROUPS.iter().copied().collect(),
        }
    }

    pub fn imperv(column: impl Into<String>) -> Self {
        ClassRule::ImpervPercent { column: column.into() }
    }

    pub fn tagged(tag: impl Into<String>, column: impl Into<String>) -> Self {
        ClassRule::Tagged { tag: tag.into(), column: column.into() }
    }

    /// The single-letter tag this rule prefixes labels with.
    pub fn tag(&self) -> &str {
        match self {
            ClassRule::Abandoned => "A",
            ClassRule::Wetland { .. } => "W",
            ClassRule::Crops { .. } => "C",
            ClassRule::Drainage { .. } => "G",
            ClassRule::Forest { .. } => "F",
            ClassRule::ImpervPercent { .. } => "U",
            ClassRule::Tagged { tag, .. } => tag,
        }
    }
}

/// Classify one feature. Pure function of the rule and the attributes;
/// `None` means the feature is dropped from the working dataset.
pub fn classify_feature(rule: &ClassRule, feature: &Feature) -> Option<String> {
    match rule {
        ClassRule::Abandoned => Some("A_".to_string()),

        ClassRule::Wetland { column, allowed } => {
            let value = feature.attr(column).label_fragment()?;
            allowed.contains(&value).then(|| format!("W_{value}"))
        }

        ClassRule::Crops { column, excluded } => {
            let value = feature.attr(column).label_fragment()?;
            (!excluded.contains(&value)).then(|| format!("C_{value}"))
        }

        ClassRule::Drainage { column, excluded } => {
            let value = feature.attr(column).label_fragment()?;
            (!excluded.contains(&value)).then(|| format!("G_{value}"))
        }

        ClassRule::Forest { column, discriminant, excluded } => {
            let group = feature.attr(discriminant).as_number()?.round() as i64;
            if excluded.contains(&group) {
                return None;
            }
            let value = feature.attr(column).label_fragment()?;
            Some(format!("F_{group}_{value}"))
        }

        ClassRule::ImpervPercent { column } => {
            let percent = feature.attr(column).as_number()?.round();
            if !(0.0..=100.0).contains(&percent) {
                return None;
            }
            imperv_band(percent as u8).map(|band| format!("U_{band}"))
        }

        ClassRule::Tagged { tag, column } => {
            let value = feature.attr(column).label_fragment()?;
            Some(format!("{tag}_{value}"))
        }
    }
}

/// A dataset reduced to (label, geometry) pairs, ready for code assignment.
#[derive(Debug, Clone)]
pub struct ClassifiedDataset {
    pub name: String,
    pub labeled: Vec<(String, MultiPolygon<f64>)>,
    /// Features removed because the rule yielded no label.
    pub dropped: usize,
}

/// Apply `rule` to every feature, keeping input order. Unclassifiable
/// features are removed entirely; the input dataset is untouched.
pub fn classify_dataset(rule: &ClassRule, dataset: &VectorDataset) -> ClassifiedDataset {
    let mut labeled = Vec::with_capacity(dataset.features.len());
    let mut dropped = 0usize;
    for feature in &dataset.features {
        match classify_feature(rule, feature) {
            Some(label) => labeled.push((label, feature.geometry.clone())),
            None => dropped += 1,
        }
    }
    debug!(
        "dataset '{}': {} features labeled, {} dropped by rule {}",
        dataset.name,
        labeled.len(),
        dropped,
        rule.tag()
    );
    ClassifiedDataset { name: dataset.name.clone(), labeled, dropped }
}

// ── Impervious cover banding ─────────────────────────────────────────────────

/// Map an impervious-cover percentage (1-100) onto the five urban density
/// classes used by the hydrological model. 0 and out-of-range values carry
/// no class.
pub fn imperv_band(percent: u8) -> Option<&'static str> {
    match percent {
        1..=18 => Some("URLD"),
        19..=26 => Some("URML"),
        27..=44 => Some("URMD"),
        45..=82 => Some("URHD"),
        83..=100 => Some("UIDU"),
        _ => None,
    }
}
