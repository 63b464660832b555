//! Vector dataset model: features, attribute values, coordinate systems.
//! Container formats (GeoPackage, FileGDB, ...) are external collaborators;
//! readers hand the pipeline fully materialised `VectorDataset` values.

use std::collections::HashMap;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(pub u32);

impl Crs {
    pub fn epsg(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// One attribute cell. Source tables mix text codes and numeric fields, and
/// either may be absent for a given feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Null,
}

impl AttrValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Render this value as a label fragment. Whole numbers drop the
    /// fractional part so `7.0` and `7` produce the same label.
    pub fn label_fragment(&self) -> Option<String> {
        match self {
            AttrValue::Text(s) => Some(s.clone()),
            AttrValue::Number(v) if v.fract() == 0.0 => Some(format!("{}", *v as i64)),
            AttrValue::Number(v) => Some(format!("{v}")),
            AttrValue::Null => None,
        }
    }
}

/// One vector record: a (multi)polygon plus its attribute row.
/// Immutable once read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub attributes: HashMap<String, AttrValue>,
}

impl Feature {
    pub fn new(geometry: MultiPolygon<f64>, attributes: HashMap<String, AttrValue>) -> Self {
        Self { geometry, attributes }
    }

    pub fn attr(&self, column: &str) -> &AttrValue {
        self.attributes.get(column).unwrap_or(&AttrValue::Null)
    }
}

/// A named layer read from some vector container, possibly without a
/// declared coordinate system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDataset {
    pub name: String,
    pub crs: Option<Crs>,
    pub features: Vec<Feature>,
}

impl VectorDataset {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, features: Vec<Feature>) -> Self {
        Self { name: name.into(), crs, features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
