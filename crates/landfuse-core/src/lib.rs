//! Land-cover fusion: reconciles independently sourced vector land-cover
//! datasets into one categorical raster for a hydrological model, with a
//! traceable code-to-class lookup table.
//!
//! Stages run strictly downstream: CRS normalisation, attribute
//! classification, code assignment, rasterisation, priority compositing,
//! reclassification. See [`pipeline::run`] for the orchestrated whole.

pub mod classify;
pub mod codes;
pub mod composite;
pub mod crs;
pub mod dataset;
pub mod error;
pub mod legend;
pub mod pipeline;
pub mod raster;
pub mod rasterize;
pub mod reclass;
pub mod stats;

pub use classify::{classify_dataset, classify_feature, imperv_band, ClassRule};
pub use codes::{CodeTable, CodedDataset};
pub use composite::composite;
pub use crs::{normalize_crs, NoReproject, Reproject, CANONICAL_CRS};
pub use dataset::{AttrValue, Crs, Feature, VectorDataset};
pub use error::FuseError;
pub use pipeline::{run, DatasetSpec, RunConfig, RunResult};
pub use raster::{GridSpec, Raster, NODATA};
pub use rasterize::rasterize_layer;
pub use reclass::{reclassify, FinalRaster, RemapTable};
