use thiserror::Error;

/// Errors raised by the fusion pipeline. Recoverable data-quality conditions
/// (missing CRS, unclassifiable features, unmatched codes) are not errors;
/// they are logged and counted on the output artifacts instead.
#[derive(Debug, Error)]
pub enum FuseError {
    /// The grid spec resolves to a raster with a non-positive dimension.
    /// Fatal: one misaligned layer corrupts compositing for the whole run.
    #[error("invalid grid: {width}x{height} pixels from bbox ({minx}, {miny}, {maxx}, {maxy}) at resolution {resolution}")]
    InvalidGrid {
        width: i64,
        height: i64,
        minx: f64,
        miny: f64,
        maxx: f64,
        maxy: f64,
        resolution: f64,
    },

    /// A code already present in the code table was about to be reassigned.
    /// Counter discipline violated; this is an implementation bug, not bad input.
    #[error("code {code} already assigned in this run (counter discipline violated)")]
    CodeCollision { code: u32 },

    /// Two rasters that must share a grid do not.
    #[error("raster shape mismatch: expected {expected_width}x{expected_height}, got {got_width}x{got_height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        got_width: usize,
        got_height: usize,
    },

    /// A dataset declares a CRS we cannot transform to the canonical one.
    #[error("no reprojection available from EPSG:{from} to EPSG:{to}")]
    Reprojection { from: u32, to: u32 },

    /// The run was started with no datasets to composite.
    #[error("fusion run contains no datasets")]
    EmptyRun,
}
