//! Grid geometry and the single-band raster container.
//! Coordinate math uses f64; pixel values are unsigned integers with 0 as
//! the background/nodata sentinel.

use serde::{Deserialize, Serialize};

use crate::error::FuseError;

/// Background / nodata pixel value.
pub const NODATA: u32 = 0;

/// Full national extent (minx, miny, maxx, maxy) in the canonical CRS,
/// used when a run declares no clip bbox. Auditable configuration like the
/// classifier code sets, not derived from the inputs.
pub const FULL_EXTENT: (f64, f64, f64, f64) = (306_500.0, 5_973_500.0, 680_100.0, 6_257_800.0);

/// Bounding box + resolution defining a raster's pixel geometry.
/// All layers in a run share one GridSpec so rasters stay pixel-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
    /// Pixel edge length in CRS units.
    pub resolution: f64,
}

impl GridSpec {
    pub fn new(bbox: (f64, f64, f64, f64), resolution: f64) -> Self {
        Self { minx: bbox.0, miny: bbox.1, maxx: bbox.2, maxy: bbox.3, resolution }
    }

    /// Grid from an optional clip bbox; `None` selects [`FULL_EXTENT`].
    pub fn from_bbox(bbox: Option<(f64, f64, f64, f64)>, resolution: f64) -> Self {
        Self::new(bbox.unwrap_or(FULL_EXTENT), resolution)
    }

    /// Raster (width, height) in pixels. Fatal if either dimension is
    /// non-positive: a single misaligned layer would corrupt compositing.
    pub fn shape(&self) -> Result<(usize, usize), FuseError> {
        let width = ((self.maxx - self.minx) / self.resolution).floor() as i64;
        let height = ((self.maxy - self.miny) / self.resolution).floor() as i64;
        if width <= 0 || height <= 0 || self.resolution <= 0.0 {
            return Err(FuseError::InvalidGrid {
                width,
                height,
                minx: self.minx,
                miny: self.miny,
                maxx: self.maxx,
                maxy: self.maxy,
                resolution: self.resolution,
            });
        }
        Ok((width as usize, height as usize))
    }

    /// Centre of pixel (row, col). Row 0 is the northernmost row, matching
    /// the usual north-up affine transform.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.minx + (col as f64 + 0.5) * self.resolution;
        let y = self.maxy - (row as f64 + 0.5) * self.resolution;
        (x, y)
    }

    /// Area of one pixel in CRS units squared.
    pub fn pixel_area(&self) -> f64 {
        self.resolution * self.resolution
    }
}

/// A single-band raster tied to a GridSpec, row-major, row 0 north.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
    pub grid: GridSpec,
}

impl<T: Copy> Raster<T> {
    /// Create a raster filled with `fill`, validating the grid spec.
    pub fn filled(grid: GridSpec, fill: T) -> Result<Self, FuseError> {
        let (width, height) = grid.shape()?;
        Ok(Self { data: vec![fill; width * height], width, height, grid })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    /// True when `other` shares this raster's pixel grid.
    pub fn same_shape<U>(&self, other: &Raster<U>) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl Raster<u32> {
    /// Count of non-background pixels.
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|&&v| v != NODATA).count()
    }
}
