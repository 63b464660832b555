//! Priority compositing: layer rasters are folded into one fused raster.
//! Earlier layers win; a later layer only fills pixels every earlier layer
//! left as background. The layer order is a semantic contract supplied by
//! the caller (dataset declaration order), not an implementation detail.

use log::debug;

use crate::error::FuseError;
use crate::raster::{Raster, NODATA};

/// Merge `next` into `base`: background pixels of `base` take the value of
/// `next`, everything else is kept. Both rasters must share one grid.
pub fn overlay(base: &Raster<u32>, next: &Raster<u32>) -> Result<Raster<u32>, FuseError> {
    if !base.same_shape(next) {
        return Err(FuseError::ShapeMismatch {
            expected_width: base.width,
            expected_height: base.height,
            got_width: next.width,
            got_height: next.height,
        });
    }
    let mut fused = base.clone();
    for (dst, &src) in fused.data.iter_mut().zip(&next.data) {
        if *dst == NODATA {
            *dst = src;
        }
    }
    Ok(fused)
}

/// Composite an ordered sequence of layer rasters. The first layer is the
/// base; each subsequent layer fills remaining background only.
pub fn composite(layers: &[Raster<u32>]) -> Result<Raster<u32>, FuseError> {
    let (first, rest) = layers.split_first().ok_or(FuseError::EmptyRun)?;
    let mut fused = first.clone();
    for layer in rest {
        fused = overlay(&fused, layer)?;
        debug!("layer merged into the common raster; coverage now {} px", fused.coverage());
    }
    Ok(fused)
}
