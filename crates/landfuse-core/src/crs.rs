//! CRS normalisation: every dataset must be in the canonical planar system
//! before any geometric operation. Transformation math itself is an external
//! collaborator behind the [`Reproject`] trait; this module owns only the
//! normalisation contract.

use geo::MultiPolygon;
use log::{debug, warn};

use crate::dataset::{Crs, VectorDataset};
use crate::error::FuseError;

/// LKS-94 / Lithuanian TM, the canonical planar CRS for the run.
pub const CANONICAL_CRS: Crs = Crs(3346);

/// What the normaliser did with a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsOutcome {
    /// Dataset declared no CRS; the canonical one was assigned as-is.
    /// Recoverable but noteworthy; counted on the run result.
    AssignedMissing,
    /// Dataset was already canonical.
    AlreadyCanonical,
    /// Dataset was mathematically reprojected from another CRS.
    Reprojected { from: Crs },
}

/// Geometry reprojection provider. Real implementations wrap a projection
/// library; the pipeline only requires the contract.
pub trait Reproject {
    fn reproject(
        &self,
        geometry: &MultiPolygon<f64>,
        from: Crs,
        to: Crs,
    ) -> Result<MultiPolygon<f64>, FuseError>;
}

/// Provider for runs whose inputs are known to be canonical already.
/// Any actual transform request is an error rather than a silent pass-through.
pub struct NoReproject;

impl Reproject for NoReproject {
    fn reproject(
        &self,
        _geometry: &MultiPolygon<f64>,
        from: Crs,
        to: Crs,
    ) -> Result<MultiPolygon<f64>, FuseError> {
        Err(FuseError::Reprojection { from: from.epsg(), to: to.epsg() })
    }
}

/// Return `dataset` expressed in `target`. The input is never mutated.
///
/// - No declared CRS: assign `target` without transforming, warn.
/// - Already `target`: pass through.
/// - Anything else: reproject every geometry via `provider`.
pub fn normalize_crs(
    dataset: &VectorDataset,
    target: Crs,
    provider: &dyn Reproject,
) -> Result<(VectorDataset, CrsOutcome), FuseError> {
    match dataset.crs {
        None => {
            warn!("dataset '{}' has no CRS; assigning {} as declared", dataset.name, target);
            let mut out = dataset.clone();
            out.crs = Some(target);
            Ok((out, CrsOutcome::AssignedMissing))
        }
        Some(crs) if crs == target => {
            debug!("dataset '{}' already in {}", dataset.name, target);
            Ok((dataset.clone(), CrsOutcome::AlreadyCanonical))
        }
        Some(from) => {
            debug!("reprojecting dataset '{}' from {} to {}", dataset.name, from, target);
            let mut features = Vec::with_capacity(dataset.features.len());
            for feature in &dataset.features {
                let mut f = feature.clone();
                f.geometry = provider.reproject(&feature.geometry, from, target)?;
                features.push(f);
            }
            let out = VectorDataset::new(dataset.name.clone(), Some(target), features);
            Ok((out, CrsOutcome::Reprojected { from }))
        }
    }
}
