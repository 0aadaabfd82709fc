//! [`FitResult`]: the output of a linear fit over cluster hit positions
//!. Kept as a plain data type in `model` so [`super::cluster::Cluster`]
//! can cache one without depending on [`crate::fitting`].

use super::vec3::Vec3;

/// Why a fit could not be performed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum FitFailure {
    /// Fewer than two occupied layers were available.
    #[error("too few points to fit")]
    TooFewPoints,
    /// The hit positions were degenerate (e.g. all on top of each
    /// other), so no stable direction could be extracted.
    #[error("degenerate hit layout")]
    Degenerate,
}

/// Result of a linear fit over (a subset of) a cluster's hits.
#[derive(Clone, Copy, Debug)]
pub struct FitResult {
    /// Fit direction (unit vector).
    pub direction: Vec3,
    /// A point the fit line passes through.
    pub intercept: Vec3,
    /// Mean perpendicular distance of hits to the fit line (mm).
    pub rms: f64,
    /// Chi-squared per degree of freedom.
    pub chi2_per_dof: f64,
    /// `direction . unit_vector_from_origin(intercept)`.
    pub radial_direction_cosine: f64,
}

impl FitResult {
    /// A fit result representing total failure, distinguishing the
    /// reason via the `Result` that wraps it rather than a sentinel.
    pub fn success(
        direction: Vec3,
        intercept: Vec3,
        rms: f64,
        chi2_per_dof: f64,
    ) -> Result<Self, FitFailure> {
        if !direction.norm().is_finite() || direction.norm() <= f64::EPSILON {
            return Err(FitFailure::Degenerate);
        }
        let radial = intercept.normalized();
        Ok(Self {
            direction,
            intercept,
            rms,
            chi2_per_dof,
            radial_direction_cosine: direction.dot(radial),
        })
    }
}
