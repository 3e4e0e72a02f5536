use charuco_calib_core::{CameraIntrinsics, Distortion, PinholeCamera, Pose};
use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Board-to-image correspondences of one image.
///
/// Object points live on the board plane (`z = 0`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewObservation {
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

impl ViewObservation {
    pub fn new(object_points: Vec<Point3<f64>>, image_points: Vec<Point2<f64>>) -> Self {
        Self {
            object_points,
            image_points,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// Solver settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Keep the principal point at the image center.
    pub fix_principal_point: bool,
    /// Estimate a single focal length (`fx == fy`).
    pub fix_aspect_ratio: bool,
    /// Keep `p1 = p2 = 0`.
    pub zero_tangent_dist: bool,
    /// Keep `k3 = 0`.
    pub fix_k3: bool,
    /// Optimizer patience: at most `max_iterations * (parameters + 1)`
    /// residual evaluations.
    pub max_iterations: usize,
    /// Relative cost change, relative step and gradient orthogonality that
    /// count as converged.
    pub epsilon: f64,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            fix_principal_point: false,
            fix_aspect_ratio: false,
            zero_tangent_dist: false,
            fix_k3: false,
            max_iterations: 100,
            epsilon: 1e-12,
        }
    }
}

/// Output of a calibration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    /// Board-to-camera pose per view, in input order.
    pub poses: Vec<Pose>,
    /// RMS re-projection error per view (pixels).
    pub per_view_rms: Vec<f64>,
    /// Overall RMS re-projection error `sqrt(Σ‖r‖² / N)` (pixels).
    pub rms: f64,
    /// Residual evaluations spent by the optimizer.
    pub iterations: usize,
    /// The optimizer met a convergence criterion before running out of
    /// patience.
    pub converged: bool,
}

impl CalibrationResult {
    /// The 3x3 camera matrix `K`.
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        self.intrinsics.matrix()
    }

    pub fn camera(&self) -> PinholeCamera {
        PinholeCamera::new(self.intrinsics, self.distortion)
    }
}
