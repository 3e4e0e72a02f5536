//! Joint Levenberg-Marquardt refinement of intrinsics, distortion and poses.
//!
//! Parameter layout: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` followed by six
//! values per view (Rodrigues rotation, translation). Each point only touches
//! the nine shared values and its own view's six, so its 2x15 Jacobian block
//! is formed by central differences and scattered into the dense Jacobian.
//! Fixed parameters keep zero columns and never move.

use crate::types::ViewObservation;
use charuco_calib_core::{CameraIntrinsics, Distortion, PinholeCamera, Pose};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn, Point2, Point3, Vector2, Vector3};

pub(crate) const INTRINSIC_PARAMS: usize = 9;
pub(crate) const POSE_PARAMS: usize = 6;
const BLOCK: usize = INTRINSIC_PARAMS + POSE_PARAMS;

/// Residual reported for a point that falls behind the camera.
const BEHIND_CAMERA_RESIDUAL: f64 = 1e6;

/// Index of each intrinsic in the parameter vector.
pub(crate) mod idx {
    pub const FX: usize = 0;
    pub const FY: usize = 1;
    pub const CX: usize = 2;
    pub const CY: usize = 3;
    pub const P1: usize = 6;
    pub const P2: usize = 7;
    pub const K3: usize = 8;
}

pub(crate) fn camera_from(p: &[f64], same_focal: bool) -> PinholeCamera {
    let fy = if same_focal { p[idx::FX] } else { p[idx::FY] };
    PinholeCamera::new(
        CameraIntrinsics::new(p[idx::FX], fy, p[idx::CX], p[idx::CY]),
        Distortion::from_array([p[4], p[5], p[6], p[7], p[8]]),
    )
}

pub(crate) fn pose_from(p: &[f64]) -> Pose {
    Pose::new(
        Vector3::new(p[0], p[1], p[2]),
        Vector3::new(p[3], p[4], p[5]),
    )
}

/// Predicted pixel for `obj` given a block `[intrinsics | pose]`.
#[inline]
fn project_block(
    block: &[f64; BLOCK],
    obj: &Point3<f64>,
    same_focal: bool,
) -> Option<Vector2<f64>> {
    let camera = camera_from(&block[..INTRINSIC_PARAMS], same_focal);
    let pose = pose_from(&block[INTRINSIC_PARAMS..]);
    let px = camera.project(&pose.transform(obj))?;
    px.coords.iter().all(|v| v.is_finite()).then_some(px.coords)
}

/// Squared residual sums of a parameter vector.
#[derive(Clone, Debug)]
pub(crate) struct Residuals {
    pub total: f64,
    pub per_view: Vec<f64>,
}

/// Re-projection problem over all views, holding the current parameters.
pub(crate) struct Problem<'a> {
    views: &'a [ViewObservation],
    fixed: Vec<bool>,
    same_focal: bool,
    rows: usize,
    params: DVector<f64>,
}

impl<'a> Problem<'a> {
    /// `fixed_intrinsics[i]` keeps intrinsic `i` at its value in `params`.
    pub fn new(
        views: &'a [ViewObservation],
        fixed_intrinsics: [bool; INTRINSIC_PARAMS],
        same_focal: bool,
        params: DVector<f64>,
    ) -> Self {
        let mut fixed = vec![false; INTRINSIC_PARAMS + POSE_PARAMS * views.len()];
        fixed[..INTRINSIC_PARAMS].copy_from_slice(&fixed_intrinsics);
        if same_focal {
            fixed[idx::FY] = true;
        }
        let rows = 2 * views.iter().map(ViewObservation::len).sum::<usize>();
        Self {
            views,
            fixed,
            same_focal,
            rows,
            params,
        }
    }

    fn block(&self, view: usize) -> [f64; BLOCK] {
        let p = self.params.as_slice();
        let mut b = [0.0; BLOCK];
        b[..INTRINSIC_PARAMS].copy_from_slice(&p[..INTRINSIC_PARAMS]);
        let base = INTRINSIC_PARAMS + POSE_PARAMS * view;
        b[INTRINSIC_PARAMS..].copy_from_slice(&p[base..base + POSE_PARAMS]);
        b
    }

    fn block_indices(view: usize) -> [usize; BLOCK] {
        let base = INTRINSIC_PARAMS + POSE_PARAMS * view;
        std::array::from_fn(|k| {
            if k < INTRINSIC_PARAMS {
                k
            } else {
                base + k - INTRINSIC_PARAMS
            }
        })
    }

    fn point_residual(
        &self,
        block: &[f64; BLOCK],
        obj: &Point3<f64>,
        img: &Point2<f64>,
    ) -> Vector2<f64> {
        project_block(block, obj, self.same_focal)
            .map(|px| px - img.coords)
            .unwrap_or_else(|| Vector2::repeat(BEHIND_CAMERA_RESIDUAL))
    }

    /// Squared error per view; `None` if a point is behind the camera.
    pub fn view_errors(&self) -> Option<Residuals> {
        let mut per_view = Vec::with_capacity(self.views.len());
        for (v, view) in self.views.iter().enumerate() {
            let block = self.block(v);
            let mut sum = 0.0;
            for (obj, img) in view.object_points.iter().zip(&view.image_points) {
                let r = project_block(&block, obj, self.same_focal)? - img.coords;
                sum += r.norm_squared();
            }
            per_view.push(sum);
        }
        let total = per_view.iter().sum::<f64>();
        total.is_finite().then_some(Residuals { total, per_view })
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for Problem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let mut r = DVector::zeros(self.rows);
        let mut row = 0;
        for (v, view) in self.views.iter().enumerate() {
            let block = self.block(v);
            for (obj, img) in view.object_points.iter().zip(&view.image_points) {
                let res = self.point_residual(&block, obj, img);
                r.fixed_rows_mut::<2>(row).copy_from(&res);
                row += 2;
            }
        }
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jac = DMatrix::zeros(self.rows, self.params.len());
        let mut row = 0;
        for (v, view) in self.views.iter().enumerate() {
            let indices = Self::block_indices(v);
            let mut block = self.block(v);
            for (obj, img) in view.object_points.iter().zip(&view.image_points) {
                for k in 0..BLOCK {
                    if self.fixed[indices[k]] {
                        continue;
                    }
                    let x = block[k];
                    let step = 1e-6 * x.abs().max(1.0);
                    block[k] = x + step;
                    let plus = self.point_residual(&block, obj, img);
                    block[k] = x - step;
                    let minus = self.point_residual(&block, obj, img);
                    block[k] = x;
                    let column = (plus - minus) / (2.0 * step);
                    jac.fixed_view_mut::<2, 1>(row, indices[k]).copy_from(&column);
                }
                row += 2;
            }
        }
        jac.iter().all(|v| v.is_finite()).then_some(jac)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct LmOutcome {
    pub params: DVector<f64>,
    pub residuals: Residuals,
    pub evaluations: usize,
    pub converged: bool,
}

/// Minimize the squared re-projection error from the problem's current
/// parameters.
///
/// `patience` bounds the work to `patience * (parameters + 1)` residual
/// evaluations. Returns `None` when the final parameters put a point behind
/// the camera.
pub(crate) fn minimize(
    problem: Problem<'_>,
    patience: usize,
    tolerance: f64,
) -> Option<LmOutcome> {
    let lm = LevenbergMarquardt::new()
        .with_ftol(tolerance)
        .with_xtol(tolerance)
        .with_gtol(tolerance)
        .with_patience(patience.max(1));

    let (mut problem, report) = lm.minimize(problem);
    log::debug!(
        "lm stopped after {} evaluation(s): {:?}",
        report.number_of_evaluations,
        report.termination
    );

    if problem.same_focal {
        let mut p = problem.params();
        p[idx::FY] = p[idx::FX];
        problem.set_params(&p);
    }
    let residuals = problem.view_errors()?;
    Some(LmOutcome {
        params: problem.params,
        residuals,
        evaluations: report.number_of_evaluations,
        converged: report.termination.was_successful(),
    })
}
