use crate::error::SolverError;
use crate::init::{init_focal_lengths, pose_from_homography, view_homography};
use crate::lm::{self, idx, Problem, INTRINSIC_PARAMS, POSE_PARAMS};
use crate::types::{CalibrationOptions, CalibrationResult, ViewObservation};
use charuco_calib_core::CameraIntrinsics;
use nalgebra::DVector;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Object points further than this from `z = 0` make a view non-planar.
const PLANAR_TOLERANCE: f64 = 1e-9;

/// Fits a camera model to planar board observations.
pub trait CalibrationSolver {
    fn calibrate(
        &self,
        views: &[ViewObservation],
        image_size: (u32, u32),
    ) -> Result<CalibrationResult, SolverError>;
}

/// Homography initialization followed by joint Levenberg-Marquardt.
#[derive(Clone, Debug, Default)]
pub struct PlanarCalibrator {
    options: CalibrationOptions,
}

impl PlanarCalibrator {
    pub fn new(options: CalibrationOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &CalibrationOptions {
        &self.options
    }
}

impl CalibrationSolver for PlanarCalibrator {
    fn calibrate(
        &self,
        views: &[ViewObservation],
        image_size: (u32, u32),
    ) -> Result<CalibrationResult, SolverError> {
        calibrate_planar(views, image_size, &self.options)
    }
}

fn validate(views: &[ViewObservation], image_size: (u32, u32)) -> Result<(), SolverError> {
    let (width, height) = image_size;
    if width == 0 || height == 0 {
        return Err(SolverError::InvalidImageSize { width, height });
    }
    if views.is_empty() {
        return Err(SolverError::NoViews);
    }
    for (view, obs) in views.iter().enumerate() {
        if obs.object_points.len() != obs.image_points.len() {
            return Err(SolverError::MismatchedLengths {
                view,
                object: obs.object_points.len(),
                image: obs.image_points.len(),
            });
        }
        if obs.len() < 4 {
            return Err(SolverError::NotEnoughPoints {
                view,
                found: obs.len(),
            });
        }
        if obs.object_points.iter().any(|p| p.z.abs() > PLANAR_TOLERANCE) {
            return Err(SolverError::NonPlanarObjectPoints { view });
        }
    }
    Ok(())
}

/// Calibrate intrinsics and distortion from planar views.
///
/// The principal point starts at the image center `((w-1)/2, (h-1)/2)`, the
/// focal lengths come from the view homographies and distortion starts at
/// zero. Everything not fixed by `options` is then refined jointly with the
/// per-view poses.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(views = views.len()))
)]
pub fn calibrate_planar(
    views: &[ViewObservation],
    image_size: (u32, u32),
    options: &CalibrationOptions,
) -> Result<CalibrationResult, SolverError> {
    validate(views, image_size)?;

    let homographies = views
        .iter()
        .enumerate()
        .map(|(i, v)| view_homography(v, i))
        .collect::<Result<Vec<_>, _>>()?;

    let cx = 0.5 * (image_size.0 as f64 - 1.0);
    let cy = 0.5 * (image_size.1 as f64 - 1.0);
    let (mut fx, mut fy) = init_focal_lengths(&homographies, (cx, cy), image_size)?;
    if options.fix_aspect_ratio {
        fx = 0.5 * (fx + fy);
        fy = fx;
    }
    log::debug!("initial intrinsics: fx {fx:.2}, fy {fy:.2}, cx {cx:.2}, cy {cy:.2}");

    let k = CameraIntrinsics::new(fx, fy, cx, cy).matrix();
    let mut params = Vec::with_capacity(INTRINSIC_PARAMS + POSE_PARAMS * views.len());
    params.extend_from_slice(&[fx, fy, cx, cy, 0.0, 0.0, 0.0, 0.0, 0.0]);
    for (view, h) in homographies.iter().enumerate() {
        let pose = pose_from_homography(&k, h).ok_or(SolverError::PoseInitialization { view })?;
        params.extend(pose.rotation.iter());
        params.extend(pose.translation.iter());
    }

    let mut fixed = [false; INTRINSIC_PARAMS];
    if options.fix_principal_point {
        fixed[idx::CX] = true;
        fixed[idx::CY] = true;
    }
    if options.zero_tangent_dist {
        fixed[idx::P1] = true;
        fixed[idx::P2] = true;
    }
    if options.fix_k3 {
        fixed[idx::K3] = true;
    }

    let problem = Problem::new(
        views,
        fixed,
        options.fix_aspect_ratio,
        DVector::from_vec(params),
    );
    let outcome = lm::minimize(problem, options.max_iterations, options.epsilon)
        .ok_or(SolverError::NonFinite)?;

    let p = outcome.params.as_slice();
    let camera = lm::camera_from(&p[..INTRINSIC_PARAMS], options.fix_aspect_ratio);
    let poses = (0..views.len())
        .map(|v| {
            let base = INTRINSIC_PARAMS + POSE_PARAMS * v;
            lm::pose_from(&p[base..base + POSE_PARAMS])
        })
        .collect();

    let per_view_rms = views
        .iter()
        .zip(&outcome.residuals.per_view)
        .map(|(v, sq)| (sq / v.len() as f64).sqrt())
        .collect();
    let total_points: usize = views.iter().map(ViewObservation::len).sum();
    let rms = (outcome.residuals.total / total_points as f64).sqrt();
    if !rms.is_finite() || !camera.intrinsics.is_finite() {
        return Err(SolverError::NonFinite);
    }

    log::info!(
        "calibrated from {} view(s), {} point(s): rms {:.4} px after {} evaluation(s){}",
        views.len(),
        total_points,
        rms,
        outcome.evaluations,
        if outcome.converged { "" } else { " (not converged)" }
    );

    Ok(CalibrationResult {
        intrinsics: camera.intrinsics,
        distortion: camera.distortion,
        poses,
        per_view_rms,
        rms,
        iterations: outcome.evaluations,
        converged: outcome.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, Point3};

    fn square_view(n: usize) -> ViewObservation {
        let obj: Vec<Point3<f64>> = (0..n)
            .map(|i| Point3::new(i as f64, (i * i) as f64, 0.0))
            .collect();
        let img = obj.iter().map(|p| Point2::new(p.x, p.y)).collect();
        ViewObservation::new(obj, img)
    }

    #[test]
    fn validation_errors() {
        let opts = CalibrationOptions::default();
        assert_eq!(
            calibrate_planar(&[], (640, 480), &opts),
            Err(SolverError::NoViews)
        );
        assert_eq!(
            calibrate_planar(&[square_view(6)], (0, 480), &opts),
            Err(SolverError::InvalidImageSize {
                width: 0,
                height: 480
            })
        );
        assert_eq!(
            calibrate_planar(&[square_view(6), square_view(3)], (640, 480), &opts),
            Err(SolverError::NotEnoughPoints { view: 1, found: 3 })
        );

        let mut uneven = square_view(6);
        uneven.image_points.pop();
        assert_eq!(
            calibrate_planar(&[uneven], (640, 480), &opts),
            Err(SolverError::MismatchedLengths {
                view: 0,
                object: 6,
                image: 5
            })
        );

        let mut raised = square_view(6);
        raised.object_points[2].z = 0.01;
        assert_eq!(
            calibrate_planar(&[raised], (640, 480), &opts),
            Err(SolverError::NonPlanarObjectPoints { view: 0 })
        );
    }

    #[test]
    fn calibrator_uses_its_options() {
        let cal = PlanarCalibrator::new(CalibrationOptions {
            fix_k3: true,
            ..CalibrationOptions::default()
        });
        assert!(cal.options().fix_k3);
        assert_eq!(cal.calibrate(&[], (10, 10)), Err(SolverError::NoViews));
    }
}
