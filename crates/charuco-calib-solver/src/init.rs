//! Closed-form starting point: per-view homographies, focal lengths with a
//! known principal point, and poses from the homographies.

use crate::error::SolverError;
use crate::types::ViewObservation;
use charuco_calib_core::{estimate_homography, Pose};
use nalgebra::{Matrix2, Matrix3, Point2, Rotation3, Vector2, Vector3};

/// Focal lengths above this multiple of the image size are treated as a
/// failed (near fronto-parallel) initialization.
const MAX_FOCAL_FACTOR: f64 = 100.0;

/// Board-plane to image homography of one view.
pub(crate) fn view_homography(
    view: &ViewObservation,
    index: usize,
) -> Result<Matrix3<f64>, SolverError> {
    let src: Vec<Point2<f64>> = view
        .object_points
        .iter()
        .map(|p| Point2::new(p.x, p.y))
        .collect();
    estimate_homography(&src, &view.image_points)
        .map(|h| h.h)
        .ok_or(SolverError::Homography { view: index })
}

/// Solve `fx`, `fy` from the homographies with the principal point fixed.
///
/// With `K = diag(fx, fy, 1)` after centering, `ω = K⁻ᵀK⁻¹ = diag(a, b, 1)`
/// and every view contributes `h1ᵀωh2 = 0` and `h1ᵀωh1 = h2ᵀωh2`, linear in
/// `(a, b) = (1/fx², 1/fy²)`.
pub(crate) fn init_focal_lengths(
    homographies: &[Matrix3<f64>],
    principal_point: (f64, f64),
    image_size: (u32, u32),
) -> Result<(f64, f64), SolverError> {
    let (cx, cy) = principal_point;
    let center = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);

    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for h in homographies {
        let hc = center * h;
        let norm = hc.norm();
        if norm <= f64::EPSILON {
            continue;
        }
        let hc = hc / norm;
        let (h1, h2) = (hc.column(0), hc.column(1));

        let rows = [
            (
                Vector2::new(h1[0] * h2[0], h1[1] * h2[1]),
                -h1[2] * h2[2],
            ),
            (
                Vector2::new(h1[0] * h1[0] - h2[0] * h2[0], h1[1] * h1[1] - h2[1] * h2[1]),
                -(h1[2] * h1[2] - h2[2] * h2[2]),
            ),
        ];
        for (a, b) in rows {
            ata += a * a.transpose();
            atb += a * b;
        }
    }

    let ab = ata
        .try_inverse()
        .map(|inv| inv * atb)
        .ok_or(SolverError::DegenerateInitialization)?;
    if !(ab[0] > 0.0 && ab[1] > 0.0) {
        log::debug!("focal initialization: a = {:e}, b = {:e}", ab[0], ab[1]);
        return Err(SolverError::DegenerateInitialization);
    }

    let fx = 1.0 / ab[0].sqrt();
    let fy = 1.0 / ab[1].sqrt();
    let limit = MAX_FOCAL_FACTOR * image_size.0.max(image_size.1) as f64;
    if !fx.is_finite() || !fy.is_finite() || fx > limit || fy > limit {
        log::debug!("focal initialization out of range: fx = {fx:e}, fy = {fy:e}");
        return Err(SolverError::DegenerateInitialization);
    }
    Ok((fx, fy))
}

/// Decompose `H ~ K [r1 r2 t]` into a pose with the board in front of the
/// camera.
pub(crate) fn pose_from_homography(k: &Matrix3<f64>, h: &Matrix3<f64>) -> Option<Pose> {
    let k_inv = k.try_inverse()?;
    let a1 = k_inv * h.column(0);
    let a2 = k_inv * h.column(1);
    let a3 = k_inv * h.column(2);

    let denom = a1.norm() + a2.norm();
    if denom <= f64::EPSILON {
        return None;
    }
    let mut lambda = 2.0 / denom;
    if a3[2] * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1: Vector3<f64> = a1 * lambda;
    let r2: Vector3<f64> = a2 * lambda;
    let r = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);

    // nearest rotation
    let svd = r.svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let rot = Rotation3::from_matrix_unchecked(u * v_t);
    let t = a3 * lambda;
    if !t.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Pose::from_rotation(&rot, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn k() -> Matrix3<f64> {
        Matrix3::new(810.0, 0.0, 319.5, 0.0, 790.0, 239.5, 0.0, 0.0, 1.0)
    }

    fn homography(pose: &Pose) -> Matrix3<f64> {
        let r = pose.rotation_matrix();
        let m = r.matrix();
        k() * Matrix3::from_columns(&[
            m.column(0).into_owned(),
            m.column(1).into_owned(),
            pose.translation,
        ])
    }

    fn pose(rx: f64, ry: f64, rz: f64) -> Pose {
        Pose::new(Vector3::new(rx, ry, rz), Vector3::new(-0.1, -0.08, 0.6))
    }

    #[test]
    fn focal_lengths_from_tilted_views() {
        let hs = [
            homography(&pose(0.3, 0.1, 0.05)),
            homography(&pose(-0.2, 0.35, -0.1)),
            homography(&pose(0.1, -0.3, 0.2)),
        ];
        let (fx, fy) = init_focal_lengths(&hs, (319.5, 239.5), (640, 480)).expect("init");
        assert_relative_eq!(fx, 810.0, max_relative = 1e-9);
        assert_relative_eq!(fy, 790.0, max_relative = 1e-9);
    }

    #[test]
    fn fronto_parallel_views_are_degenerate() {
        let hs = [homography(&pose(0.0, 0.0, 0.3)), homography(&pose(0.0, 0.0, -0.4))];
        assert_eq!(
            init_focal_lengths(&hs, (319.5, 239.5), (640, 480)),
            Err(SolverError::DegenerateInitialization)
        );
    }

    #[test]
    fn pose_recovered_from_homography() {
        let truth = pose(0.25, -0.15, 0.4);
        let est = pose_from_homography(&k(), &homography(&truth)).expect("pose");
        assert_relative_eq!(est.rotation, truth.rotation, epsilon = 1e-9);
        assert_relative_eq!(est.translation, truth.translation, epsilon = 1e-9);

        // sign of H does not flip the board behind the camera
        let est = pose_from_homography(&k(), &(-homography(&truth))).expect("pose");
        assert!(est.translation.z > 0.0);
        let p = est.transform(&Point3::new(0.1, 0.1, 0.0));
        assert_relative_eq!(p, truth.transform(&Point3::new(0.1, 0.1, 0.0)), epsilon = 1e-9);
    }
}
