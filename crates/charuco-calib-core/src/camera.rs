//! Pinhole camera with OpenCV-style radial/tangential distortion.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Linear intrinsics (zero skew).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// The 3×3 camera matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Distortion coefficients in OpenCV order `(k1, k2, p1, p2, k3)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Apply distortion to an ideal normalized image point.
    #[inline]
    pub fn distort(&self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Point2::new(xd, yd)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, pd: Point2<f64>) -> Point2<f64> {
        let mut p = pd;
        for _ in 0..20 {
            let (x, y) = (p.x, p.y);
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            if radial.abs() < 1e-12 {
                break;
            }
            let next = Point2::new((pd.x - dx) / radial, (pd.y - dy) / radial);
            let step = (next - p).norm();
            p = next;
            if step < 1e-14 {
                break;
            }
        }
        p
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
}

impl PinholeCamera {
    pub fn new(intrinsics: CameraIntrinsics, distortion: Distortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Pixel position of a normalized (`z = 1`) point.
    #[inline]
    pub fn project_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        let d = self.distortion.distort(p);
        let k = &self.intrinsics;
        Point2::new(k.fx * d.x + k.cx, k.fy * d.y + k.cy)
    }

    /// Project a point given in the camera frame; `None` behind the camera.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 1e-12 {
            return None;
        }
        Some(self.project_normalized(Point2::new(p.x / p.z, p.y / p.z)))
    }

    /// Ideal normalized coordinates of a pixel.
    pub fn unproject(&self, px: Point2<f64>) -> Point2<f64> {
        let k = &self.intrinsics;
        let pd = Point2::new((px.x - k.cx) / k.fx, (px.y - k.cy) / k.fy);
        self.distortion.undistort(pd)
    }
}

/// Board-to-camera rigid transform; rotation stored as a Rodrigues vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn from_rotation(r: &Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self::new(r.scaled_axis(), translation)
    }

    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation)
    }

    #[inline]
    pub fn transform(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation_matrix() * p + self.translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> PinholeCamera {
        PinholeCamera::new(
            CameraIntrinsics::new(800.0, 780.0, 320.0, 240.0),
            Distortion::from_array([-0.21, 0.08, 0.001, -0.0005, -0.01]),
        )
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = camera().distortion;
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(0.3, -0.2),
            Point2::new(-0.35, 0.25),
        ] {
            let back = d.undistort(d.distort(p));
            assert_relative_eq!(back.x, p.x, epsilon = 1e-10);
            assert_relative_eq!(back.y, p.y, epsilon = 1e-10);
        }
    }

    #[test]
    fn unproject_inverts_project() {
        let cam = camera();
        let p = Point3::new(0.1, -0.05, 0.7);
        let px = cam.project(&p).expect("in front");
        let n = cam.unproject(px);
        assert_relative_eq!(n.x, p.x / p.z, epsilon = 1e-9);
        assert_relative_eq!(n.y, p.y / p.z, epsilon = 1e-9);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        assert!(camera().project(&Point3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn pose_round_trips_rotation() {
        let r = Rotation3::from_euler_angles(0.2, -0.4, 0.1);
        let pose = Pose::from_rotation(&r, Vector3::new(0.1, 0.0, 0.5));
        assert_relative_eq!(pose.rotation_matrix(), r, epsilon = 1e-12);
        let p = pose.transform(&Point3::origin());
        assert_relative_eq!(p.coords, pose.translation, epsilon = 1e-12);
    }

    #[test]
    fn camera_matrix_layout() {
        let k = camera().intrinsics.matrix();
        assert_eq!(k[(0, 0)], 800.0);
        assert_eq!(k[(1, 2)], 240.0);
        assert_eq!(k[(0, 1)], 0.0);
        assert_eq!(k[(2, 2)], 1.0);
    }
}
