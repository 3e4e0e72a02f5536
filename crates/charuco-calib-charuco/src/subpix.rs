//! Gradient-based sub-pixel corner refinement.
//!
//! For a corner `q`, every nearby gradient `g(p)` is orthogonal to `p - q`.
//! Minimizing `Σ w (gᵀ(p - q))²` gives `q = (Σ w g gᵀ)⁻¹ Σ w g gᵀ p`, which
//! is iterated with the window re-centered on the new estimate.

use charuco_calib_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refinement settings.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SubpixParams {
    pub half_window: usize,
    pub max_iterations: usize,
    pub epsilon: f64,
}

/// Refine `guess`; `None` if the system is singular or the estimate leaves
/// the window.
pub(crate) fn refine_corner(
    img: &GrayImageView<'_>,
    guess: Point2<f64>,
    params: &SubpixParams,
) -> Option<Point2<f64>> {
    let half = params.half_window.max(1) as i64;
    let sigma2 = (half as f64).powi(2);
    let weights: Vec<f64> = (-half..=half)
        .flat_map(|dy| (-half..=half).map(move |dx| (dx, dy)))
        .map(|(dx, dy)| (-((dx * dx + dy * dy) as f64) / (2.0 * sigma2)).exp())
        .collect();

    let sample = |x: f64, y: f64| sample_bilinear(img, x as f32, y as f32) as f64;
    let mut q = guess;
    for _ in 0..params.max_iterations.max(1) {
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();
        let mut k = 0;
        for dy in -half..=half {
            for dx in -half..=half {
                let w = weights[k];
                k += 1;
                let px = q.x + dx as f64;
                let py = q.y + dy as f64;
                let gx = 0.5 * (sample(px + 1.0, py) - sample(px - 1.0, py));
                let gy = 0.5 * (sample(px, py + 1.0) - sample(px, py - 1.0));
                let g = Vector2::new(gx, gy);
                let ggt = g * g.transpose() * w;
                a += ggt;
                b += ggt * Vector2::new(dx as f64, dy as f64);
            }
        }

        let shift = a.try_inverse()? * b;
        if !shift.iter().all(|v| v.is_finite()) {
            return None;
        }
        q += shift;
        if (q - guess).norm() > half as f64 {
            return None;
        }
        if shift.norm() < params.epsilon {
            break;
        }
    }
    Some(q)
}
