//! ChArUco corner interpolation from decoded markers.

use crate::board::CharucoBoard;
use crate::subpix::{refine_corner, SubpixParams};
use charuco_calib_aruco::MarkerDetection;
use charuco_calib_core::{estimate_homography, GrayImageView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Settings for [`CharucoInterpolator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationParams {
    /// Detected markers a corner must touch before it is interpolated.
    pub min_markers: usize,
    /// Run sub-pixel refinement on the projected corners.
    pub refine: bool,
    /// Lower bound for the refinement half window (pixels).
    pub min_refine_window: usize,
    /// Upper bound for the refinement half window (pixels).
    pub max_refine_window: usize,
    pub refine_iterations: usize,
    /// Stop once an iteration moves the corner less than this (pixels).
    pub refine_epsilon: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            min_markers: 2,
            refine: true,
            min_refine_window: 2,
            max_refine_window: 5,
            refine_iterations: 40,
            refine_epsilon: 0.01,
        }
    }
}

/// Interpolated ChArUco corners, sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CharucoCorners {
    pub ids: Vec<u32>,
    pub points: Vec<Point2<f32>>,
}

impl CharucoCorners {
    /// Number of usable corners (the interpolation response).
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Point2<f32>)> + '_ {
        self.ids.iter().copied().zip(self.points.iter().copied())
    }
}

/// Turns marker detections into board corner observations.
pub trait CornerInterpolator {
    fn interpolate(
        &self,
        markers: &[MarkerDetection],
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
    ) -> CharucoCorners;
}

/// Local-homography interpolator: each corner is projected through the
/// markers touching it, then refined on the image.
#[derive(Clone, Debug, Default)]
pub struct CharucoInterpolator {
    params: InterpolationParams,
}

impl CharucoInterpolator {
    pub fn new(params: InterpolationParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &InterpolationParams {
        &self.params
    }

    /// Refinement half window from the distance to the nearest marker corner.
    fn half_window(&self, corner: Point2<f64>, marker_corners: &[Point2<f64>]) -> usize {
        let nearest = marker_corners
            .iter()
            .map(|c| (c - corner).norm())
            .fold(f64::INFINITY, f64::min);
        let lo = self.params.min_refine_window.max(1);
        let hi = self.params.max_refine_window.max(lo);
        if !nearest.is_finite() {
            return lo;
        }
        ((0.5 * nearest).round() as usize).clamp(lo, hi)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(markers = markers.len()))
    )]
    pub fn interpolate(
        &self,
        markers: &[MarkerDetection],
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
    ) -> CharucoCorners {
        let by_id: HashMap<u32, &MarkerDetection> = markers
            .iter()
            .filter(|m| (m.id as usize) < board.marker_count())
            .map(|m| (m.id, m))
            .collect();
        if by_id.len() < markers.len() {
            log::debug!(
                "{} marker(s) ignored: off-board or duplicate id",
                markers.len() - by_id.len()
            );
        }

        let mut out = CharucoCorners::default();
        let mut rejected_refine = 0usize;
        for id in 0..board.corner_count() as u32 {
            let touching: Vec<&MarkerDetection> = board
                .corner_markers(id)
                .iter()
                .filter_map(|mid| by_id.get(mid).copied())
                .collect();
            if touching.is_empty() || touching.len() < self.params.min_markers {
                continue;
            }

            let mut obj = Vec::with_capacity(4 * touching.len());
            let mut img = Vec::with_capacity(4 * touching.len());
            for m in &touching {
                let Some(corners) = board.marker_object_corners(m.id) else {
                    continue;
                };
                obj.extend_from_slice(&corners);
                img.extend(
                    m.corners
                        .iter()
                        .map(|p| Point2::new(p.x as f64, p.y as f64)),
                );
            }
            let (Some(h), Some(xy)) = (estimate_homography(&obj, &img), board.corner_object_xy(id))
            else {
                continue;
            };
            let projected = h.apply(xy);
            if !image.contains(projected.x as f32, projected.y as f32, 1.0) {
                continue;
            }

            let mut point = projected;
            if self.params.refine {
                let sub = SubpixParams {
                    half_window: self.half_window(projected, &img),
                    max_iterations: self.params.refine_iterations,
                    epsilon: self.params.refine_epsilon,
                };
                match refine_corner(image, projected, &sub) {
                    Some(p) => point = p,
                    None => rejected_refine += 1,
                }
            }

            out.ids.push(id);
            out.points.push(Point2::new(point.x as f32, point.y as f32));
        }

        log::debug!(
            "interpolated {} corner(s) from {} marker(s); {} kept unrefined",
            out.len(),
            by_id.len(),
            rejected_refine
        );
        out
    }
}

impl CornerInterpolator for CharucoInterpolator {
    fn interpolate(
        &self,
        markers: &[MarkerDetection],
        image: &GrayImageView<'_>,
        board: &CharucoBoard,
    ) -> CharucoCorners {
        CharucoInterpolator::interpolate(self, markers, image, board)
    }
}
