//! Full-image square marker detection.

use crate::decode::CellSampler;
use crate::quad::{dark_components, fit_quad, QuadLimits};
use crate::threshold::adaptive_threshold_dark;
use crate::{Dictionary, Matcher};
use charuco_calib_core::GrayImageView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Tuning knobs for [`ArucoDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArucoDetectorParams {
    /// Side of the adaptive threshold window in pixels; `0` picks one from
    /// the image size.
    pub adaptive_window: usize,
    /// A pixel is dark when it is this much below its local mean.
    pub adaptive_constant: f32,
    /// Smallest accepted marker side in pixels.
    pub min_marker_px: f32,
    /// Largest accepted marker side relative to the larger image dimension.
    pub max_marker_frac: f32,
    /// Minimum quad area over blob hull area.
    pub min_quad_fill: f32,
    /// Corners closer than this to the image border are dropped.
    pub min_border_distance: f32,
    /// Marker border width in cells.
    pub border_bits: usize,
    /// Required fraction of black border cells.
    pub min_border_score: f32,
    /// Minimum spread between the darkest and brightest cell.
    pub min_contrast: u8,
    /// Requested Hamming tolerance; capped by the dictionary.
    pub max_hamming: u8,
}

impl Default for ArucoDetectorParams {
    fn default() -> Self {
        Self {
            adaptive_window: 0,
            adaptive_constant: 7.0,
            min_marker_px: 10.0,
            max_marker_frac: 0.9,
            min_quad_fill: 0.9,
            min_border_distance: 3.0,
            border_bits: 1,
            min_border_score: 0.85,
            min_contrast: 20,
            max_hamming: 0,
        }
    }
}

impl ArucoDetectorParams {
    fn window_for(&self, width: usize, height: usize) -> usize {
        if self.adaptive_window > 0 {
            return self.adaptive_window | 1;
        }
        ((width.min(height) / 20) | 1).clamp(15, 75)
    }
}

/// One decoded marker in image coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerDetection {
    pub id: u32,
    /// Marker corners TL, TR, BR, BL in the marker's own orientation.
    pub corners: [Point2<f32>; 4],
    /// Quarter turns of the marker relative to its sampling orientation.
    pub rotation: u8,
    pub hamming: u8,
    pub border_score: f32,
    /// `border_score` penalized by the Hamming distance, in `[0, 1]`.
    pub score: f32,
}

/// Output of a detection run.
#[derive(Clone, Debug, Default)]
pub struct ArucoDetections {
    /// Decoded markers, at most one per id, sorted by id.
    pub markers: Vec<MarkerDetection>,
    /// Quads that looked like markers but did not decode.
    pub rejected: Vec<[Point2<f32>; 4]>,
}

/// Anything that finds dictionary markers in a grayscale image.
pub trait MarkerDetector {
    fn detect_markers(&self, image: &GrayImageView<'_>) -> ArucoDetections;
}

/// Contour-free square marker detector: adaptive threshold, connected
/// components, quad fit, bit decode, dictionary lookup.
#[derive(Clone, Debug)]
pub struct ArucoDetector {
    params: ArucoDetectorParams,
    matcher: Matcher,
}

impl ArucoDetector {
    pub fn new(dictionary: Dictionary, params: ArucoDetectorParams) -> Self {
        let matcher = Matcher::new(dictionary, params.max_hamming);
        Self { params, matcher }
    }

    #[inline]
    pub fn params(&self) -> &ArucoDetectorParams {
        &self.params
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect(&self, image: &GrayImageView<'_>) -> ArucoDetections {
        let mut out = ArucoDetections::default();
        let (w, h) = (image.width, image.height);
        if w == 0 || h == 0 || image.data.len() != w * h {
            log::warn!("skipping marker detection on malformed {w}x{h} image");
            return out;
        }
        let dict = self.matcher.dictionary();
        let Some(mut sampler) = CellSampler::new(dict.marker_size, self.params.border_bits) else {
            log::warn!("dictionary {} has unsupported marker size", dict.name);
            return out;
        };

        let p = &self.params;
        let window = p.window_for(w, h);
        let mask = adaptive_threshold_dark(image, window, p.adaptive_constant);

        let max_side = (p.max_marker_frac as f64 * w.max(h) as f64).max(1.0);
        let min_side = p.min_marker_px.max(1.0) as usize;
        let components = dark_components(&mask, w, h, min_side, max_side.ceil() as usize);

        let limits = QuadLimits {
            min_side_px: p.min_marker_px as f64,
            max_side_px: max_side,
            min_fill: p.min_quad_fill as f64,
            min_border_distance: p.min_border_distance as f64,
        };
        let bits = dict.bit_count().max(1) as f32;

        let mut quads = 0usize;
        for comp in &components {
            let Some(quad) = fit_quad(comp, w, h, &limits) else {
                continue;
            };
            quads += 1;
            let as_f32 = quad.map(|q| Point2::new(q.x as f32, q.y as f32));

            let decoded = sampler
                .decode(image, &quad, p.min_border_score, p.min_contrast)
                .and_then(|obs| self.matcher.match_code(obs.code).map(|m| (obs, m)));
            let Some((obs, m)) = decoded else {
                out.rejected.push(as_f32);
                continue;
            };

            let r = m.rotation as usize;
            let corners = std::array::from_fn(|k| as_f32[(k + r) % 4]);
            let score = (obs.border_score * (1.0 - m.hamming as f32 / bits)).clamp(0.0, 1.0);
            out.markers.push(MarkerDetection {
                id: m.id,
                corners,
                rotation: m.rotation,
                hamming: m.hamming,
                border_score: obs.border_score,
                score,
            });
        }

        out.markers = dedup_by_id_keep_best(std::mem::take(&mut out.markers));
        log::debug!(
            "markers: {} blobs, {} quads, {} decoded, {} rejected (window {window})",
            components.len(),
            quads,
            out.markers.len(),
            out.rejected.len()
        );
        out
    }
}

impl MarkerDetector for ArucoDetector {
    fn detect_markers(&self, image: &GrayImageView<'_>) -> ArucoDetections {
        self.detect(image)
    }
}

fn dedup_by_id_keep_best(markers: Vec<MarkerDetection>) -> Vec<MarkerDetection> {
    let mut best: HashMap<u32, MarkerDetection> = HashMap::new();
    for m in markers {
        match best.get(&m.id) {
            Some(prev) if prev.score >= m.score => {
                log::debug!("duplicate marker id {} dropped", m.id);
            }
            _ => {
                best.insert(m.id, m);
            }
        }
    }
    let mut out: Vec<MarkerDetection> = best.into_values().collect();
    out.sort_by_key(|m| m.id);
    out
}
