//! Bit sampling inside a candidate quad.

use crate::threshold::otsu_threshold;
use charuco_calib_core::{homography_from_4pt, sample_bilinear, GrayImageView, Homography};
use nalgebra::Point2;

/// Raw bits read from one quad, before dictionary lookup.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MarkerObservation {
    /// Inner bits, row-major, black = 1, in sampling orientation.
    pub code: u64,
    /// Fraction of border cells read as black.
    pub border_score: f32,
}

/// Sub-cell offsets averaged per cell: a 3×3 grid over the central half.
const CELL_OFFSETS: [f64; 3] = [-0.25, 0.0, 0.25];

/// Reads `(bits + 2 * border)²` cell intensities through a quad homography.
pub(crate) struct CellSampler {
    bits: usize,
    border: usize,
    cells: usize,
    values: Vec<u8>,
}

impl CellSampler {
    pub fn new(bits: usize, border: usize) -> Option<Self> {
        if bits == 0 || bits * bits > 64 {
            return None;
        }
        let cells = bits + 2 * border;
        Some(Self {
            bits,
            border,
            cells,
            values: Vec::with_capacity(cells * cells),
        })
    }

    /// Homography from the canonical cell square `[0, cells]²` to the quad.
    fn cell_homography(&self, quad: &[Point2<f64>; 4]) -> Option<Homography> {
        let c = self.cells as f64;
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(c, 0.0),
            Point2::new(c, c),
            Point2::new(0.0, c),
        ];
        homography_from_4pt(&square, quad)
    }

    /// Sample and binarize the quad. `None` when the border is not dark
    /// enough or the cells show no contrast.
    pub fn decode(
        &mut self,
        img: &GrayImageView<'_>,
        quad: &[Point2<f64>; 4],
        min_border_score: f32,
        min_contrast: u8,
    ) -> Option<MarkerObservation> {
        let h = self.cell_homography(quad)?;

        self.values.clear();
        for cy in 0..self.cells {
            for cx in 0..self.cells {
                let mut acc = 0.0f32;
                for oy in CELL_OFFSETS {
                    for ox in CELL_OFFSETS {
                        let p = h.apply(Point2::new(cx as f64 + 0.5 + ox, cy as f64 + 0.5 + oy));
                        acc += sample_bilinear(img, p.x as f32, p.y as f32);
                    }
                }
                let mean = acc / (CELL_OFFSETS.len() * CELL_OFFSETS.len()) as f32;
                self.values.push(mean.round().clamp(0.0, 255.0) as u8);
            }
        }

        let lo = self.values.iter().copied().min()?;
        let hi = self.values.iter().copied().max()?;
        if hi.saturating_sub(lo) < min_contrast {
            return None;
        }
        let thr = otsu_threshold(&self.values);

        let mut border_black = 0u32;
        let mut border_total = 0u32;
        let mut code = 0u64;
        for cy in 0..self.cells {
            for cx in 0..self.cells {
                let black = self.values[cy * self.cells + cx] <= thr;
                let on_border = cx < self.border
                    || cy < self.border
                    || cx >= self.cells - self.border
                    || cy >= self.cells - self.border;
                if on_border {
                    border_total += 1;
                    border_black += black as u32;
                } else if black {
                    let bx = cx - self.border;
                    let by = cy - self.border;
                    code |= 1u64 << (by * self.bits + bx);
                }
            }
        }

        let border_score = if border_total == 0 {
            1.0
        } else {
            border_black as f32 / border_total as f32
        };
        (border_score >= min_border_score).then_some(MarkerObservation { code, border_score })
    }
}
