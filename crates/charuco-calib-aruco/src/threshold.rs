//! Binarization used for candidate search and bit decoding.

use charuco_calib_core::GrayImageView;

/// Otsu threshold over a set of intensities.
///
/// Values `<= threshold` belong to the dark class.
pub(crate) fn otsu_threshold(samples: &[u8]) -> u8 {
    let Some((&min_v, &max_v)) = samples.iter().min().zip(samples.iter().max()) else {
        return 127;
    };
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_dark = 0.0;
    let mut w_dark = 0.0;
    let mut best_var = -1.0;
    let mut best_t = min_v;
    for (t, &h) in hist.iter().enumerate().take(max_v as usize) {
        w_dark += h as f64;
        sum_dark += t as f64 * h as f64;
        if w_dark < 1.0 {
            continue;
        }
        let w_light = total - w_dark;
        if w_light < 1.0 {
            break;
        }
        let m_dark = sum_dark / w_dark;
        let m_light = (sum_total - sum_dark) / w_light;
        let var_between = w_dark * w_light * (m_dark - m_light).powi(2);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }
    best_t
}

/// Summed-area table with one row/column of zero padding.
struct IntegralImage {
    stride: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn new(img: &GrayImageView<'_>) -> Self {
        let stride = img.width + 1;
        let mut sums = vec![0u64; stride * (img.height + 1)];
        for y in 0..img.height {
            let mut row = 0u64;
            for x in 0..img.width {
                row += img.data[y * img.width + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the half-open box `[x0, x1) × [y0, y1)`.
    #[inline]
    fn box_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.sums[y1 * s + x1] + self.sums[y0 * s + x0]
            - self.sums[y0 * s + x1]
            - self.sums[y1 * s + x0]
    }
}

/// Mark pixels darker than their local mean by more than `constant`.
///
/// `window` is the side of the square averaging box (clipped at the image
/// border). Returns a row-major mask with `true` for dark pixels.
pub(crate) fn adaptive_threshold_dark(
    img: &GrayImageView<'_>,
    window: usize,
    constant: f32,
) -> Vec<bool> {
    let (w, h) = (img.width, img.height);
    let integral = IntegralImage::new(img);
    let half = (window / 2).max(1);

    let mut mask = vec![false; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(half);
        let y1 = (y + half + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(half);
            let x1 = (x + half + 1).min(w);
            let area = ((x1 - x0) * (y1 - y0)) as f32;
            let mean = integral.box_sum(x0, y0, x1, y1) as f32 / area;
            mask[y * w + x] = (img.data[y * w + x] as f32) < mean - constant;
        }
    }
    mask
}
