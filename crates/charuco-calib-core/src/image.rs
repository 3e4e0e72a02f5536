/// Borrowed 8-bit grayscale image, row-major with `len == width * height`.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

/// Owned 8-bit grayscale image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Image filled with a constant intensity.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap a raw buffer; `None` if its length does not match the dimensions.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width.checked_mul(height)?).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }
}

impl GrayImageView<'_> {
    /// Pixel value at integer coordinates, `None` outside the image.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.data[y as usize * self.width + x as usize])
    }

    /// True if `(x, y)` lies at least `margin` pixels inside the image.
    #[inline]
    pub fn contains(&self, x: f32, y: f32, margin: f32) -> bool {
        x >= margin
            && y >= margin
            && x <= self.width as f32 - 1.0 - margin
            && y <= self.height as f32 - 1.0 - margin
    }
}

#[inline]
fn get_clamped(src: &GrayImageView<'_>, x: i64, y: i64) -> f32 {
    let xc = x.clamp(0, src.width as i64 - 1) as usize;
    let yc = y.clamp(0, src.height as i64 - 1) as usize;
    src.data[yc * src.width + xc] as f32
}

/// Bilinear intensity at `(x, y)`; pixel centers sit on integer coordinates
/// and reads past the border repeat the edge pixel.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if src.width == 0 || src.height == 0 {
        return 0.0;
    }
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_clamped(src, x0, y0);
    let p10 = get_clamped(src, x0 + 1, y0);
    let p01 = get_clamped(src, x0, y0 + 1);
    let p11 = get_clamped(src, x0 + 1, y0 + 1);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> GrayImage {
        let mut img = GrayImage::filled(4, 3, 0);
        for y in 0..3 {
            for x in 0..4 {
                img.set(x, y, (10 * x + 100 * y) as u8);
            }
        }
        img
    }

    #[test]
    fn bilinear_interpolates_between_pixel_centers() {
        let img = ramp();
        let view = img.view();
        assert_eq!(sample_bilinear(&view, 1.0, 1.0), 110.0);
        assert!((sample_bilinear(&view, 1.5, 1.0) - 115.0).abs() < 1e-4);
        assert!((sample_bilinear(&view, 1.0, 0.5) - 60.0).abs() < 1e-4);
    }

    #[test]
    fn bilinear_repeats_edge_outside() {
        let img = ramp();
        let view = img.view();
        assert_eq!(sample_bilinear(&view, -3.0, 0.0), 0.0);
        assert_eq!(sample_bilinear(&view, 10.0, 2.0), 230.0);
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        assert!(GrayImage::from_raw(3, 3, vec![0; 8]).is_none());
        assert!(GrayImage::from_raw(3, 3, vec![0; 9]).is_some());
    }

    #[test]
    fn get_is_none_outside() {
        let img = ramp();
        let view = img.view();
        assert_eq!(view.get(3, 2), Some(230));
        assert_eq!(view.get(4, 0), None);
        assert_eq!(view.get(0, -1), None);
    }
}
