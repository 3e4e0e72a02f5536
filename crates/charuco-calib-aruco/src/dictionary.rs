//! Dictionary metadata and packed marker codes.

/// A fixed ArUco-style dictionary.
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    /// Name used in configuration files, e.g. `DICT_4X4_50`.
    pub name: &'static str,
    /// Number of inner bits per marker side.
    pub marker_size: usize,
    /// Maximum Hamming distance a match may be corrected by.
    pub max_correction_bits: u8,
    /// One code per marker id with the inner `marker_size²` bits.
    ///
    /// Bit index is `y * marker_size + x` (row-major) and **black = 1**.
    pub codes: &'static [u64],
}

impl Dictionary {
    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    /// Number of marker ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// True if inner bit `(x, y)` of marker `id` is black.
    pub fn is_black(&self, id: u32, x: usize, y: usize) -> Option<bool> {
        if x >= self.marker_size || y >= self.marker_size {
            return None;
        }
        let code = *self.codes.get(id as usize)?;
        Some((code >> (y * self.marker_size + x)) & 1 == 1)
    }
}
