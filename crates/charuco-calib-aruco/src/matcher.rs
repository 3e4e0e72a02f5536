//! Dictionary lookup of observed codes under the four marker rotations.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub id: u32,
    /// Quarter turns `0..=3` with `observed == rotate_code_u64(dict_code, n, rotation)`.
    ///
    /// One turn moves the marker's top-left bit to the top-right (clockwise
    /// on screen), so the marker's own top-left corner is sampling corner
    /// `rotation`.
    pub rotation: u8,
    pub hamming: u8,
}

/// Brute-force matcher over all ids and rotations.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher; `max_hamming` is capped by the dictionary's correction bits.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        let rotated = dict
            .codes
            .iter()
            .map(|&code| [0u8, 1, 2, 3].map(|rot| rotate_code_u64(code, n, rot)))
            .collect();
        Self {
            dict,
            max_hamming: max_hamming.min(dict.max_correction_bits),
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Closest `(id, rotation)` within `max_hamming`; ties keep the lowest id.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;
        for (id, rots) in self.rotated.iter().enumerate() {
            for (rotation, &cand) in rots.iter().enumerate() {
                let hamming = (observed ^ cand).count_ones();
                if hamming > self.max_hamming as u32 {
                    continue;
                }
                if best.is_some_and(|b| b.hamming as u32 <= hamming) {
                    continue;
                }
                best = Some(Match {
                    id: id as u32,
                    rotation: rotation as u8,
                    hamming: hamming as u8,
                });
                if hamming == 0 {
                    return best;
                }
            }
        }
        best
    }
}

/// Rotate a row-major `n × n` code (`idx = y * n + x`) by `rot` clockwise quarter turns.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 || n == 0 {
        return code;
    }
    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let bit = (code >> (sy * n + sx)) & 1;
            out |= bit << (y * n + x);
        }
    }
    out
}
