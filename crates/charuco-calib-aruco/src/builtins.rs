//! Embedded built-in dictionaries.
//!
//! Codes are the rotation-0 patterns of the standard ArUco dictionaries,
//! repacked row-major with black = 1.

#![allow(clippy::unreadable_literal)]

use crate::Dictionary;

const DICT_4X4_50_CODES: [u64; 50] = [
    0xb352, 0xa60f, 0x4b33, 0x9d66, 0x86d5, //
    0x4c61, 0x8b86, 0xb0dc, 0xa480, 0x950c, //
    0x7660, 0x1a77, 0x128f, 0x0fab, 0x9ddb, //
    0xd419, 0x9ffe, 0x40a0, 0xc651, 0xa60e, //
    0x39a8, 0x474c, 0xfadc, 0x4c64, 0x5321, //
    0xbaed, 0x03f2, 0x7727, 0xdd04, 0x12ca, //
    0x55fa, 0x818d, 0xacc7, 0x5ea3, 0xdee7, //
    0xe753, 0x7e89, 0xfeb3, 0x2536, 0xdbfb, //
    0x7557, 0x7287, 0x6815, 0x009a, 0x3b9e, //
    0x4c66, 0x70c8, 0x6349, 0xb9c0, 0xa4e8, //
];

/// `DICT_4X4_50`: 4×4 bits, 50 ids.
///
/// Some ids are a single bit apart (1/19, 16/34, 23/45), so matches must be
/// exact.
pub const DICT_4X4_50: Dictionary = Dictionary {
    name: "DICT_4X4_50",
    marker_size: 4,
    max_correction_bits: 0,
    codes: &DICT_4X4_50_CODES,
};

/// Names of all embedded dictionaries.
pub const BUILTIN_DICTIONARY_NAMES: &[&str] = &["DICT_4X4_50"];

/// Look up an embedded dictionary by name (case-insensitive).
pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {
    if name.eq_ignore_ascii_case(DICT_4X4_50.name) {
        Some(DICT_4X4_50)
    } else {
        None
    }
}
