//! ArUco marker dictionary and full-image marker detection.
//!
//! This crate provides:
//! - the embedded `DICT_4X4_50` dictionary,
//! - matching observed codes against it under the four rotations,
//! - a detector that finds square markers in a grayscale image
//!   (adaptive threshold, connected components, quad fit, bit decoding),
//! - marker rasterization for printing and synthetic tests.
//!
//! Detected corners are reported in the marker's own orientation
//! (TL, TR, BR, BL), which is what board-level corner interpolation needs.

pub mod builtins;
mod decode;
mod detector;
mod dictionary;
mod matcher;
mod quad;
mod render;
mod threshold;

pub use builtins::{builtin_dictionary, BUILTIN_DICTIONARY_NAMES};
pub use detector::{
    ArucoDetections, ArucoDetector, ArucoDetectorParams, MarkerDetection, MarkerDetector,
};
pub use dictionary::Dictionary;
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use render::{marker_cell_is_black, render_marker};
