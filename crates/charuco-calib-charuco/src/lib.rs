//! ChArUco board model and corner interpolation.
//!
//! - [`CharucoBoard`]: OpenCV-compatible layout, marker and corner tables.
//! - [`CharucoInterpolator`]: turns decoded markers into sub-pixel ChArUco
//!   corners with board ids.
//! - [`render`]: printable board images and synthetic perspective views.
//!
//! Marker detection itself lives in `charuco-calib-aruco`.

mod board;
mod interpolate;
pub mod render;
mod subpix;

pub use board::{BoardError, CharucoBoard, CharucoBoardSpec};
pub use interpolate::{
    CharucoCorners, CharucoInterpolator, CornerInterpolator, InterpolationParams,
};
pub use render::{render_board_image, render_board_view};
