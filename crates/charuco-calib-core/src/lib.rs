//! Core types and utilities for ChArUco camera calibration.
//!
//! This crate is small and purely geometric: grayscale image views with
//! bilinear sampling, planar homographies, and the pinhole camera model with
//! OpenCV-style radial/tangential distortion. It does not depend on any image
//! decoding library.

mod camera;
mod homography;
mod image;
mod logger;

pub use camera::{CameraIntrinsics, Distortion, PinholeCamera, Pose};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{sample_bilinear, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
