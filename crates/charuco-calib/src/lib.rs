//! Camera intrinsic calibration from a folder of ChArUco board images.
//!
//! The run is three steps, each also available on its own:
//! 1. [`list_images`]: image files of a directory (`jpg`, `jpeg`, `png`, any case).
//! 2. [`detect_and_accumulate`]: markers and interpolated ChArUco corners per
//!    image, keeping images with at least `min_corners` (20) corners.
//! 3. [`calibrate`]: camera matrix, distortion `[k1, k2, p1, p2, k3]`, poses and
//!    RMS re-projection error.
//!
//! ```no_run
//! use charuco_calib::CalibrationConfig;
//!
//! let runner = CalibrationConfig::default().build_runner()?;
//! let report = runner.run("./etc/charuco_imgs/")?;
//! print!("{report}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The building blocks are re-exported as [`core`], [`aruco`], [`charuco`] and
//! [`solver`].

pub use charuco_calib_aruco as aruco;
pub use charuco_calib_charuco as charuco;
pub use charuco_calib_core as core;
pub use charuco_calib_solver as solver;

mod config;
mod print;
mod report;
mod runner;

pub use config::{CalibrationConfig, ConfigError, DEFAULT_IMAGES_DIR, DEFAULT_MIN_CORNERS};
pub use print::write_board_image;
pub use report::{Listing, Results, RunReport};
pub use runner::{
    calibrate, detect_and_accumulate, gray_view, has_image_extension, list_images, load_gray,
    CalibrationRunner, ImageObservation, ImageOutcome, ImageStatus, ObservationSet, RejectReason,
    RunError, IMAGE_EXTENSIONS,
};
