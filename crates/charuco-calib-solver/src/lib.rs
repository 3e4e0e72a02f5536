//! Planar camera calibration.
//!
//! Given board-to-image correspondences from several views of a flat target,
//! [`calibrate_planar`] estimates the pinhole intrinsics, the OpenCV
//! 5-coefficient distortion `[k1, k2, p1, p2, k3]` and one pose per view, and
//! reports the RMS re-projection error.
//!
//! ```no_run
//! use charuco_calib_solver::{calibrate_planar, CalibrationOptions, ViewObservation};
//!
//! # fn views() -> Vec<ViewObservation> { Vec::new() }
//! let result = calibrate_planar(&views(), (1280, 720), &CalibrationOptions::default())?;
//! println!("K = {}", result.camera_matrix());
//! println!("rms = {:.3} px", result.rms);
//! # Ok::<(), charuco_calib_solver::SolverError>(())
//! ```

mod error;
mod init;
mod lm;
mod solver;
mod types;

pub use error::SolverError;
pub use solver::{calibrate_planar, CalibrationSolver, PlanarCalibrator};
pub use types::{CalibrationOptions, CalibrationResult, ViewObservation};
