use thiserror::Error;

/// Failures of [`calibrate_planar`](crate::calibrate_planar).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("no views to calibrate from")]
    NoViews,
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
    #[error("view {view}: {object} object points but {image} image points")]
    MismatchedLengths {
        view: usize,
        object: usize,
        image: usize,
    },
    #[error("view {view}: {found} point(s), at least 4 are required")]
    NotEnoughPoints { view: usize, found: usize },
    #[error("view {view}: object points are not on the z = 0 plane")]
    NonPlanarObjectPoints { view: usize },
    #[error("view {view}: homography estimation failed")]
    Homography { view: usize },
    #[error("view {view}: pose could not be recovered from its homography")]
    PoseInitialization { view: usize },
    #[error("focal length initialization is degenerate (views too close to fronto-parallel?)")]
    DegenerateInitialization,
    #[error("optimization produced a non-finite cost")]
    NonFinite,
}
