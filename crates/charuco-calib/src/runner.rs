//! The calibration run: list images, collect corners, solve.

use crate::config::{ConfigError, DEFAULT_MIN_CORNERS};
use crate::report::RunReport;
use charuco_calib_aruco::{ArucoDetector, ArucoDetectorParams, MarkerDetector};
use charuco_calib_charuco::{
    CharucoBoard, CharucoCorners, CharucoInterpolator, CornerInterpolator, InterpolationParams,
};
use charuco_calib_core::GrayImageView;
use charuco_calib_solver::{
    calibrate_planar, CalibrationOptions, CalibrationResult, CalibrationSolver, PlanarCalibrator,
    SolverError, ViewObservation,
};
use image::ImageReader;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Accepted file extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("image directory {path} does not exist or is not a directory")]
    MissingDirectory { path: PathBuf },
    #[error("failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("none of the {listed} image(s) passed the corner threshold")]
    NoAcceptedImages { listed: usize },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("calibration failed: {0}")]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// True if `path` ends in one of [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// Regular files in `dir` with an image extension, sorted by path.
///
/// An existing directory without matches gives an empty list.
pub fn list_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, RunError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(RunError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    let read_err = |source| RunError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Convert an `image::GrayImage` into the core view type.
pub fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode an image file (format sniffed from its content) to 8-bit gray.
pub fn load_gray(path: &Path) -> Result<image::GrayImage, RunError> {
    let decode = || -> Result<image::DynamicImage, image::ImageError> {
        ImageReader::open(path)?.with_guessed_format()?.decode()
    };
    decode()
        .map(|img| img.to_luma8())
        .map_err(|source| RunError::Image {
            path: path.to_path_buf(),
            source,
        })
}

/// Corners found in one accepted image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageObservation {
    pub path: PathBuf,
    pub image_size: (u32, u32),
    pub corners: CharucoCorners,
}

impl ImageObservation {
    /// Pair each corner with its board point.
    pub fn view(&self, board: &CharucoBoard) -> ViewObservation {
        let (object_points, image_points) = self
            .corners
            .iter()
            .filter_map(|(id, p)| {
                let obj = board.corner_object_point(id)?;
                Some((obj, Point2::new(p.x as f64, p.y as f64)))
            })
            .unzip();
        ViewObservation::new(object_points, image_points)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    TooFewCorners { found: usize, required: usize },
    SizeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewCorners { found, required } => {
                write!(f, "{found} corner(s), {required} required")
            }
            Self::SizeMismatch { expected, found } => write!(
                f,
                "size {}x{} differs from {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageStatus {
    Accepted { corners: usize },
    Rejected(RejectReason),
}

/// What happened to one listed image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOutcome {
    pub path: PathBuf,
    pub status: ImageStatus,
}

/// Accepted observations in processing order plus one outcome per image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    /// Canonical image size, fixed by the configuration or the first image.
    pub image_size: Option<(u32, u32)>,
    pub observations: Vec<ImageObservation>,
    pub outcomes: Vec<ImageOutcome>,
}

impl ObservationSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&Path, RejectReason)> + '_ {
        self.outcomes.iter().filter_map(|o| match o.status {
            ImageStatus::Rejected(reason) => Some((o.path.as_path(), reason)),
            ImageStatus::Accepted { .. } => None,
        })
    }

    pub fn views(&self, board: &CharucoBoard) -> Vec<ViewObservation> {
        self.observations.iter().map(|o| o.view(board)).collect()
    }
}

/// Board plus the detector, interpolator and solver used for a run.
#[derive(Clone, Debug)]
pub struct CalibrationRunner<
    D = ArucoDetector,
    I = CharucoInterpolator,
    S = PlanarCalibrator,
> {
    board: CharucoBoard,
    detector: D,
    interpolator: I,
    solver: S,
    min_corners: usize,
    image_size: Option<(u32, u32)>,
}

impl CalibrationRunner {
    /// Native components with default settings.
    pub fn new(board: CharucoBoard) -> Self {
        Self::from_parts(
            board,
            &ArucoDetectorParams::default(),
            InterpolationParams::default(),
            CalibrationOptions::default(),
        )
    }

    pub fn from_parts(
        board: CharucoBoard,
        detector: &ArucoDetectorParams,
        interpolation: InterpolationParams,
        solver: CalibrationOptions,
    ) -> Self {
        let detector = ArucoDetector::new(board.dictionary(), detector.clone());
        Self::with_components(
            board,
            detector,
            CharucoInterpolator::new(interpolation),
            PlanarCalibrator::new(solver),
        )
    }
}

impl<D, I, S> CalibrationRunner<D, I, S>
where
    D: MarkerDetector,
    I: CornerInterpolator,
    S: CalibrationSolver,
{
    pub fn with_components(board: CharucoBoard, detector: D, interpolator: I, solver: S) -> Self {
        Self {
            board,
            detector,
            interpolator,
            solver,
            min_corners: DEFAULT_MIN_CORNERS,
            image_size: None,
        }
    }

    pub fn with_min_corners(mut self, min_corners: usize) -> Self {
        self.min_corners = min_corners;
        self
    }

    /// Fix the canonical image size instead of taking the first image's.
    pub fn with_image_size(mut self, image_size: Option<(u32, u32)>) -> Self {
        self.image_size = image_size;
        self
    }

    #[inline]
    pub fn board(&self) -> &CharucoBoard {
        &self.board
    }

    #[inline]
    pub fn min_corners(&self) -> usize {
        self.min_corners
    }

    /// Markers, then interpolated board corners, for one grayscale image.
    pub fn detect_image(&self, image: &GrayImageView<'_>) -> CharucoCorners {
        let markers = self.detector.detect_markers(image);
        log::debug!(
            "{} marker(s), {} rejected candidate(s)",
            markers.markers.len(),
            markers.rejected.len()
        );
        self.interpolator
            .interpolate(&markers.markers, image, &self.board)
    }

    /// Load every image in order and keep those with enough corners.
    ///
    /// Images whose size differs from the canonical one are skipped; any
    /// image that fails to load aborts the run.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(images = paths.len()))
    )]
    pub fn detect_and_accumulate(&self, paths: &[PathBuf]) -> Result<ObservationSet, RunError> {
        let mut set = ObservationSet {
            image_size: self.image_size,
            ..ObservationSet::default()
        };

        for path in paths {
            let img = load_gray(path)?;
            let size = (img.width(), img.height());
            let canonical = *set.image_size.get_or_insert(size);

            let status = if size != canonical {
                ImageStatus::Rejected(RejectReason::SizeMismatch {
                    expected: canonical,
                    found: size,
                })
            } else {
                let corners = self.detect_image(&gray_view(&img));
                let found = corners.len();
                if found < self.min_corners {
                    ImageStatus::Rejected(RejectReason::TooFewCorners {
                        found,
                        required: self.min_corners,
                    })
                } else {
                    set.observations.push(ImageObservation {
                        path: path.clone(),
                        image_size: size,
                        corners,
                    });
                    ImageStatus::Accepted { corners: found }
                }
            };

            match status {
                ImageStatus::Accepted { corners } => {
                    log::info!("{}: {corners} corner(s)", path.display())
                }
                ImageStatus::Rejected(reason) => {
                    log::warn!("{}: skipped, {reason}", path.display())
                }
            }
            set.outcomes.push(ImageOutcome {
                path: path.clone(),
                status,
            });
        }

        log::info!(
            "accepted {} of {} image(s)",
            set.observations.len(),
            paths.len()
        );
        Ok(set)
    }

    /// Solve for the camera model from the accepted observations.
    pub fn calibrate(&self, set: &ObservationSet) -> Result<CalibrationResult, RunError> {
        let no_views = || RunError::NoAcceptedImages {
            listed: set.outcomes.len(),
        };
        if set.is_empty() {
            return Err(no_views());
        }
        let image_size = set.image_size.ok_or_else(no_views)?;
        Ok(self.solver.calibrate(&set.views(&self.board), image_size)?)
    }

    /// List, accumulate and calibrate.
    ///
    /// An empty listing is not an error: the report just has no result.
    pub fn run(&self, dir: impl AsRef<Path>) -> Result<RunReport, RunError> {
        self.run_with(dir, |_| {})
    }

    /// [`run`](Self::run), calling `on_listed` with the freshly listed report
    /// before any image is loaded.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(dir = %dir.as_ref().display()))
    )]
    pub fn run_with(
        &self,
        dir: impl AsRef<Path>,
        on_listed: impl FnOnce(&RunReport),
    ) -> Result<RunReport, RunError> {
        let dir = dir.as_ref();
        let paths = list_images(dir)?;
        log::info!("{} image(s) in {}", paths.len(), dir.display());
        let mut report = RunReport::new(dir, paths.len());
        on_listed(&report);
        if paths.is_empty() {
            return Ok(report);
        }

        let set = self.detect_and_accumulate(&paths)?;
        let result = self.calibrate(&set)?;
        report.image_size = set.image_size;
        report.outcomes = set.outcomes;
        report.calibration = Some(result);
        Ok(report)
    }
}

/// [`CalibrationRunner::detect_and_accumulate`] with default components.
pub fn detect_and_accumulate(
    paths: &[PathBuf],
    board: &CharucoBoard,
) -> Result<ObservationSet, RunError> {
    CalibrationRunner::new(board.clone()).detect_and_accumulate(paths)
}

/// Calibrate `set` with default solver options.
pub fn calibrate(
    set: &ObservationSet,
    board: &CharucoBoard,
    image_size: (u32, u32),
) -> Result<CalibrationResult, RunError> {
    if set.is_empty() {
        return Err(RunError::NoAcceptedImages {
            listed: set.outcomes.len(),
        });
    }
    Ok(calibrate_planar(
        &set.views(board),
        image_size,
        &CalibrationOptions::default(),
    )?)
}
