//! Run configuration, loadable from JSON.

use crate::runner::CalibrationRunner;
use charuco_calib_aruco::ArucoDetectorParams;
use charuco_calib_charuco::{BoardError, CharucoBoard, CharucoBoardSpec, InterpolationParams};
use charuco_calib_solver::CalibrationOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Folder calibrated when no directory is given.
pub const DEFAULT_IMAGES_DIR: &str = "./etc/charuco_imgs/";

/// Images with fewer interpolated corners than this are skipped.
pub const DEFAULT_MIN_CORNERS: usize = 20;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("image_size must be non-zero, got {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Everything a calibration run needs. Missing JSON fields take defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub images_dir: PathBuf,
    pub board: CharucoBoardSpec,
    pub min_corners: usize,
    /// Expected `[width, height]`; when absent the first image decides.
    pub image_size: Option<[u32; 2]>,
    pub detector: ArucoDetectorParams,
    pub interpolation: InterpolationParams,
    pub solver: CalibrationOptions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            board: CharucoBoardSpec::default(),
            min_corners: DEFAULT_MIN_CORNERS,
            image_size: None,
            detector: ArucoDetectorParams::default(),
            interpolation: InterpolationParams::default(),
            solver: CalibrationOptions::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn build_board(&self) -> Result<CharucoBoard, BoardError> {
        CharucoBoard::new(self.board.clone())
    }

    fn validated_image_size(&self) -> Result<Option<(u32, u32)>, ConfigError> {
        match self.image_size {
            Some([width, height]) if width == 0 || height == 0 => {
                Err(ConfigError::InvalidImageSize { width, height })
            }
            Some([w, h]) => Ok(Some((w, h))),
            None => Ok(None),
        }
    }

    /// Runner with the native detector, interpolator and solver.
    pub fn build_runner(&self) -> Result<CalibrationRunner, ConfigError> {
        let board = self.build_board()?;
        Ok(CalibrationRunner::from_parts(
            board,
            &self.detector,
            self.interpolation.clone(),
            self.solver.clone(),
        )
        .with_min_corners(self.min_corners)
        .with_image_size(self.validated_image_size()?))
    }
}
