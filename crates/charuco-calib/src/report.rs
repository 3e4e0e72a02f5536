use crate::runner::{ImageOutcome, ImageStatus, RunError};
use charuco_calib_solver::CalibrationResult;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Summary of one calibration run.
///
/// `Display` prints the console block: image count, then the camera matrix,
/// distortion coefficients and RMS re-projection error.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub images_dir: PathBuf,
    pub images_listed: usize,
    pub image_size: Option<(u32, u32)>,
    pub outcomes: Vec<ImageOutcome>,
    pub calibration: Option<CalibrationResult>,
}

impl RunReport {
    pub fn new(images_dir: &Path, images_listed: usize) -> Self {
        Self {
            images_dir: images_dir.to_path_buf(),
            images_listed,
            image_size: None,
            outcomes: Vec::new(),
            calibration: None,
        }
    }

    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ImageStatus::Accepted { .. }))
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RunError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).map_err(RunError::Serialize)?;
        std::fs::write(path, text).map_err(|source| RunError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &[f64]) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in row.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{v:.8e}")?;
    }
    write!(f, "]")
}

/// Console lines written right after listing. See [`RunReport::listing`].
pub struct Listing<'a>(&'a RunReport);

/// Console block written after calibration. See [`RunReport::results`].
pub struct Results<'a>(&'a RunReport);

impl RunReport {
    /// Image count, or the empty-folder message.
    pub fn listing(&self) -> Listing<'_> {
        Listing(self)
    }

    /// Used/skipped counts and the calibration result, when present.
    pub fn results(&self) -> Results<'_> {
        Results(self)
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.images_listed {
            0 => writeln!(f, "No images found in the folder."),
            n => writeln!(f, "Number of images read: {n}"),
        }
    }
}

impl fmt::Display for Results<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        if !report.outcomes.is_empty() {
            writeln!(
                f,
                "Images used: {} (skipped: {})",
                report.accepted(),
                report.rejected()
            )?;
        }
        let Some(cal) = &report.calibration else {
            return Ok(());
        };

        writeln!(f)?;
        writeln!(f, "Calibration Results:")?;
        writeln!(f, "---------------------")?;
        writeln!(f, "Calibration Matrix:")?;
        let k = cal.camera_matrix();
        for r in 0..3 {
            write!(f, "{}", if r == 0 { "[" } else { " " })?;
            write_row(f, &[k[(r, 0)], k[(r, 1)], k[(r, 2)]])?;
            writeln!(f, "{}", if r == 2 { "]" } else { "" })?;
        }
        writeln!(f)?;
        writeln!(f, "Radial Distortion Coefficients:")?;
        write!(f, "[")?;
        write_row(f, &cal.distortion.to_array())?;
        writeln!(f, "]")?;
        writeln!(f)?;
        writeln!(f, "Return Value:")?;
        writeln!(f, "{}", cal.rms)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.listing(), self.results())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RejectReason;
    use charuco_calib_core::{CameraIntrinsics, Distortion};

    fn result() -> CalibrationResult {
        CalibrationResult {
            intrinsics: CameraIntrinsics::new(800.0, 790.0, 320.0, 240.0),
            distortion: Distortion::from_array([-0.1, 0.01, 0.0, 0.0, 0.0]),
            poses: Vec::new(),
            per_view_rms: Vec::new(),
            rms: 0.25,
            iterations: 12,
            converged: true,
        }
    }

    #[test]
    fn empty_folder_message() {
        let report = RunReport::new(Path::new("imgs"), 0);
        assert_eq!(report.to_string(), "No images found in the folder.\n");
    }

    #[test]
    fn listing_and_results_split_the_block() {
        let report = RunReport::new(Path::new("imgs"), 2);
        assert_eq!(report.listing().to_string(), "Number of images read: 2\n");
        assert_eq!(report.results().to_string(), "");

        let empty = RunReport::new(Path::new("imgs"), 0);
        assert_eq!(empty.results().to_string(), "");
        assert_eq!(empty.listing().to_string(), empty.to_string());
    }

    #[test]
    fn result_block_layout() {
        let mut report = RunReport::new(Path::new("imgs"), 3);
        report.outcomes = vec![
            ImageOutcome {
                path: "a.png".into(),
                status: ImageStatus::Accepted { corners: 48 },
            },
            ImageOutcome {
                path: "b.png".into(),
                status: ImageStatus::Rejected(RejectReason::TooFewCorners {
                    found: 4,
                    required: 20,
                }),
            },
        ];
        report.calibration = Some(result());

        let text = report.to_string();
        assert_eq!(text, format!("{}{}", report.listing(), report.results()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Number of images read: 3");
        assert_eq!(lines[1], "Images used: 1 (skipped: 1)");
        assert!(lines.contains(&"Calibration Matrix:"));
        assert!(lines.contains(&"Radial Distortion Coefficients:"));
        assert_eq!(lines[lines.len() - 2], "Return Value:");
        assert_eq!(lines[lines.len() - 1], "0.25");
        assert!(text.contains("[[8.00000000e2 0.00000000e0 3.20000000e2]"));
        assert!(text.contains(" [0.00000000e0 0.00000000e0 1.00000000e0]]"));
    }

    #[test]
    fn json_report_has_outcomes_and_result() {
        let mut report = RunReport::new(Path::new("imgs"), 1);
        report.outcomes = vec![ImageOutcome {
            path: "a.png".into(),
            status: ImageStatus::Rejected(RejectReason::SizeMismatch {
                expected: (640, 480),
                found: (320, 240),
            }),
        }];
        report.calibration = Some(result());

        let value = serde_json::to_value(&report).expect("json");
        assert_eq!(value["images_listed"], 1);
        assert_eq!(value["outcomes"][0]["status"]["status"], "rejected");
        assert_eq!(value["outcomes"][0]["status"]["reason"], "size_mismatch");
        assert_eq!(value["calibration"]["rms"], 0.25);
    }
}
