use charuco_calib::charuco::{render_board_view, CharucoBoard, CharucoBoardSpec};
use charuco_calib::core::{CameraIntrinsics, Distortion, GrayImage, PinholeCamera, Pose};
use charuco_calib::{
    detect_and_accumulate, list_images, CalibrationConfig, CalibrationRunner, ImageStatus,
    RejectReason, RunError,
};
use nalgebra::{Rotation3, Vector3};
use std::fs;
use std::path::{Path, PathBuf};

fn board() -> CharucoBoard {
    CharucoBoard::new(CharucoBoardSpec::default()).expect("board")
}

fn camera() -> PinholeCamera {
    PinholeCamera::new(
        CameraIntrinsics::new(800.0, 800.0, 319.5, 239.5),
        Distortion::from_array([-0.05, 0.0, 0.0, 0.0, 0.0]),
    )
}

fn pose(board: &CharucoBoard, roll: f64, pitch: f64, yaw: f64, distance: f64) -> Pose {
    let (w, h) = board.size();
    let center = Vector3::new(0.5 * w, 0.5 * h, 0.0);
    let rot = Rotation3::from_euler_angles(roll, pitch, yaw);
    Pose::from_rotation(&rot, Vector3::new(0.0, 0.0, distance) - rot * center)
}

fn save_png(img: &GrayImage, path: &Path) {
    image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .expect("buffer")
        .save(path)
        .expect("save png");
}

fn render_view(board: &CharucoBoard, pose: &Pose) -> GrayImage {
    render_board_view(board, &camera(), pose, 640, 480, 2)
}

#[test]
fn listing_matches_extensions_case_insensitively() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in ["b.JPG", "a.png", "c.Jpeg", "d.txt", "e.jpgx", "notes", "f.PNG"] {
        fs::write(dir.path().join(name), b"x").expect("write");
    }
    fs::create_dir(dir.path().join("g.png")).expect("mkdir");

    let names: Vec<String> = list_images(dir.path())
        .expect("list")
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(str::to_owned))
        .collect();
    assert_eq!(names, ["a.png", "b.JPG", "c.Jpeg", "f.PNG"]);
}

#[test]
fn non_image_folder_lists_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("readme.md"), b"#").expect("write");
    fs::write(dir.path().join("data.bin"), [0u8; 8]).expect("write");
    assert!(list_images(dir.path()).expect("list").is_empty());
}

#[test]
fn missing_folder_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope");
    assert!(matches!(
        list_images(&missing),
        Err(RunError::MissingDirectory { .. })
    ));
}

#[test]
fn empty_folder_reports_no_images() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = CalibrationRunner::new(board());
    let report = runner.run(dir.path()).expect("run");
    assert_eq!(report.images_listed, 0);
    assert!(report.calibration.is_none());
    assert_eq!(report.to_string(), "No images found in the folder.\n");
}

#[test]
fn listing_callback_runs_before_a_failing_accumulation() {
    let dir = tempfile::tempdir().expect("tempdir");
    save_png(&GrayImage::filled(640, 480, 200), &dir.path().join("blank.png"));

    let mut listed = None;
    let result = CalibrationRunner::new(board()).run_with(dir.path(), |report| {
        listed = Some(report.listing().to_string());
    });
    assert!(matches!(result, Err(RunError::NoAcceptedImages { listed: 1 })));
    assert_eq!(listed.as_deref(), Some("Number of images read: 1\n"));
}

#[test]
fn full_board_image_is_accepted() {
    let board = board();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("view.png");
    save_png(&render_view(&board, &pose(&board, 0.2, -0.1, 0.05, 0.65)), &path);

    let set = detect_and_accumulate(&[path.clone()], &board).expect("accumulate");
    assert_eq!(set.len(), 1);
    assert_eq!(set.image_size, Some((640, 480)));
    assert_eq!(set.observations[0].corners.len(), 48);
    assert_eq!(set.outcomes[0].path, path);
    assert_eq!(set.outcomes[0].status, ImageStatus::Accepted { corners: 48 });
}

#[test]
fn sparse_image_is_rejected() {
    let board = board();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut img = render_view(&board, &pose(&board, 0.0, 0.0, 0.0, 0.65));
    for y in 0..img.height {
        for x in 200..img.width {
            img.set(x, y, 225);
        }
    }
    let sparse = dir.path().join("a_sparse.png");
    let full = dir.path().join("b_full.png");
    save_png(&img, &sparse);
    save_png(&render_view(&board, &pose(&board, 0.1, 0.2, 0.0, 0.65)), &full);

    let set = detect_and_accumulate(&[sparse.clone(), full.clone()], &board).expect("accumulate");
    assert_eq!(set.len(), 1);
    assert_eq!(set.observations[0].path, full);
    match set.outcomes[0].status {
        ImageStatus::Rejected(RejectReason::TooFewCorners { found, required }) => {
            assert!(found < 20);
            assert_eq!(required, 20);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    // a lower threshold keeps it
    let runner = CalibrationRunner::new(board.clone()).with_min_corners(1);
    let set = runner.detect_and_accumulate(&[sparse]).expect("accumulate");
    assert_eq!(set.len(), 1);
}

#[test]
fn mismatched_size_is_rejected() {
    let board = board();
    let dir = tempfile::tempdir().expect("tempdir");
    let first = dir.path().join("a.png");
    let second = dir.path().join("b.png");
    save_png(&render_view(&board, &pose(&board, 0.2, 0.0, 0.0, 0.65)), &first);
    save_png(&GrayImage::filled(320, 240, 200), &second);

    let set = detect_and_accumulate(&[first, second], &board).expect("accumulate");
    assert_eq!(set.len(), 1);
    assert_eq!(
        set.outcomes[1].status,
        ImageStatus::Rejected(RejectReason::SizeMismatch {
            expected: (640, 480),
            found: (320, 240),
        })
    );

    // a configured size wins over the first image
    let runner = CalibrationRunner::new(board.clone()).with_image_size(Some((320, 240)));
    let set = runner
        .detect_and_accumulate(&[dir.path().join("a.png")])
        .expect("accumulate");
    assert!(set.is_empty());
    assert!(matches!(
        set.outcomes[0].status,
        ImageStatus::Rejected(RejectReason::SizeMismatch { .. })
    ));
}

#[test]
fn undecodable_image_aborts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.png");
    fs::write(&path, b"definitely not a png").expect("write");
    assert!(matches!(
        detect_and_accumulate(&[path], &board()),
        Err(RunError::Image { .. })
    ));
}

fn write_dataset(board: &CharucoBoard, dir: &Path) -> Vec<PathBuf> {
    let views = [
        (0.35, 0.05, 0.0, 0.62),
        (-0.30, 0.10, 0.15, 0.66),
        (0.05, 0.40, -0.10, 0.64),
        (0.10, -0.35, 0.25, 0.60),
        (-0.25, -0.25, -0.20, 0.70),
        (0.20, 0.30, 3.14, 0.68),
    ];
    views
        .iter()
        .enumerate()
        .map(|(i, &(r, p, y, d))| {
            let path = dir.join(format!("view_{i:02}.png"));
            save_png(&render_view(board, &pose(board, r, p, y, d)), &path);
            path
        })
        .collect()
}

#[test]
fn synthetic_dataset_recovers_camera() {
    let board = board();
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("notes.txt"), b"ignored").expect("write");
    write_dataset(&board, dir.path());

    let config = CalibrationConfig {
        images_dir: dir.path().to_path_buf(),
        ..CalibrationConfig::default()
    };
    let report = config
        .build_runner()
        .expect("runner")
        .run(&config.images_dir)
        .expect("run");

    assert_eq!(report.images_listed, 6);
    assert_eq!(report.accepted(), 6);
    let cal = report.calibration.as_ref().expect("calibrated");
    assert!(cal.rms < 0.3, "rms {}", cal.rms);
    let k = cal.intrinsics;
    assert!((k.fx - 800.0).abs() < 12.0, "fx {}", k.fx);
    assert!((k.fy - 800.0).abs() < 12.0, "fy {}", k.fy);
    assert!((k.cx - 319.5).abs() < 8.0, "cx {}", k.cx);
    assert!((k.cy - 239.5).abs() < 8.0, "cy {}", k.cy);
    assert!((cal.distortion.k1 + 0.05).abs() < 0.05, "k1 {}", cal.distortion.k1);

    let text = report.to_string();
    assert!(text.starts_with("Number of images read: 6\n"));
    assert!(text.contains("Calibration Matrix:"));

    let json_path = dir.path().join("report.json");
    report.write_json(&json_path).expect("json");
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).expect("read")).expect("parse");
    assert_eq!(value["outcomes"].as_array().map(Vec::len), Some(6));
    assert_eq!(value["calibration"]["poses"].as_array().map(Vec::len), Some(6));
}
