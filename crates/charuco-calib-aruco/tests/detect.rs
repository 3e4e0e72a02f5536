use charuco_calib_aruco::{
    builtins::DICT_4X4_50, render_marker, ArucoDetector, ArucoDetectorParams, MarkerDetector,
};
use charuco_calib_core::GrayImage;
use nalgebra::Point2;

fn paste(canvas: &mut GrayImage, patch: &GrayImage, ox: usize, oy: usize) {
    for y in 0..patch.height {
        for x in 0..patch.width {
            canvas.set(ox + x, oy + y, patch.data[y * patch.width + x]);
        }
    }
}

/// Quarter turn clockwise on screen.
fn rotate_cw(img: &GrayImage) -> GrayImage {
    let n = img.width;
    let mut out = GrayImage::filled(n, n, 0);
    for y in 0..n {
        for x in 0..n {
            out.set(x, y, img.data[(n - 1 - x) * n + y]);
        }
    }
    out
}

fn assert_near(p: Point2<f32>, x: f32, y: f32) {
    assert!(
        (p.x - x).abs() < 0.6 && (p.y - y).abs() < 0.6,
        "corner ({:.2}, {:.2}) expected near ({x}, {y})",
        p.x,
        p.y
    );
}

#[test]
fn detects_upright_and_rotated_markers() {
    let mut canvas = GrayImage::filled(220, 160, 255);
    let upright = render_marker(&DICT_4X4_50, 7, 8, 1, 0).expect("marker 7");
    let turned = rotate_cw(&render_marker(&DICT_4X4_50, 21, 8, 1, 0).expect("marker 21"));
    paste(&mut canvas, &upright, 30, 40);
    paste(&mut canvas, &turned, 130, 60);

    let detector = ArucoDetector::new(DICT_4X4_50, ArucoDetectorParams::default());
    let out = detector.detect_markers(&canvas.view());
    let ids: Vec<u32> = out.markers.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![7, 21], "rejected quads: {}", out.rejected.len());

    let m7 = &out.markers[0];
    assert_near(m7.corners[0], 29.5, 39.5);
    assert_near(m7.corners[1], 77.5, 39.5);
    assert_near(m7.corners[2], 77.5, 87.5);
    assert_near(m7.corners[3], 29.5, 87.5);

    // the marker's own top-left now sits at the screen top-right
    let m21 = &out.markers[1];
    assert_near(m21.corners[0], 177.5, 59.5);
    assert_near(m21.corners[1], 177.5, 107.5);
    assert_near(m21.corners[2], 129.5, 107.5);
    assert_near(m21.corners[3], 129.5, 59.5);
    assert_eq!(m21.hamming, 0);
}

#[test]
fn plain_black_square_is_rejected_not_decoded() {
    let mut canvas = GrayImage::filled(120, 120, 255);
    for y in 30..78 {
        for x in 30..78 {
            canvas.set(x, y, 0);
        }
    }
    let detector = ArucoDetector::new(DICT_4X4_50, ArucoDetectorParams::default());
    let out = detector.detect(&canvas.view());
    assert!(out.markers.is_empty());
    assert_eq!(out.rejected.len(), 1);
}
