//! Board rasterization: printable images and synthetic camera views.

use crate::board::CharucoBoard;
use charuco_calib_aruco::marker_cell_is_black;
use charuco_calib_core::{GrayImage, PinholeCamera, Pose};
use nalgebra::{Matrix3, Point2, Vector3};

const INK: u8 = 0;
const PAPER: u8 = 255;

/// Intensities used for synthetic views.
const VIEW_DARK: f32 = 25.0;
const VIEW_LIGHT: f32 = 225.0;

/// True if the board-plane point `(x, y)` is printed black.
///
/// Points outside the board read as paper.
pub fn board_is_black(board: &CharucoBoard, x: f64, y: f64) -> bool {
    let spec = board.spec();
    let s = spec.square_length;
    let (w, h) = board.size();
    if !(0.0..w).contains(&x) || !(0.0..h).contains(&y) {
        return false;
    }
    let sx = ((x / s) as u32).min(spec.squares_x - 1);
    let sy = ((y / s) as u32).min(spec.squares_y - 1);
    if board.square_is_black(sx, sy) {
        return true;
    }
    let Some(id) = board.square_marker(sx, sy) else {
        return false;
    };

    let m = spec.marker_length;
    let u = x - sx as f64 * s - 0.5 * (s - m);
    let v = y - sy as f64 * s - 0.5 * (s - m);
    if !(0.0..m).contains(&u) || !(0.0..m).contains(&v) {
        return false;
    }
    let dict = board.dictionary();
    let cells = dict.marker_size + 2;
    let cell = m / cells as f64;
    let cx = ((u / cell) as usize).min(cells - 1);
    let cy = ((v / cell) as usize).min(cells - 1);
    marker_cell_is_black(&dict, id, cx, cy, 1).unwrap_or(false)
}

/// Printable board image at `px_per_square` with a white `margin_px` frame.
pub fn render_board_image(
    board: &CharucoBoard,
    px_per_square: usize,
    margin_px: usize,
) -> GrayImage {
    let spec = board.spec();
    let bw = spec.squares_x as usize * px_per_square;
    let bh = spec.squares_y as usize * px_per_square;
    let mut img = GrayImage::filled(bw + 2 * margin_px, bh + 2 * margin_px, PAPER);
    let scale = spec.square_length / px_per_square.max(1) as f64;
    for y in 0..bh {
        for x in 0..bw {
            let bx = (x as f64 + 0.5) * scale;
            let by = (y as f64 + 0.5) * scale;
            if board_is_black(board, bx, by) {
                img.set(x + margin_px, y + margin_px, INK);
            }
        }
    }
    img
}

/// Render the board seen by `camera` from `pose` (board to camera).
///
/// Each pixel averages `supersample²` rays through the distortion model and
/// back onto the board plane. Pixel centers sit on integer coordinates.
pub fn render_board_view(
    board: &CharucoBoard,
    camera: &PinholeCamera,
    pose: &Pose,
    width: usize,
    height: usize,
    supersample: usize,
) -> GrayImage {
    let mut img = GrayImage::filled(width, height, VIEW_LIGHT as u8);
    let r = pose.rotation_matrix();
    let plane_to_ray = Matrix3::from_columns(&[
        r.matrix().column(0).into_owned(),
        r.matrix().column(1).into_owned(),
        pose.translation,
    ]);
    let Some(ray_to_plane) = plane_to_ray.try_inverse() else {
        log::warn!("board plane passes through the camera center");
        return img;
    };

    let n = supersample.max(1);
    let step = 1.0 / n as f64;
    let weight = (VIEW_LIGHT - VIEW_DARK) / (n * n) as f32;
    for y in 0..height {
        for x in 0..width {
            let mut value = VIEW_LIGHT;
            for sy in 0..n {
                for sx in 0..n {
                    let px = Point2::new(
                        x as f64 - 0.5 + (sx as f64 + 0.5) * step,
                        y as f64 - 0.5 + (sy as f64 + 0.5) * step,
                    );
                    let ray = camera.unproject(px);
                    let q = ray_to_plane * Vector3::new(ray.x, ray.y, 1.0);
                    // the ray must hit the plane in front of the camera
                    if q.z <= 0.0 {
                        continue;
                    }
                    if board_is_black(board, q.x / q.z, q.y / q.z) {
                        value -= weight;
                    }
                }
            }
            img.set(x, y, value.round().clamp(0.0, 255.0) as u8);
        }
    }
    img
}
