//! Printable board output.

use crate::runner::RunError;
use charuco_calib_charuco::{render_board_image, CharucoBoard};
use std::path::Path;

/// Render `board` at `px_per_square` with a white margin and save it.
///
/// The format follows the file extension (PNG recommended).
pub fn write_board_image(
    board: &CharucoBoard,
    px_per_square: usize,
    margin_px: usize,
    path: impl AsRef<Path>,
) -> Result<(u32, u32), RunError> {
    let path = path.as_ref();
    let img = render_board_image(board, px_per_square, margin_px);
    let (w, h) = (img.width as u32, img.height as u32);
    let out = image::GrayImage::from_raw(w, h, img.data).ok_or_else(|| RunError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, "board image buffer"),
    })?;
    out.save(path).map_err(|source| RunError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("wrote {w}x{h} board image to {}", path.display());
    Ok((w, h))
}
