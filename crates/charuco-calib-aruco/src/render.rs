//! Marker rasterization.

use crate::Dictionary;
use charuco_calib_core::GrayImage;

/// True if cell `(cx, cy)` of the bordered marker grid is black.
///
/// The grid is `marker_size + 2 * border_bits` cells wide; border cells are
/// always black.
pub fn marker_cell_is_black(
    dict: &Dictionary,
    id: u32,
    cx: usize,
    cy: usize,
    border_bits: usize,
) -> Option<bool> {
    let cells = dict.marker_size + 2 * border_bits;
    if cx >= cells || cy >= cells {
        return None;
    }
    let inner = border_bits..cells - border_bits;
    if !inner.contains(&cx) || !inner.contains(&cy) {
        return ((id as usize) < dict.len()).then_some(true);
    }
    dict.is_black(id, cx - border_bits, cy - border_bits)
}

/// Render marker `id` with a white quiet zone of `quiet_cells` cells.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    px_per_cell: usize,
    border_bits: usize,
    quiet_cells: usize,
) -> Option<GrayImage> {
    if id as usize >= dict.len() || px_per_cell == 0 {
        return None;
    }
    let cells = dict.marker_size + 2 * border_bits;
    let side = (cells + 2 * quiet_cells) * px_per_cell;
    let mut img = GrayImage::filled(side, side, 255);
    for cy in 0..cells {
        for cx in 0..cells {
            if !marker_cell_is_black(dict, id, cx, cy, border_bits)? {
                continue;
            }
            let x0 = (cx + quiet_cells) * px_per_cell;
            let y0 = (cy + quiet_cells) * px_per_cell;
            for y in y0..y0 + px_per_cell {
                for x in x0..x0 + px_per_cell {
                    img.set(x, y, 0);
                }
            }
        }
    }
    Some(img)
}
