//! Board specification and layout helpers for ChArUco.

use charuco_calib_aruco::{builtin_dictionary, Dictionary, BUILTIN_DICTIONARY_NAMES};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Physical ChArUco board description.
///
/// `squares_x`/`squares_y` are **square counts** (not inner corner counts);
/// lengths share whatever unit the calibration should report translations in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharucoBoardSpec {
    pub squares_x: u32,
    pub squares_y: u32,
    pub square_length: f64,
    pub marker_length: f64,
    pub dictionary: String,
}

impl Default for CharucoBoardSpec {
    fn default() -> Self {
        Self {
            squares_x: 9,
            squares_y: 7,
            square_length: 0.045,
            marker_length: 0.035,
            dictionary: "DICT_4X4_50".to_string(),
        }
    }
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("board needs at least 2x2 squares, got {squares_x}x{squares_y}")]
    InvalidSize { squares_x: u32, squares_y: u32 },
    #[error("square_length must be > 0, got {0}")]
    InvalidSquareLength(f64),
    #[error("marker_length must be in (0, square_length={square}), got {marker}")]
    InvalidMarkerLength { marker: f64, square: f64 },
    #[error("board of {squares_x}x{squares_y} squares is too large")]
    TooManySquares { squares_x: u32, squares_y: u32 },
    #[error(
        "unknown marker dictionary {0:?}, available: {known}",
        known = BUILTIN_DICTIONARY_NAMES.join(", ")
    )]
    UnknownDictionary(String),
    #[error("board needs {needed} markers, dictionary has {available}")]
    NotEnoughDictionaryCodes { needed: usize, available: usize },
}

/// Validated board with precomputed marker and corner tables.
///
/// Layout follows OpenCV: the top-left square is black, markers sit on the
/// white squares (`(x + y)` odd) and get ids row-major. ChArUco corner ids run
/// row-major over the inner corners.
#[derive(Clone, Debug)]
pub struct CharucoBoard {
    spec: CharucoBoardSpec,
    dictionary: Dictionary,
    marker_squares: Vec<[u32; 2]>,
    /// Marker id per square, row-major over all squares.
    square_markers: Vec<Option<u32>>,
    /// Marker ids touching each inner corner.
    corner_markers: Vec<Vec<u32>>,
}

impl CharucoBoard {
    pub fn new(spec: CharucoBoardSpec) -> Result<Self, BoardError> {
        let (sx, sy) = (spec.squares_x, spec.squares_y);
        if sx < 2 || sy < 2 {
            return Err(BoardError::InvalidSize {
                squares_x: sx,
                squares_y: sy,
            });
        }
        if !spec.square_length.is_finite() || spec.square_length <= 0.0 {
            return Err(BoardError::InvalidSquareLength(spec.square_length));
        }
        if !spec.marker_length.is_finite()
            || spec.marker_length <= 0.0
            || spec.marker_length >= spec.square_length
        {
            return Err(BoardError::InvalidMarkerLength {
                marker: spec.marker_length,
                square: spec.square_length,
            });
        }
        let dictionary = builtin_dictionary(&spec.dictionary)
            .ok_or_else(|| BoardError::UnknownDictionary(spec.dictionary.clone()))?;

        let (cols, rows) = (sx as usize, sy as usize);
        let squares = cols
            .checked_mul(rows)
            .ok_or(BoardError::TooManySquares {
                squares_x: sx,
                squares_y: sy,
            })?;
        // markers sit on every other square
        let needed = squares / 2;
        if dictionary.len() < needed {
            return Err(BoardError::NotEnoughDictionaryCodes {
                needed,
                available: dictionary.len(),
            });
        }

        let mut marker_squares = Vec::with_capacity(needed);
        let mut square_markers = vec![None; squares];
        for y in 0..rows {
            for x in 0..cols {
                if (x + y) % 2 == 1 {
                    square_markers[y * cols + x] = Some(marker_squares.len() as u32);
                    marker_squares.push([x as u32, y as u32]);
                }
            }
        }

        let mut corner_markers = Vec::with_capacity((cols - 1) * (rows - 1));
        for j in 1..rows {
            for i in 1..cols {
                let touching = [(i - 1, j - 1), (i, j - 1), (i - 1, j), (i, j)]
                    .into_iter()
                    .filter_map(|(x, y)| square_markers[y * cols + x])
                    .collect();
                corner_markers.push(touching);
            }
        }

        Ok(Self {
            spec,
            dictionary,
            marker_squares,
            square_markers,
            corner_markers,
        })
    }

    #[inline]
    pub fn spec(&self) -> &CharucoBoardSpec {
        &self.spec
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dictionary
    }

    #[inline]
    pub fn marker_count(&self) -> usize {
        self.marker_squares.len()
    }

    /// Number of inner chessboard corners, i.e. ChArUco corner ids.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.corner_markers.len()
    }

    /// Physical board extent `(width, height)`.
    pub fn size(&self) -> (f64, f64) {
        let s = self.spec.square_length;
        (self.spec.squares_x as f64 * s, self.spec.squares_y as f64 * s)
    }

    /// True for black chessboard squares.
    #[inline]
    pub fn square_is_black(&self, x: u32, y: u32) -> bool {
        (x + y) % 2 == 0
    }

    /// Square `(x, y)` holding marker `id`.
    pub fn marker_square(&self, id: u32) -> Option<[u32; 2]> {
        self.marker_squares.get(id as usize).copied()
    }

    /// Marker id printed on square `(x, y)`, if any.
    pub fn square_marker(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.spec.squares_x || y >= self.spec.squares_y {
            return None;
        }
        self.square_markers[(y * self.spec.squares_x + x) as usize]
    }

    /// Board-plane corners TL, TR, BR, BL of marker `id`.
    pub fn marker_object_corners(&self, id: u32) -> Option<[Point2<f64>; 4]> {
        let [x, y] = self.marker_square(id)?;
        let s = self.spec.square_length;
        let m = self.spec.marker_length;
        let x0 = x as f64 * s + 0.5 * (s - m);
        let y0 = y as f64 * s + 0.5 * (s - m);
        Some([
            Point2::new(x0, y0),
            Point2::new(x0 + m, y0),
            Point2::new(x0 + m, y0 + m),
            Point2::new(x0, y0 + m),
        ])
    }

    /// ChArUco corner id for board intersection `(i, j)`; `None` on the outline.
    pub fn corner_id(&self, i: u32, j: u32) -> Option<u32> {
        let (sx, sy) = (self.spec.squares_x, self.spec.squares_y);
        if i == 0 || j == 0 || i >= sx || j >= sy {
            return None;
        }
        Some((j - 1) * (sx - 1) + (i - 1))
    }

    /// Board-plane position of ChArUco corner `id`.
    pub fn corner_object_xy(&self, id: u32) -> Option<Point2<f64>> {
        if id as usize >= self.corner_count() {
            return None;
        }
        let inner_x = self.spec.squares_x - 1;
        let i = (id % inner_x + 1) as f64;
        let j = (id / inner_x + 1) as f64;
        let s = self.spec.square_length;
        Some(Point2::new(i * s, j * s))
    }

    /// [`Self::corner_object_xy`] lifted to the `z = 0` plane.
    pub fn corner_object_point(&self, id: u32) -> Option<Point3<f64>> {
        self.corner_object_xy(id).map(|p| Point3::new(p.x, p.y, 0.0))
    }

    /// Marker ids whose squares touch ChArUco corner `id`.
    pub fn corner_markers(&self, id: u32) -> &[u32] {
        self.corner_markers
            .get(id as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_board() -> CharucoBoard {
        CharucoBoard::new(CharucoBoardSpec::default()).expect("board")
    }

    #[test]
    fn default_board_counts() {
        let board = default_board();
        assert_eq!(board.corner_count(), 48);
        assert_eq!(board.marker_count(), 31);
        let (w, h) = board.size();
        assert!((w - 0.405).abs() < 1e-12 && (h - 0.315).abs() < 1e-12);
    }

    #[test]
    fn markers_fill_white_squares_row_major() {
        let board = default_board();
        assert_eq!(board.marker_square(0), Some([1, 0]));
        assert_eq!(board.marker_square(4), Some([0, 1]));
        assert_eq!(board.square_marker(2, 1), Some(5));
        assert_eq!(board.square_marker(0, 0), None);
        assert!(board.square_is_black(0, 0));
        assert_eq!(board.marker_square(31), None);
    }

    #[test]
    fn marker_is_centered_in_its_square() {
        let board = default_board();
        let c = board.marker_object_corners(0).expect("marker 0");
        assert!((c[0].x - 0.050).abs() < 1e-12);
        assert!((c[0].y - 0.005).abs() < 1e-12);
        assert!((c[2].x - 0.085).abs() < 1e-12);
        assert!((c[2].y - 0.040).abs() < 1e-12);
    }

    #[test]
    fn corner_ids_and_positions() {
        let board = default_board();
        assert_eq!(board.corner_id(1, 1), Some(0));
        assert_eq!(board.corner_id(8, 6), Some(47));
        assert_eq!(board.corner_id(0, 3), None);
        assert_eq!(board.corner_id(9, 3), None);
        let p = board.corner_object_xy(9).expect("corner 9");
        assert!((p.x - 0.090).abs() < 1e-12 && (p.y - 0.090).abs() < 1e-12);
        assert!(board.corner_object_xy(48).is_none());
    }

    #[test]
    fn every_inner_corner_touches_two_markers() {
        let board = default_board();
        for id in 0..board.corner_count() as u32 {
            assert_eq!(board.corner_markers(id).len(), 2, "corner {id}");
        }
        // corner (1, 1) sits between squares (1, 0) and (0, 1)
        assert_eq!(board.corner_markers(0), &[0, 4]);
        assert!(board.corner_markers(99).is_empty());
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let bad_size = CharucoBoardSpec {
            squares_x: 1,
            ..CharucoBoardSpec::default()
        };
        assert!(matches!(
            CharucoBoard::new(bad_size),
            Err(BoardError::InvalidSize { .. })
        ));

        let big_marker = CharucoBoardSpec {
            marker_length: 0.05,
            ..CharucoBoardSpec::default()
        };
        assert!(matches!(
            CharucoBoard::new(big_marker),
            Err(BoardError::InvalidMarkerLength { .. })
        ));

        let unknown = CharucoBoardSpec {
            dictionary: "DICT_5X5_100".into(),
            ..CharucoBoardSpec::default()
        };
        let err = CharucoBoard::new(unknown).err();
        assert_eq!(
            err,
            Some(BoardError::UnknownDictionary("DICT_5X5_100".into()))
        );
        let msg = err.map(|e| e.to_string()).unwrap_or_default();
        assert!(msg.contains("available: DICT_4X4_50"), "{msg}");

        let too_many = CharucoBoardSpec {
            squares_x: 12,
            squares_y: 10,
            ..CharucoBoardSpec::default()
        };
        assert_eq!(
            CharucoBoard::new(too_many).err(),
            Some(BoardError::NotEnoughDictionaryCodes {
                needed: 60,
                available: 50
            })
        );
    }

    #[test]
    fn absurd_board_size_is_an_error() {
        let huge = CharucoBoardSpec {
            squares_x: u32::MAX,
            squares_y: u32::MAX,
            ..CharucoBoardSpec::default()
        };
        assert!(matches!(
            CharucoBoard::new(huge),
            Err(BoardError::NotEnoughDictionaryCodes { .. } | BoardError::TooManySquares { .. })
        ));

        let wide = CharucoBoardSpec {
            squares_x: 70_000,
            squares_y: 70_000,
            ..CharucoBoardSpec::default()
        };
        assert!(matches!(
            CharucoBoard::new(wide),
            Err(BoardError::NotEnoughDictionaryCodes { .. })
        ));
    }

    #[test]
    fn spec_fills_missing_json_fields_with_defaults() {
        let spec: CharucoBoardSpec =
            serde_json::from_str(r#"{ "squares_x": 5, "squares_y": 4 }"#).expect("json");
        assert_eq!(spec.square_length, 0.045);
        assert_eq!(spec.dictionary, "DICT_4X4_50");
    }
}
