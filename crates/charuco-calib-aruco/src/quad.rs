//! Marker candidate search: dark connected components fitted with quads.

use nalgebra::{Point2, Vector2};
use std::collections::VecDeque;

/// Limits applied while turning dark blobs into quadrilaterals.
#[derive(Clone, Copy, Debug)]
pub(crate) struct QuadLimits {
    pub min_side_px: f64,
    pub max_side_px: f64,
    pub min_fill: f64,
    pub min_border_distance: f64,
}

/// Bounding box and row extremes of one 4-connected dark region.
#[derive(Clone, Debug)]
pub(crate) struct Component {
    pub min_x: usize,
    pub max_x: usize,
    pub min_y: usize,
    pub max_y: usize,
    /// `(y, leftmost x, rightmost x)` for every occupied row.
    rows: Vec<(usize, usize, usize)>,
}

impl Component {
    fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }

    /// Row extremes are enough to span the convex hull.
    fn outline_points(&self) -> Vec<Point2<f64>> {
        let mut pts = Vec::with_capacity(self.rows.len() * 2);
        for &(y, x0, x1) in &self.rows {
            pts.push(Point2::new(x0 as f64, y as f64));
            if x1 != x0 {
                pts.push(Point2::new(x1 as f64, y as f64));
            }
        }
        pts
    }
}

/// Label 4-connected regions of `mask` and keep those whose bounding box
/// sides fall within `[min_side, max_side]`.
pub(crate) fn dark_components(
    mask: &[bool],
    width: usize,
    height: usize,
    min_side: usize,
    max_side: usize,
) -> Vec<Component> {
    let mut visited = vec![false; mask.len()];
    let mut queue = VecDeque::new();
    let mut out = Vec::new();
    // per-row extremes of the component being grown, indexed by y
    let mut row_ext: Vec<(usize, usize)> = vec![(usize::MAX, 0); height];

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let (mut min_x, mut max_x) = (usize::MAX, 0);
        let (mut min_y, mut max_y) = (usize::MAX, 0);

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % width, idx / width);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            let ext = &mut row_ext[y];
            ext.0 = ext.0.min(x);
            ext.1 = ext.1.max(x);

            let mut visit = |n: usize| {
                if mask[n] && !visited[n] {
                    visited[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }

        let mut rows = Vec::with_capacity(max_y - min_y + 1);
        for (y, ext) in row_ext.iter_mut().enumerate().take(max_y + 1).skip(min_y) {
            if ext.0 != usize::MAX {
                rows.push((y, ext.0, ext.1));
            }
            *ext = (usize::MAX, 0);
        }

        let comp = Component {
            min_x,
            max_x,
            min_y,
            max_y,
            rows,
        };
        let side = comp.width().max(comp.height());
        if comp.width().min(comp.height()) >= min_side && side <= max_side {
            out.push(comp);
        }
    }
    out
}

#[inline]
fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain; collinear points are dropped.
pub(crate) fn convex_hull(mut pts: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Shoelace area; positive when the points run clockwise on screen (y down).
pub(crate) fn polygon_area(pts: &[Point2<f64>]) -> f64 {
    let n = pts.len();
    let mut acc = 0.0;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

fn farthest_from(pts: &[Point2<f64>], from: Point2<f64>) -> Option<Point2<f64>> {
    pts.iter()
        .copied()
        .max_by(|a, b| (a - from).norm_squared().total_cmp(&(b - from).norm_squared()))
}

/// Pick four hull vertices spanning the largest quad: a far vertex, the
/// vertex opposite to it, and the extreme vertices on each side of that
/// diagonal.
fn quad_from_hull(hull: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
    if hull.len() < 4 {
        return None;
    }
    let n = hull.len() as f64;
    let centroid = Point2::from(hull.iter().map(|p| p.coords).sum::<Vector2<f64>>() / n);

    let p0 = farthest_from(hull, centroid)?;
    let p2 = farthest_from(hull, p0)?;
    let diag = p2 - p0;
    let len = diag.norm();
    if len < 1e-9 {
        return None;
    }

    let signed = |p: &Point2<f64>| (diag.x * (p.y - p0.y) - diag.y * (p.x - p0.x)) / len;
    let p1 = hull
        .iter()
        .copied()
        .max_by(|a, b| signed(a).total_cmp(&signed(b)))?;
    let p3 = hull
        .iter()
        .copied()
        .min_by(|a, b| signed(a).total_cmp(&signed(b)))?;
    if signed(&p1) <= 1.0 || signed(&p3) >= -1.0 {
        return None;
    }

    let mut quad = [p0, p1, p2, p3];
    if polygon_area(&quad) < 0.0 {
        quad.swap(1, 3);
    }
    Some(quad)
}

/// Push every edge outward by `offset` pixels and re-intersect neighbours.
///
/// Hull vertices sit on the centers of the outermost dark pixels, half a
/// pixel inside the printed outline.
fn expand_quad(quad: &[Point2<f64>; 4], offset: f64) -> [Point2<f64>; 4] {
    let lines: Vec<(Point2<f64>, Vector2<f64>)> = (0..4)
        .map(|k| {
            let a = quad[k];
            let d = quad[(k + 1) % 4] - a;
            let normal = Vector2::new(d.y, -d.x).normalize();
            (a + normal * offset, d)
        })
        .collect();

    let mut out = *quad;
    for k in 0..4 {
        let (a, d) = lines[(k + 3) % 4];
        let (b, e) = lines[k];
        let denom = d.x * e.y - d.y * e.x;
        if denom.abs() < 1e-12 {
            continue;
        }
        let w = b - a;
        let s = (w.x * e.y - w.y * e.x) / denom;
        out[k] = a + d * s;
    }
    out
}

/// Fit a quad to a component; `None` if the shape is not quadrilateral enough.
///
/// Corners come back clockwise on screen with an arbitrary starting corner.
pub(crate) fn fit_quad(
    comp: &Component,
    image_width: usize,
    image_height: usize,
    limits: &QuadLimits,
) -> Option<[Point2<f64>; 4]> {
    let hull = convex_hull(comp.outline_points());
    let hull_area = polygon_area(&hull);
    if hull_area <= 0.0 {
        return None;
    }
    let quad = quad_from_hull(&hull)?;
    if polygon_area(&quad) / hull_area < limits.min_fill {
        return None;
    }
    let quad = expand_quad(&quad, 0.5);

    for k in 0..4 {
        let side = (quad[(k + 1) % 4] - quad[k]).norm();
        if side < limits.min_side_px || side > limits.max_side_px {
            return None;
        }
    }

    let m = limits.min_border_distance;
    let inside = |p: &Point2<f64>| {
        p.x >= m
            && p.y >= m
            && p.x <= image_width as f64 - 1.0 - m
            && p.y <= image_height as f64 - 1.0 - m
    };
    quad.iter().all(inside).then_some(quad)
}
