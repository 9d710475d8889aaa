//! Contour extraction and contour measurements.
//!
//! Each 8-connected foreground component contributes the outer boundary
//! traced clockwise from its first pixel in raster order. Runs of points
//! along the same chain direction are collapsed to their end points, so a
//! filled rectangle comes back as its four corners.

use crate::mask::Mask;
use crate::types::Point;
use serde::Serialize;

/// Neighbour offsets in clockwise order (screen coordinates), starting west.
const CLOCKWISE: [(i32, i32); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Contour {
    pub points: Vec<Point>,
}

/// Raw spatial moments of a contour polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

/// First contour point attaining each extreme coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extremes {
    pub left: Point,
    pub right: Point,
    pub top: Point,
    pub bottom: Point,
}

impl Extremes {
    pub fn as_array(&self) -> [Point; 4] {
        [self.top, self.bottom, self.left, self.right]
    }
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Shoelace area of the closed polygon through the points.
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Perimeter of the closed polygon.
    pub fn arc_length(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.points[i].distance(self.points[(i + 1) % n]))
            .sum()
    }

    /// Polygon moments via Green's theorem, sign-normalised so `m00 >= 0`.
    pub fn moments(&self) -> Moments {
        let n = self.points.len();
        let (mut a, mut mx, mut my) = (0.0f64, 0.0f64, 0.0f64);
        if n >= 3 {
            for i in 0..n {
                let p = self.points[i];
                let q = self.points[(i + 1) % n];
                let cross = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
                a += cross;
                mx += (p.x + q.x) as f64 * cross;
                my += (p.y + q.y) as f64 * cross;
            }
        }
        let sign = if a < 0.0 { -1.0 } else { 1.0 };
        Moments {
            m00: sign * a / 2.0,
            m10: sign * mx / 6.0,
            m01: sign * my / 6.0,
        }
    }

    /// Centroid from the moments, truncated to integer pixels.
    /// `None` for degenerate contours with zero area.
    pub fn centroid(&self) -> Option<Point> {
        let m = self.moments();
        if m.m00 == 0.0 {
            return None;
        }
        Some(Point::new((m.m10 / m.m00) as i32, (m.m01 / m.m00) as i32))
    }

    pub fn extremes(&self) -> Option<Extremes> {
        let first = *self.points.first()?;
        let mut e = Extremes {
            left: first,
            right: first,
            top: first,
            bottom: first,
        };
        for &p in &self.points[1..] {
            if p.x < e.left.x {
                e.left = p;
            }
            if p.x > e.right.x {
                e.right = p;
            }
            if p.y < e.top.y {
                e.top = p;
            }
            if p.y > e.bottom.y {
                e.bottom = p;
            }
        }
        Some(e)
    }
}

pub(crate) fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}

/// Outer contours of every 8-connected non-zero component, in raster order of
/// their first pixel.
pub fn find_contours(mask: &Mask) -> Vec<Contour> {
    let (w, h) = (mask.width(), mask.height());
    let mut labelled = vec![false; w * h];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if mask.get(x, y) == 0 || labelled[y * w + x] {
                continue;
            }
            flood_component(mask, &mut labelled, x, y);
            let raw = trace_boundary(mask, Point::new(x as i32, y as i32));
            contours.push(Contour::new(compress_chain(raw)));
        }
    }

    tracing::trace!(count = contours.len(), "contours found");
    contours
}

/// The largest contour whose area is strictly greater than `min_area`.
pub fn largest_contour(contours: Vec<Contour>, min_area: f64) -> Option<Contour> {
    contours
        .into_iter()
        .map(|c| (c.area(), c))
        .filter(|(area, _)| *area > min_area)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
}

fn flood_component(mask: &Mask, labelled: &mut [bool], x: usize, y: usize) {
    let (w, h) = (mask.width(), mask.height());
    let mut stack = vec![(x, y)];
    labelled[y * w + x] = true;
    while let Some((cx, cy)) = stack.pop() {
        for (dx, dy) in CLOCKWISE {
            let nx = cx as i32 + dx;
            let ny = cy as i32 + dy;
            if nx < 0 || ny < 0 || nx as usize >= w || ny as usize >= h {
                continue;
            }
            let (nx, ny) = (nx as usize, ny as usize);
            if mask.get(nx, ny) != 0 && !labelled[ny * w + nx] {
                labelled[ny * w + nx] = true;
                stack.push((nx, ny));
            }
        }
    }
}

fn is_foreground(mask: &Mask, p: Point) -> bool {
    p.x >= 0
        && p.y >= 0
        && (p.x as usize) < mask.width()
        && (p.y as usize) < mask.height()
        && mask.get(p.x as usize, p.y as usize) != 0
}

fn offset_index(dx: i32, dy: i32) -> usize {
    CLOCKWISE
        .iter()
        .position(|&o| o == (dx, dy))
        .unwrap_or(0)
}

/// Moore-neighbour step: sweep clockwise around `cur` starting just after the
/// background cell `back`, returning the first foreground neighbour and the
/// background cell examined right before it (as an index around the new point).
fn moore_step(mask: &Mask, cur: Point, back: usize) -> Option<(Point, usize)> {
    for i in 1..=8 {
        let idx = (back + i) % 8;
        let (dx, dy) = CLOCKWISE[idx];
        let next = Point::new(cur.x + dx, cur.y + dy);
        if is_foreground(mask, next) {
            let (bx, by) = CLOCKWISE[(idx + 7) % 8];
            let back_cell = Point::new(cur.x + bx, cur.y + by);
            return Some((next, offset_index(back_cell.x - next.x, back_cell.y - next.y)));
        }
    }
    None
}

fn trace_boundary(mask: &Mask, start: Point) -> Vec<Point> {
    let mut points = vec![start];
    let limit = 4 * mask.width() * mask.height() + 16;

    // The raster-order first pixel never has a foreground west neighbour.
    let mut cur = start;
    let mut back = 0usize;
    let mut second: Option<Point> = None;

    for _ in 0..limit {
        let Some((next, next_back)) = moore_step(mask, cur, back) else {
            break;
        };
        if cur == start {
            match second {
                Some(s) if s == next => break,
                Some(_) => {}
                None => second = Some(next),
            }
        }
        points.push(next);
        cur = next;
        back = next_back;
    }

    if points.len() > 1 && points.last() == Some(&start) {
        points.pop();
    }
    points
}

/// Drop points lying in the middle of a straight run of identical chain steps.
fn compress_chain(points: Vec<Point>) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points;
    }
    let kept: Vec<Point> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            (cur.x - prev.x, cur.y - prev.y) != (next.x - cur.x, next.y - cur.y)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        points
    } else {
        kept
    }
}
