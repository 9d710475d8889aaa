//! Convex hull, convexity defects and minimum-area rectangles over contour points.

use crate::contour::{polygon_area, Contour};
use crate::types::{Point, VisionError};

/// A concavity between two consecutive hull vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Defect {
    /// Contour index of the hull vertex opening the concavity.
    pub start: usize,
    /// Contour index of the hull vertex closing it.
    pub end: usize,
    /// Contour index of the deepest point.
    pub far: usize,
    /// Distance from `far` to the chord `start`–`end`, in pixels.
    pub depth: f64,
}

/// Rotated bounding rectangle. `angle` is the direction of the `width`
/// side in degrees, in `[0, 180)`, measured clockwise on screen from +x.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: (f64, f64),
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl RotatedRect {
    /// Direction of the longer side in degrees, in `[0, 180)`.
    pub fn long_axis_degrees(&self) -> f64 {
        if self.width >= self.height {
            self.angle
        } else {
            normalize_half_turn(self.angle + 90.0)
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

fn normalize_half_turn(deg: f64) -> f64 {
    let d = deg % 180.0;
    if d < 0.0 {
        d + 180.0
    } else {
        d
    }
}

fn cross(o: Point, a: Point, b: Point) -> i64 {
    (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
}

/// Hull vertex indices in cyclic hull order (monotone chain).
/// Collinear points are dropped; repeated coordinates resolve to their first index.
fn hull_cycle(points: &[Point]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| (points[i].x, points[i].y));
    order.dedup_by_key(|i| points[*i]);

    if order.len() < 3 {
        return order;
    }

    let mut lower: Vec<usize> = Vec::with_capacity(order.len());
    for &i in &order {
        while lower.len() >= 2
            && cross(points[lower[lower.len() - 2]], points[lower[lower.len() - 1]], points[i]) <= 0
        {
            lower.pop();
        }
        lower.push(i);
    }

    let mut upper: Vec<usize> = Vec::with_capacity(order.len());
    for &i in order.iter().rev() {
        while upper.len() >= 2
            && cross(points[upper[upper.len() - 2]], points[upper[upper.len() - 1]], points[i]) <= 0
        {
            upper.pop();
        }
        upper.push(i);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Hull vertex indices sorted ascending, i.e. in contour order.
pub fn convex_hull_indices(points: &[Point]) -> Vec<usize> {
    let mut idx = hull_cycle(points);
    idx.sort_unstable();
    idx
}

/// Hull polygon in cyclic order.
pub fn convex_hull_points(points: &[Point]) -> Vec<Point> {
    hull_cycle(points).into_iter().map(|i| points[i]).collect()
}

fn distance_to_chord(p: Point, a: Point, b: Point) -> f64 {
    let len = a.distance(b);
    if len == 0.0 {
        return p.distance(a);
    }
    cross(a, b, p).abs() as f64 / len
}

/// Deepest contour point between each pair of consecutive hull vertices.
///
/// `hull` must be sorted in contour order, as returned by [`convex_hull_indices`].
/// Gaps without any point off the chord produce no defect.
pub fn convexity_defects(points: &[Point], hull: &[usize]) -> Result<Vec<Defect>, VisionError> {
    if hull.len() < 3 {
        return Err(VisionError::DegenerateHull(hull.len()));
    }
    let n = points.len();
    let mut defects = Vec::new();

    for k in 0..hull.len() {
        let start = hull[k];
        let end = hull[(k + 1) % hull.len()];
        let (a, b) = (points[start], points[end]);

        let mut best: Option<(usize, f64)> = None;
        let mut j = (start + 1) % n;
        while j != end {
            let depth = distance_to_chord(points[j], a, b);
            if depth > best.map_or(0.0, |(_, d)| d) {
                best = Some((j, depth));
            }
            j = (j + 1) % n;
        }

        if let Some((far, depth)) = best {
            defects.push(Defect { start, end, far, depth });
        }
    }

    Ok(defects)
}

/// Angle at `far` of the triangle (start, end, far), via the law of cosines.
/// `None` when the triangle is degenerate.
pub fn defect_angle(start: Point, end: Point, far: Point) -> Option<f64> {
    let a = start.distance(end);
    let b = far.distance(start);
    let c = end.distance(far);
    if b == 0.0 || c == 0.0 {
        return None;
    }
    let cos = (b * b + c * c - a * a) / (2.0 * b * c);
    if !(-1.0 - 1e-9..=1.0 + 1e-9).contains(&cos) {
        return None;
    }
    Some(cos.clamp(-1.0, 1.0).acos())
}

/// Contour area divided by hull area; 0 when the hull has no area.
pub fn solidity(contour: &Contour) -> f64 {
    let hull_area = polygon_area(&convex_hull_points(&contour.points));
    if hull_area > 0.0 {
        contour.area() / hull_area
    } else {
        0.0
    }
}

/// Smallest-area enclosing rectangle via rotating calipers over the hull edges.
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    let hull = convex_hull_points(points);
    match hull.len() {
        0 => None,
        1 => Some(RotatedRect {
            center: (hull[0].x as f64, hull[0].y as f64),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        }),
        2 => {
            let (p, q) = (hull[0], hull[1]);
            Some(RotatedRect {
                center: ((p.x + q.x) as f64 / 2.0, (p.y + q.y) as f64 / 2.0),
                width: p.distance(q),
                height: 0.0,
                angle: normalize_half_turn(((q.y - p.y) as f64).atan2((q.x - p.x) as f64).to_degrees()),
            })
        }
        m => {
            let mut best: Option<RotatedRect> = None;
            for i in 0..m {
                let (p, q) = (hull[i], hull[(i + 1) % m]);
                let len = p.distance(q);
                if len == 0.0 {
                    continue;
                }
                let u = ((q.x - p.x) as f64 / len, (q.y - p.y) as f64 / len);
                let v = (-u.1, u.0);

                let (mut min_u, mut max_u, mut min_v, mut max_v) =
                    (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
                for h in &hull {
                    let (x, y) = (h.x as f64, h.y as f64);
                    let pu = x * u.0 + y * u.1;
                    let pv = x * v.0 + y * v.1;
                    min_u = min_u.min(pu);
                    max_u = max_u.max(pu);
                    min_v = min_v.min(pv);
                    max_v = max_v.max(pv);
                }

                let (mu, mv) = ((min_u + max_u) / 2.0, (min_v + max_v) / 2.0);
                let rect = RotatedRect {
                    center: (mu * u.0 + mv * v.0, mu * u.1 + mv * v.1),
                    width: max_u - min_u,
                    height: max_v - min_v,
                    angle: normalize_half_turn(u.1.atan2(u.0).to_degrees()),
                };
                if best.map_or(true, |b| rect.area() < b.area()) {
                    best = Some(rect);
                }
            }
            best
        }
    }
}
