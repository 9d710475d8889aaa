//! Which way the hand points: fingertip search over convexity defects,
//! with extreme-point and min-area-rectangle fallbacks.

use crate::contour::Contour;
use crate::hull::{convex_hull_indices, convexity_defects, defect_angle, min_area_rect};
use crate::types::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_4, PI};
use std::fmt;

/// Contours at or below this area are too small to read a pointing finger from.
pub const POINTING_MIN_AREA: f64 = 3000.0;
/// Valleys sharper than this flank a raised finger.
const POINTING_GAP_MAX_ANGLE: f64 = PI / 2.5;
/// Fingertip candidates must sit this close to the topmost contour point.
const POINTING_TOP_RADIUS: f64 = 50.0;
/// Defect end points nearer than this to the centre are knuckles, not tips.
const FINGERTIP_MIN_REACH: f64 = 30.0;

/// Screen direction, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Bin an `atan2` angle (radians, screen coordinates) into quadrants
    /// centred on the axes.
    pub fn from_radians(angle: f64) -> Self {
        if (-FRAC_PI_4..=FRAC_PI_4).contains(&angle) {
            Direction::Right
        } else if angle > FRAC_PI_4 && angle <= 3.0 * FRAC_PI_4 {
            Direction::Down
        } else if (-3.0 * FRAC_PI_4..-FRAC_PI_4).contains(&angle) {
            Direction::Up
        } else {
            Direction::Left
        }
    }

    /// Bin a `[0, 360)` degree angle (screen coordinates).
    pub fn from_degrees(deg: f64) -> Self {
        if !(45.0..=315.0).contains(&deg) {
            Direction::Right
        } else if deg < 135.0 {
            Direction::Down
        } else if deg < 225.0 {
            Direction::Left
        } else {
            Direction::Up
        }
    }

    /// Unit vector in screen coordinates.
    pub fn unit(&self) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `atan2(dy, dx)` in degrees, mapped to `[0, 360)`.
pub fn degrees_360(dx: f64, dy: f64) -> f64 {
    let deg = dy.atan2(dx).to_degrees();
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

/// Coarse hand orientation: centre to the farthest fingertip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HandOrientation {
    pub direction: Direction,
    /// `atan2` of the centre-to-fingertip vector, radians.
    pub angle: f64,
    pub fingertip: Point,
}

/// Fine pointing vector for analogue steering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pointing {
    /// Unit vector in screen coordinates.
    pub vector: (f64, f64),
    /// `None` when the vector came from the rectangle fallback.
    pub fingertip: Option<Point>,
}

impl Pointing {
    pub fn degrees(&self) -> f64 {
        degrees_360(self.vector.0, self.vector.1)
    }
}

fn farthest_from(center: Point, candidates: impl IntoIterator<Item = Point>) -> Option<Point> {
    let mut best: Option<(Point, f64)> = None;
    for p in candidates {
        let d = p.distance(center);
        if d > best.map_or(0.0, |(_, bd)| bd) {
            best = Some((p, d));
        }
    }
    best.map(|(p, _)| p)
}

/// Orientation from defect end points far from the centre, falling back to
/// the extreme points. Needs at least five contour points.
pub fn hand_orientation(contour: &Contour, center: Point) -> Option<HandOrientation> {
    if contour.len() < 5 {
        return None;
    }
    let pts = &contour.points;
    let hull = convex_hull_indices(pts);
    let defects = convexity_defects(pts, &hull).unwrap_or_default();

    let reach: Vec<Point> = defects
        .iter()
        .flat_map(|d| [pts[d.start], pts[d.end]])
        .filter(|p| p.distance(center) > FINGERTIP_MIN_REACH)
        .collect();

    let fingertip = match farthest_from(center, reach) {
        Some(tip) => tip,
        None => farthest_from(center, contour.extremes()?.as_array())?,
    };

    let angle = ((fingertip.y - center.y) as f64).atan2((fingertip.x - center.x) as f64);
    Some(HandOrientation {
        direction: Direction::from_radians(angle),
        angle,
        fingertip,
    })
}

/// Pointing vector from the sharpest finger near the top of the hand.
///
/// Fingertip candidates are the end points of sharp defects lying near the
/// topmost contour point; without any, the top/right/left extremes compete.
/// When no fingertip yields a vector, the long axis of the minimum-area
/// rectangle is used instead.
pub fn pointing_direction(contour: &Contour, center: Point) -> Option<Pointing> {
    if contour.area() <= POINTING_MIN_AREA {
        return None;
    }
    let pts = &contour.points;
    let hull = convex_hull_indices(pts);

    if hull.len() >= 3 {
        if let (Ok(defects), Some(ext)) = (convexity_defects(pts, &hull), contour.extremes()) {
            if !defects.is_empty() {
                let mut candidates: Vec<Point> = defects
                    .iter()
                    .filter(|d| {
                        defect_angle(pts[d.start], pts[d.end], pts[d.far])
                            .is_some_and(|a| a <= POINTING_GAP_MAX_ANGLE)
                    })
                    .flat_map(|d| [pts[d.start], pts[d.end]])
                    .filter(|p| p.distance(ext.top) < POINTING_TOP_RADIUS)
                    .collect();
                if candidates.is_empty() {
                    candidates = vec![ext.top, ext.right, ext.left];
                }

                if let Some(tip) = farthest_from(center, candidates) {
                    let (dx, dy) = ((tip.x - center.x) as f64, (tip.y - center.y) as f64);
                    let len = (dx * dx + dy * dy).sqrt();
                    return Some(Pointing {
                        vector: (dx / len, dy / len),
                        fingertip: Some(tip),
                    });
                }
            }
        }
    }

    let rect = min_area_rect(pts)?;
    let rad = rect.long_axis_degrees().to_radians();
    Some(Pointing {
        vector: (rad.cos(), rad.sin()),
        fingertip: None,
    })
}
