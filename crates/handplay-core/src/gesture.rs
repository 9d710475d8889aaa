//! Gesture labels and the finger-gap classifier over a hand contour.

use crate::contour::Contour;
use crate::hull::{convex_hull_indices, convexity_defects, defect_angle, solidity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest valley angle still counted as a gap between two raised fingers.
pub const FINGER_GAP_MAX_ANGLE: f64 = std::f64::consts::FRAC_PI_2;
/// A three-gap hand this solid is read as a thumbs-up.
const THUMBS_UP_MIN_SOLIDITY: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    OpenPalm,
    ClosedFist,
    Pointing,
    Victory,
    ThumbsUp,
    #[default]
    Unknown,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::OpenPalm => "open_palm",
            Gesture::ClosedFist => "closed_fist",
            Gesture::Pointing => "pointing",
            Gesture::Victory => "victory",
            Gesture::ThumbsUp => "thumbs_up",
            Gesture::Unknown => "unknown",
        }
    }

    /// Open palm or victory: the "wave" used to start and restart games.
    pub fn is_wave(&self) -> bool {
        matches!(self, Gesture::OpenPalm | Gesture::Victory)
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count convexity defects whose valley angle is at most `max_angle` radians.
pub fn count_finger_gaps(contour: &Contour, max_angle: f64) -> Option<usize> {
    let hull = convex_hull_indices(&contour.points);
    let defects = convexity_defects(&contour.points, &hull).ok()?;
    let p = &contour.points;
    Some(
        defects
            .iter()
            .filter_map(|d| defect_angle(p[d.start], p[d.end], p[d.far]))
            .filter(|&angle| angle <= max_angle)
            .count(),
    )
}

/// Name the hand pose from the number of narrow valleys between fingers.
pub fn classify_contour(contour: &Contour) -> Gesture {
    let hull = convex_hull_indices(&contour.points);
    if hull.len() < 3 {
        return Gesture::Unknown;
    }
    let defects = match convexity_defects(&contour.points, &hull) {
        Ok(d) if !d.is_empty() => d,
        _ => return Gesture::ClosedFist,
    };

    let p = &contour.points;
    let gaps = defects
        .iter()
        .filter_map(|d| defect_angle(p[d.start], p[d.end], p[d.far]))
        .filter(|&angle| angle <= FINGER_GAP_MAX_ANGLE)
        .count();

    match gaps {
        0 => Gesture::ClosedFist,
        1 => Gesture::Pointing,
        2 => Gesture::Victory,
        3 if solidity(contour) > THUMBS_UP_MIN_SOLIDITY => Gesture::ThumbsUp,
        3 => Gesture::Unknown,
        _ => Gesture::OpenPalm,
    }
}
