//! # Angle Math
//!
//! Plane geometry for the Cobb-angle tool. Coordinates may be pixels or
//! percentages; the caller only has to stay consistent within one computation.

use serde::{Deserialize, Serialize};

/// A point in the measurement canvas.
///
/// # Example
/// ```
/// use scoliscreen::Point;
/// let p = Point::new(60.0, 120.0);
/// assert_eq!(p.translated(10.0, -20.0), Point::new(70.0, 100.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Shift by a delta without any clamping.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// A line drawn along a vertebral endplate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Direction of the segment in degrees, `(-180, 180]`.
    ///
    /// A zero-length segment reports 0° (atan2(0, 0)); transient drag states
    /// can produce one and it must not fail.
    pub fn direction_degrees(&self) -> f64 {
        let dy = self.end.y - self.start.y;
        let dx = self.end.x - self.start.x;
        dy.atan2(dx).to_degrees()
    }
}

/// Acute angle between two lines, in degrees, within `[0, 90]`.
///
/// The absolute difference of the two directions is folded so that the
/// result does not depend on which end of either line was dragged as the
/// start. Differences past 180° (one direction near +180°, the other near
/// -180°) are reduced modulo 180 first.
pub fn angle_between(line1: &LineSegment, line2: &LineSegment) -> f64 {
    let mut degree = (line1.direction_degrees() - line2.direction_degrees()).abs();
    if degree > 180.0 {
        degree -= 180.0;
    }
    if degree > 90.0 {
        degree = 180.0 - degree;
    }
    degree
}

/// Angle between two lines computed from their slopes, `atan(|(m1-m2)/(1+m1·m2)|)`.
///
/// Used by the fixed endplate overlay. Vertical lines yield a non-finite
/// slope; callers only pass near-horizontal endplates.
pub fn angle_from_slopes(line1: &LineSegment, line2: &LineSegment) -> f64 {
    let slope = |l: &LineSegment| (l.end.y - l.start.y) / (l.end.x - l.start.x);
    let (m1, m2) = (slope(line1), slope(line2));
    ((m1 - m2) / (1.0 + m1 * m2)).abs().atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> LineSegment {
        LineSegment::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn reversed(l: &LineSegment) -> LineSegment {
        LineSegment::new(l.end, l.start)
    }

    #[test]
    fn test_identical_lines_are_zero() {
        let l = line(60.0, 120.0, 220.0, 135.0);
        assert!(approx(angle_between(&l, &l), 0.0));
    }

    #[test]
    fn test_parallel_horizontal_lines() {
        let l1 = line(60.0, 120.0, 220.0, 120.0);
        let l2 = line(60.0, 280.0, 220.0, 280.0);
        assert!(approx(angle_between(&l1, &l2), 0.0));
    }

    #[test]
    fn test_perpendicular_is_ninety() {
        let l1 = line(0.0, 0.0, 10.0, 0.0);
        let l2 = line(0.0, 0.0, 0.0, 10.0);
        assert!(approx(angle_between(&l1, &l2), 90.0));
    }

    #[test]
    fn test_obtuse_difference_folds_to_acute() {
        // 0° vs 150° -> 30°
        let l1 = line(0.0, 0.0, 10.0, 0.0);
        let dir = 150f64.to_radians();
        let l2 = line(0.0, 0.0, dir.cos(), dir.sin());
        assert!(approx(angle_between(&l1, &l2), 30.0));
    }

    #[test]
    fn test_symmetric_and_direction_invariant() {
        let pairs = [
            (line(10.0, 10.0, 200.0, 40.0), line(15.0, 300.0, 180.0, 250.0)),
            (line(-5.0, 3.0, -100.0, 1.0), line(0.0, 0.0, 20.0, -2.0)),
            (line(0.0, 0.0, -10.0, 0.1), line(0.0, 0.0, -10.0, -0.1)),
            (line(3.0, 7.0, 3.0, -40.0), line(0.0, 0.0, 5.0, 5.0)),
        ];
        for (a, b) in pairs.iter() {
            let base = angle_between(a, b);
            assert!((0.0..=90.0).contains(&base), "out of range: {}", base);
            assert!(approx(base, angle_between(b, a)));
            assert!(approx(base, angle_between(&reversed(a), b)));
            assert!(approx(base, angle_between(a, &reversed(b))));
            assert!(approx(base, angle_between(&reversed(a), &reversed(b))));
        }
    }

    #[test]
    fn test_near_antiparallel_across_branch_cut() {
        // Directions ~ +179.4° and ~ -179.4°: lines are nearly parallel.
        let l1 = line(0.0, 0.0, -10.0, 0.1);
        let l2 = line(0.0, 0.0, -10.0, -0.1);
        let angle = angle_between(&l1, &l2);
        assert!(angle < 2.0, "expected small angle, got {}", angle);
    }

    #[test]
    fn test_degenerate_segment_has_zero_direction() {
        let point = line(50.0, 50.0, 50.0, 50.0);
        assert!(approx(point.direction_degrees(), 0.0));

        let l = line(0.0, 0.0, 10.0, 10.0);
        assert!(approx(angle_between(&point, &l), 45.0));
    }

    #[test]
    fn test_slope_formula_matches_direction_formula() {
        let l1 = line(44.0, 17.5, 56.0, 18.5);
        let l2 = line(44.0, 52.5, 56.0, 51.5);
        assert!((angle_from_slopes(&l1, &l2) - angle_between(&l1, &l2)).abs() < 1e-9);
    }
}
