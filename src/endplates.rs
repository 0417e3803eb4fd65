//! # Endplate Overlay
//!
//! Fixed typical-anatomy line positions for a spine X-ray.
//!
//! This is **not** image analysis: the result ignores the image entirely and
//! always places a T5/T12 thoracic pair at the same percentages. It exists so
//! the Cobb tool can pre-populate its lines with a plausible starting layout.
//! Nothing calls it automatically.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::geometry::{angle_from_slopes, LineSegment, Point};
use crate::severity::{classify_severity, MeasurementKind, SeverityClass};

const CENTER_X: f64 = 50.0;
const UPPER_Y: f64 = 18.0;
const LOWER_Y: f64 = 52.0;
const APEX_Y: f64 = 34.0;
const SPINE_HALF_WIDTH: f64 = 6.0;
const UPPER_TILT: f64 = 0.5;
const LOWER_TILT: f64 = -0.5;
const APEX_OFFSET_X: f64 = 3.0;

const FIXED_CONFIDENCE: f64 = 0.75;
const FIXED_VERTEBRAE_COUNT: u32 = 14;

/// An endplate line, in percent-of-image coordinates (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endplate {
    pub level: String,
    pub line: LineSegment,
}

/// One curve of the fixed layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpineCurve {
    pub upper_endplate: Endplate,
    pub lower_endplate: Endplate,
    pub apex: Point,
    pub cobb_angle: f64,
    pub curve_type: String,
    pub convexity: String,
    pub severity: SeverityClass,
}

/// Result of [`analyze_spine_image`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpineAnalysis {
    pub is_valid_xray: bool,
    pub curves: Vec<SpineCurve>,
    pub vertebrae_count: u32,
    pub confidence: f64,
    pub processing_time_ms: u64,
}

/// Pixel positions for the two measurement lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePositions {
    pub line1: LineSegment,
    pub line2: LineSegment,
    pub apex: Point,
    pub cobb_angle: f64,
    pub confidence: f64,
}

/// Fixed thoracic-curve layout; image dimensions are accepted but unused.
pub fn analyze_spine_image(_image_width: f64, _image_height: f64) -> SpineAnalysis {
    let start = Instant::now();

    let endplate = |level: &str, y: f64, tilt: f64| Endplate {
        level: level.to_string(),
        line: LineSegment::new(
            Point::new(CENTER_X - SPINE_HALF_WIDTH, y - tilt),
            Point::new(CENTER_X + SPINE_HALF_WIDTH, y + tilt),
        ),
    };
    let upper_endplate = endplate("T5", UPPER_Y, UPPER_TILT);
    let lower_endplate = endplate("T12", LOWER_Y, LOWER_TILT);

    let cobb_angle = angle_from_slopes(&upper_endplate.line, &lower_endplate.line);

    let curve = SpineCurve {
        upper_endplate,
        lower_endplate,
        apex: Point::new(CENTER_X + APEX_OFFSET_X, APEX_Y),
        cobb_angle,
        curve_type: "thoracic".to_string(),
        convexity: "right".to_string(),
        severity: classify_severity(cobb_angle, MeasurementKind::Cobb),
    };

    SpineAnalysis {
        is_valid_xray: true,
        curves: vec![curve],
        vertebrae_count: FIXED_VERTEBRAE_COUNT,
        confidence: FIXED_CONFIDENCE,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }
}

/// Scale the first curve's percentages to a container of the given size.
///
/// `None` when the analysis is flagged invalid or has no curves.
pub fn to_line_positions(
    analysis: &SpineAnalysis,
    container_width: f64,
    container_height: f64,
) -> Option<LinePositions> {
    if !analysis.is_valid_xray {
        return None;
    }
    let curve = analysis.curves.first()?;

    let to_pixels = |p: &Point| {
        Point::new(
            p.x / 100.0 * container_width,
            p.y / 100.0 * container_height,
        )
    };
    let scale_line = |l: &LineSegment| LineSegment::new(to_pixels(&l.start), to_pixels(&l.end));

    Some(LinePositions {
        line1: scale_line(&curve.upper_endplate.line),
        line2: scale_line(&curve.lower_endplate.line),
        apex: to_pixels(&curve.apex),
        cobb_angle: curve.cobb_angle,
        confidence: analysis.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_fixed_regardless_of_input() {
        let a = analyze_spine_image(100.0, 200.0);
        let b = analyze_spine_image(4000.0, 3000.0);
        assert_eq!(a.curves, b.curves);
        assert_eq!(a.vertebrae_count, 14);
        assert!((a.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_curve_geometry() {
        let analysis = analyze_spine_image(0.0, 0.0);
        let curve = &analysis.curves[0];
        assert_eq!(curve.upper_endplate.level, "T5");
        assert_eq!(curve.upper_endplate.line.start, Point::new(44.0, 17.5));
        assert_eq!(curve.lower_endplate.line.end, Point::new(56.0, 51.5));
        assert_eq!(curve.apex, Point::new(53.0, 34.0));
        // Opposing 0.5/6 tilts: 2 * atan(1/12) ≈ 9.53°
        assert!((curve.cobb_angle - 9.527).abs() < 0.01);
        assert_eq!(curve.severity, SeverityClass::Normal);
    }

    #[test]
    fn test_to_line_positions_scales_to_container() {
        let analysis = analyze_spine_image(0.0, 0.0);
        let lines = to_line_positions(&analysis, 300.0, 350.0).unwrap();
        assert!((lines.line1.start.x - 132.0).abs() < 1e-9);
        assert!((lines.line1.start.y - 61.25).abs() < 1e-9);
        assert!((lines.apex.x - 159.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_analysis_has_no_positions() {
        let mut analysis = analyze_spine_image(0.0, 0.0);
        analysis.is_valid_xray = false;
        assert!(to_line_positions(&analysis, 300.0, 350.0).is_none());

        let mut empty = analyze_spine_image(0.0, 0.0);
        empty.curves.clear();
        assert!(to_line_positions(&empty, 300.0, 350.0).is_none());
    }
}
