//! # Cobb Measurement Session
//!
//! State behind the Cobb-angle tool: two draggable endplate lines over a
//! photo, pinch zoom, and display-only image adjustments.
//!
//! ## Canvas
//!
//! Handles stay inside `x ∈ [10, width - 90]`, `y ∈ [10, image_height - 10]`
//! where `image_height = min(350, 0.45 · screen_height)`. Each point is clamped
//! on its own, so dragging a whole line into an edge can change its angle.
//!
//! ## Saving
//!
//! The rendered view is captured at scale 1.0: a zoomed view is reset, given
//! time to re-render, captured, then restored. Upload is best-effort and never
//! fails the save.

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::endplates::LinePositions;
use crate::error::{Result, ScreeningError};
use crate::geometry::{angle_between, LineSegment, Point};
use crate::severity::{classify_severity, MeasurementKind, SeverityClass};
use crate::upload::{UploadMetadata, UploadQueue};

const MAX_IMAGE_HEIGHT: f64 = 350.0;
const IMAGE_HEIGHT_FRACTION: f64 = 0.45;
const EDGE_MARGIN: f64 = 10.0;
const RIGHT_RESERVED: f64 = 90.0;

const DEFAULT_START_X: f64 = 60.0;
const DEFAULT_END_INSET: f64 = 80.0;
const DEFAULT_LINE1_Y: f64 = 120.0;
const DEFAULT_LINE2_Y: f64 = 280.0;

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 3.0;
pub const MIN_ADJUSTMENT: f64 = 0.5;
pub const MAX_ADJUSTMENT: f64 = 2.0;

// ============================================================================
// Canvas and handles
// ============================================================================

/// Screen size the tool is laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewDimensions {
    pub width: f64,
    pub height: f64,
}

impl ViewDimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Height of the photo area.
    pub fn image_height(&self) -> f64 {
        MAX_IMAGE_HEIGHT.min(self.height * IMAGE_HEIGHT_FRACTION)
    }
}

/// Region handles may be dragged within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl CanvasBounds {
    pub fn for_view(view: &ViewDimensions) -> Self {
        Self {
            min_x: EDGE_MARGIN,
            max_x: view.width - RIGHT_RESERVED,
            min_y: EDGE_MARGIN,
            max_y: view.image_height() - EDGE_MARGIN,
        }
    }

    /// Clamp a point into the region. On screens too small for the margins
    /// (max < min) points land on the max edge.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(
            p.x.max(self.min_x).min(self.max_x),
            p.y.max(self.min_y).min(self.max_y),
        )
    }
}

/// Which of the two lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineId {
    /// Red line, superior endplate
    Superior,
    /// Blue line, inferior endplate
    Inferior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Start,
    End,
}

/// A draggable handle: one endpoint of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    pub line: LineId,
    pub endpoint: Endpoint,
}

impl Handle {
    pub fn new(line: LineId, endpoint: Endpoint) -> Self {
        Self { line, endpoint }
    }
}

// ============================================================================
// Display adjustments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayColor {
    White,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    Normal,
    Difference,
}

/// A tinted layer the renderer draws over the photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayHint {
    pub color: OverlayColor,
    pub opacity: f64,
    pub blend: BlendMode,
}

/// Brightness/contrast/negative controls.
///
/// Pixels are never touched; the values only drive [`overlays`](Self::overlays).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayAdjustments {
    pub brightness: f64,
    pub contrast: f64,
    pub negative: bool,
}

impl Default for DisplayAdjustments {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            negative: false,
        }
    }
}

impl DisplayAdjustments {
    pub fn set_brightness(&mut self, value: f64) {
        self.brightness = value.clamp(MIN_ADJUSTMENT, MAX_ADJUSTMENT);
    }

    pub fn set_contrast(&mut self, value: f64) {
        self.contrast = value.clamp(MIN_ADJUSTMENT, MAX_ADJUSTMENT);
    }

    pub fn toggle_negative(&mut self) {
        self.negative = !self.negative;
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Layers to draw, bottom to top: brightness, contrast, negative.
    pub fn overlays(&self) -> Vec<OverlayHint> {
        let mut layers = Vec::with_capacity(3);
        if self.brightness != 1.0 {
            layers.push(OverlayHint {
                color: if self.brightness > 1.0 {
                    OverlayColor::White
                } else {
                    OverlayColor::Black
                },
                opacity: (self.brightness - 1.0).abs() * 0.5,
                blend: BlendMode::Normal,
            });
        }
        if self.contrast != 1.0 {
            layers.push(OverlayHint {
                color: if self.contrast > 1.0 {
                    OverlayColor::Black
                } else {
                    OverlayColor::White
                },
                opacity: (self.contrast - 1.0).abs() * 0.4,
                blend: BlendMode::Normal,
            });
        }
        if self.negative {
            layers.push(OverlayHint {
                color: OverlayColor::White,
                opacity: 1.0,
                blend: BlendMode::Difference,
            });
        }
        layers
    }
}

// ============================================================================
// Capture host
// ============================================================================

/// Platform side of the save path: view zoom, capture, and device library.
#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// Apply a zoom level to the rendered view.
    async fn apply_scale(&self, scale: f64);

    /// Wait until the view reflects the last applied scale. Hosts with a
    /// render-complete signal should override the fixed delay.
    async fn wait_for_render(&self, settle: Duration) {
        tokio::time::sleep(settle).await;
    }

    /// Capture the measurement view; returns a local image URI.
    async fn capture(&self) -> Result<String>;

    /// Persist the captured image to the device photo library.
    async fn save_to_library(&self, image_uri: &str) -> Result<()>;
}

/// Derived measurement; recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CobbMeasurement {
    pub line1: LineSegment,
    pub line2: LineSegment,
    pub angle_degrees: f64,
    pub severity: SeverityClass,
}

/// What a successful save produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub image_uri: String,
    pub cobb_angle: f64,
    /// Queue id, or `None` when queuing failed (the save itself still succeeded)
    pub upload_id: Option<String>,
}

// ============================================================================
// Session
// ============================================================================

/// Cobb tool state for one screen.
#[derive(Debug, Clone)]
pub struct MeasurementSession {
    view: ViewDimensions,
    bounds: CanvasBounds,
    line1: LineSegment,
    line2: LineSegment,
    scale: f64,
    pinch_initial_distance: f64,
    pinch_base_scale: f64,
    adjustments: DisplayAdjustments,
    image_uri: Option<String>,
}

impl MeasurementSession {
    pub fn new(view: ViewDimensions) -> Self {
        let (line1, line2) = Self::default_lines(&view);
        Self {
            view,
            bounds: CanvasBounds::for_view(&view),
            line1,
            line2,
            scale: MIN_SCALE,
            pinch_initial_distance: 0.0,
            pinch_base_scale: MIN_SCALE,
            adjustments: DisplayAdjustments::default(),
            image_uri: None,
        }
    }

    fn default_lines(view: &ViewDimensions) -> (LineSegment, LineSegment) {
        let end_x = view.width - DEFAULT_END_INSET;
        (
            LineSegment::new(
                Point::new(DEFAULT_START_X, DEFAULT_LINE1_Y),
                Point::new(end_x, DEFAULT_LINE1_Y),
            ),
            LineSegment::new(
                Point::new(DEFAULT_START_X, DEFAULT_LINE2_Y),
                Point::new(end_x, DEFAULT_LINE2_Y),
            ),
        )
    }

    pub fn view(&self) -> ViewDimensions {
        self.view
    }

    pub fn bounds(&self) -> CanvasBounds {
        self.bounds
    }

    pub fn line(&self, id: LineId) -> LineSegment {
        match id {
            LineId::Superior => self.line1,
            LineId::Inferior => self.line2,
        }
    }

    fn line_mut(&mut self, id: LineId) -> &mut LineSegment {
        match id {
            LineId::Superior => &mut self.line1,
            LineId::Inferior => &mut self.line2,
        }
    }

    /// Drag one handle by a delta; the point is clamped to the canvas.
    pub fn move_handle(&mut self, handle: Handle, dx: f64, dy: f64) {
        let bounds = self.bounds;
        let line = self.line_mut(handle.line);
        let point = match handle.endpoint {
            Endpoint::Start => &mut line.start,
            Endpoint::End => &mut line.end,
        };
        *point = bounds.clamp(point.translated(dx, dy));
    }

    /// Drag a whole line; each endpoint is clamped independently.
    pub fn move_line(&mut self, id: LineId, dx: f64, dy: f64) {
        let bounds = self.bounds;
        let line = self.line_mut(id);
        line.start = bounds.clamp(line.start.translated(dx, dy));
        line.end = bounds.clamp(line.end.translated(dx, dy));
    }

    /// Replace both lines with overlay positions, clamped to the canvas.
    pub fn apply_overlay(&mut self, positions: &LinePositions) {
        let clamp = |l: &LineSegment| {
            LineSegment::new(self.bounds.clamp(l.start), self.bounds.clamp(l.end))
        };
        let (line1, line2) = (clamp(&positions.line1), clamp(&positions.line2));
        self.line1 = line1;
        self.line2 = line2;
    }

    pub fn current_angle(&self) -> f64 {
        angle_between(&self.line1, &self.line2)
    }

    pub fn severity(&self) -> SeverityClass {
        classify_severity(self.current_angle(), MeasurementKind::Cobb)
    }

    pub fn measurement(&self) -> CobbMeasurement {
        let angle_degrees = self.current_angle();
        CobbMeasurement {
            line1: self.line1,
            line2: self.line2,
            angle_degrees,
            severity: classify_severity(angle_degrees, MeasurementKind::Cobb),
        }
    }

    // ------------------------------------------------------------------------
    // Zoom
    // ------------------------------------------------------------------------

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Two-finger gesture started with the given finger distance.
    pub fn begin_pinch(&mut self, distance: f64) {
        self.pinch_initial_distance = distance;
        self.pinch_base_scale = self.scale;
    }

    pub fn update_pinch(&mut self, distance: f64) {
        if self.pinch_initial_distance > 0.0 {
            self.set_scale(self.pinch_base_scale * (distance / self.pinch_initial_distance));
        }
    }

    pub fn end_pinch(&mut self) {
        self.pinch_initial_distance = 0.0;
    }

    // ------------------------------------------------------------------------
    // Adjustments and image
    // ------------------------------------------------------------------------

    pub fn adjustments(&self) -> &DisplayAdjustments {
        &self.adjustments
    }

    pub fn adjustments_mut(&mut self) -> &mut DisplayAdjustments {
        &mut self.adjustments
    }

    pub fn image_uri(&self) -> Option<&str> {
        self.image_uri.as_deref()
    }

    /// Show a new photo; the lines start over from their defaults.
    pub fn load_image(&mut self, image_uri: impl Into<String>) {
        self.image_uri = Some(image_uri.into());
        self.reset();
    }

    /// Drop the photo and reset.
    pub fn retake(&mut self) {
        self.image_uri = None;
        self.reset();
    }

    /// Default lines, scale 1.0, neutral adjustments.
    pub fn reset(&mut self) {
        let (line1, line2) = Self::default_lines(&self.view);
        self.line1 = line1;
        self.line2 = line2;
        self.scale = MIN_SCALE;
        self.pinch_initial_distance = 0.0;
        self.pinch_base_scale = MIN_SCALE;
        self.adjustments = DisplayAdjustments::default();
    }

    // ------------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------------

    /// Capture the view at 1x, save it locally, and queue it for upload.
    ///
    /// Capture and local-save failures are returned; the scale is restored on
    /// every path. A failed enqueue is logged and reported as `upload_id: None`.
    pub async fn save(&mut self, host: &dyn CaptureHost, queue: &UploadQueue) -> Result<SaveOutcome> {
        if self.image_uri.is_none() {
            return Err(ScreeningError::Capture {
                message: "No image loaded".to_string(),
            });
        }

        let cobb_angle = self.current_angle();
        let original_scale = self.scale;
        let zoomed = original_scale != MIN_SCALE;

        if zoomed {
            self.scale = MIN_SCALE;
            host.apply_scale(MIN_SCALE).await;
            host.wait_for_render(queue.config().render_settle()).await;
        }

        let captured = host.capture().await;
        let saved = match &captured {
            Ok(uri) => host.save_to_library(uri).await,
            Err(_) => Ok(()),
        };

        if zoomed {
            self.scale = original_scale;
            host.apply_scale(original_scale).await;
        }

        let image_uri = captured?;
        saved?;
        info!(
            "[CobbSession] Saved measurement {:.1}° to {}",
            cobb_angle, image_uri
        );

        let upload_id = match queue
            .enqueue(&image_uri, UploadMetadata::cobb_measurement(cobb_angle))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("[CobbSession] Background upload not queued: {}", e);
                None
            }
        };

        Ok(SaveOutcome {
            image_uri,
            cobb_angle,
            upload_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> MeasurementSession {
        // 300 wide, tall enough that the image area is the full 350
        MeasurementSession::new(ViewDimensions::new(300.0, 800.0))
    }

    #[test]
    fn test_default_state_is_parallel() {
        let s = session();
        assert_eq!(s.line(LineId::Superior).start, Point::new(60.0, 120.0));
        assert_eq!(s.line(LineId::Superior).end, Point::new(220.0, 120.0));
        assert_eq!(s.line(LineId::Inferior).start, Point::new(60.0, 280.0));
        assert!(s.current_angle().abs() < 1e-9);
        assert_eq!(s.severity(), SeverityClass::Normal);
    }

    #[test]
    fn test_image_height_is_capped() {
        assert_eq!(ViewDimensions::new(300.0, 800.0).image_height(), 350.0);
        assert!((ViewDimensions::new(300.0, 600.0).image_height() - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_move_handle_changes_angle_and_clamps() {
        let mut s = session();
        s.move_handle(Handle::new(LineId::Superior, Endpoint::End), -10.0, 40.0);
        assert_eq!(s.line(LineId::Superior).end, Point::new(210.0, 160.0));
        assert!(s.current_angle() > 10.0);

        s.move_handle(Handle::new(LineId::Inferior, Endpoint::Start), -500.0, 500.0);
        assert_eq!(s.line(LineId::Inferior).start, Point::new(10.0, 340.0));
    }

    #[test]
    fn test_move_line_clamps_points_independently() {
        let mut s = session();
        // Start is at x=60, end at x=220 (already past max_x=210 by default).
        s.move_line(LineId::Superior, 30.0, 0.0);
        let l = s.line(LineId::Superior);
        assert_eq!(l.start, Point::new(90.0, 120.0));
        assert_eq!(l.end, Point::new(210.0, 120.0));

        s.move_line(LineId::Superior, 0.0, -200.0);
        let l = s.line(LineId::Superior);
        assert_eq!(l.start.y, 10.0);
        assert_eq!(l.end.y, 10.0);
    }

    #[test]
    fn test_pinch_scale_is_bounded() {
        let mut s = session();
        s.begin_pinch(100.0);
        s.update_pinch(250.0);
        assert!((s.scale() - 2.5).abs() < 1e-9);
        s.update_pinch(1000.0);
        assert_eq!(s.scale(), MAX_SCALE);
        s.end_pinch();

        s.begin_pinch(200.0);
        s.update_pinch(10.0);
        assert_eq!(s.scale(), MIN_SCALE);

        s.begin_pinch(0.0);
        s.update_pinch(500.0);
        assert_eq!(s.scale(), MIN_SCALE);
    }

    #[test]
    fn test_adjustment_overlays() {
        let mut adj = DisplayAdjustments::default();
        assert!(adj.overlays().is_empty());

        adj.set_brightness(1.6);
        adj.set_contrast(0.0);
        adj.toggle_negative();
        assert_eq!(adj.contrast, MIN_ADJUSTMENT);

        let layers = adj.overlays();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].color, OverlayColor::White);
        assert!((layers[0].opacity - 0.3).abs() < 1e-9);
        assert_eq!(layers[1].color, OverlayColor::White);
        assert!((layers[1].opacity - 0.2).abs() < 1e-9);
        assert_eq!(layers[2].blend, BlendMode::Difference);
    }

    #[test]
    fn test_reset_restores_everything() {
        let mut s = session();
        s.move_line(LineId::Inferior, 5.0, 5.0);
        s.set_scale(2.0);
        s.adjustments_mut().toggle_negative();
        s.reset();

        assert!(s.current_angle().abs() < 1e-9);
        assert_eq!(s.line(LineId::Inferior).start, Point::new(60.0, 280.0));
        assert_eq!(s.scale(), 1.0);
        assert!(s.adjustments().is_neutral());
    }

    #[test]
    fn test_load_image_and_retake() {
        let mut s = session();
        s.move_line(LineId::Superior, 0.0, 30.0);
        s.load_image("file:///xray.jpg");
        assert_eq!(s.image_uri(), Some("file:///xray.jpg"));
        assert_eq!(s.line(LineId::Superior).start.y, 120.0);

        s.retake();
        assert!(s.image_uri().is_none());
    }

    #[test]
    fn test_apply_overlay_positions() {
        let mut s = session();
        let analysis = crate::endplates::analyze_spine_image(300.0, 350.0);
        let positions = crate::endplates::to_line_positions(&analysis, 300.0, 350.0).unwrap();
        s.apply_overlay(&positions);
        assert_eq!(s.line(LineId::Superior), positions.line1);
        let expected = angle_between(&positions.line1, &positions.line2);
        assert!((s.current_angle() - expected).abs() < 1e-9);
    }
}
