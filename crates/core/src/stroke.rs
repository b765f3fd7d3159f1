//! Freehand stroke capture.
//!
//! Converts raw pointer input into an ordered stroke history. Strokes
//! are immutable once the pointer lifts; the history supports exactly
//! two mutations, undo of the most recent stroke and a full clear.

use crate::error::{EngineError, EngineResult};
use crate::surface::DrawingSurface;
use crate::viewport::Viewport;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single sampled pointer position in the drawing surface's logical
/// pixel space. The timestamp (milliseconds, monotonically increasing
/// within a stroke) feeds velocity-based pen width when present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, time: None }
    }

    pub fn with_time(x: f32, y: f32, time: f64) -> Self {
        Self { x, y, time: Some(time) }
    }

    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One continuous pointer-down-to-pointer-up ink path. Non-empty by
/// construction and immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke(Vec<Point>);

impl Stroke {
    pub(crate) fn from_points(points: Vec<Point>) -> Self {
        debug_assert!(!points.is_empty(), "a stroke always holds at least one point");
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ink appearance and sampling configuration.
///
/// Defaults match the signature pad this engine replaces: dark slate
/// ink on a white background, pen width between 0.5 and 2.5 logical
/// pixels mapped from pointer velocity, and a 5 px minimum distance
/// between recorded points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenStyle {
    pub color: Rgba<u8>,
    pub background: Rgba<u8>,
    pub min_width: f32,
    pub max_width: f32,
    /// Points closer than this to the last recorded point are dropped.
    pub min_distance: f32,
    /// Exponential smoothing weight for the velocity estimate.
    pub velocity_filter_weight: f32,
}

impl Default for PenStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0x0f, 0x17, 0x2a, 0xff]),
            background: Rgba([0xff, 0xff, 0xff, 0xff]),
            min_width: 0.5,
            max_width: 2.5,
            min_distance: 5.0,
            velocity_filter_weight: 0.7,
        }
    }
}

impl PenStyle {
    /// Pen width for a (filtered) pointer velocity in px/ms. Slow
    /// strokes draw at full width, fast strokes thin out.
    pub fn width_for_velocity(&self, velocity: f32) -> f32 {
        (self.max_width / (velocity + 1.0)).clamp(self.min_width, self.max_width)
    }

    /// Diameter used for an isolated dot (a stroke with one point).
    pub fn dot_size(&self) -> f32 {
        (self.min_width + self.max_width) / 2.0
    }
}

/// Records pointer input into a stroke history and owns single-stroke
/// undo.
///
/// Every mutation is followed by a full replay onto the drawing
/// surface (never an incremental patch) so undo and clear are always
/// visually exact; the [`Session`](crate::session::Session) drives
/// that redraw.
#[derive(Debug, Default)]
pub struct StrokeRecorder {
    style: PenStyle,
    open: Option<Vec<Point>>,
    history: Vec<Stroke>,
}

impl StrokeRecorder {
    pub fn new(style: PenStyle) -> Self {
        Self { style, open: None, history: Vec::new() }
    }

    pub fn style(&self) -> &PenStyle {
        &self.style
    }

    /// Open a new stroke at `point`.
    pub fn begin_stroke(&mut self, point: Point) -> EngineResult<()> {
        if self.open.is_some() {
            return Err(EngineError::InvalidState("a stroke is already open"));
        }
        self.open = Some(vec![point]);
        Ok(())
    }

    /// Append to the open stroke. Points within `min_distance` of the
    /// last recorded point are dropped silently to avoid redundant
    /// density; that is a no-op, not an error.
    pub fn extend_stroke(&mut self, point: Point) -> EngineResult<()> {
        let min_distance = self.style.min_distance;
        let points = self
            .open
            .as_mut()
            .ok_or(EngineError::InvalidState("no stroke is open"))?;

        let last = points.last().expect("an open stroke always holds at least one point");
        if last.distance_to(&point) < min_distance {
            return Ok(());
        }
        points.push(point);
        Ok(())
    }

    /// Close the open stroke and append it to the history.
    pub fn end_stroke(&mut self) -> EngineResult<()> {
        let points = self.open.take().ok_or(EngineError::InvalidState("no stroke is open"))?;
        self.history.push(Stroke::from_points(points));
        Ok(())
    }

    /// Remove the most recently completed stroke. No-op on an empty
    /// history; rejected while a stroke is open.
    pub fn undo(&mut self) -> EngineResult<()> {
        if self.open.is_some() {
            return Err(EngineError::InvalidState("cannot undo while a stroke is open"));
        }
        self.history.pop();
        Ok(())
    }

    /// Empty the history unconditionally, silently discarding any open
    /// stroke.
    pub fn clear(&mut self) {
        self.open = None;
        self.history.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn stroke_count(&self) -> usize {
        self.history.len()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.history
    }

    /// Redraw the surface from scratch: clear, then replay every
    /// completed stroke in drawing order, then the open stroke (if
    /// any) for live feedback.
    pub fn replay(&self, surface: &mut dyn DrawingSurface) {
        surface.clear();
        for stroke in &self.history {
            surface.paint_stroke(stroke.points(), &self.style);
        }
        if let Some(points) = &self.open {
            surface.paint_stroke(points, &self.style);
        }
    }

    /// Render the history into a reusable signature image.
    ///
    /// The image's logical size comes from `viewport` (the pad's
    /// presentation), its raster from the surface backing.
    pub fn snapshot(
        &self,
        surface: &mut dyn DrawingSurface,
        viewport: &Viewport,
    ) -> EngineResult<crate::annotation::SignatureImage> {
        if self.is_empty() {
            return Err(EngineError::EmptyDrawing);
        }
        self.replay(surface);
        Ok(crate::annotation::SignatureImage::new(
            Arc::new(surface.read_raster()),
            viewport.logical_width,
            viewport.logical_height,
        ))
    }
}
