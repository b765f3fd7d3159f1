//! Signing session facade.
//!
//! Owns the drawing pad (recorder + surface + viewport), the document
//! viewer state (annotation set + viewport + page geometries), and the
//! drag controller, and wires them together the way an embedding UI
//! would. Every pad mutation is followed by a full replay so the
//! surface always shows exactly the recorded history.

use crate::annotation::{AnnotationId, AnnotationSet, SignatureImage};
use crate::drag::{DragController, DragState, PointerEvent};
use crate::error::{EngineError, EngineResult};
use crate::job::ExportSnapshot;
use crate::stroke::{PenStyle, Point, StrokeRecorder};
use crate::surface::{DrawingSurface, RasterSurface};
use crate::viewport::{ViewerRect, Viewport};
use inkpad_pdf_engine::PageGeometry;

/// Where a new placement lands before the user drags it.
pub const DEFAULT_PLACEMENT: ViewerRect =
    ViewerRect { x: 100.0, y: 100.0, width: 150.0, height: 60.0 };

/// One user-facing signing session.
pub struct Session<S: DrawingSurface> {
    recorder: StrokeRecorder,
    pad: S,
    pad_viewport: Viewport,
    viewer_viewport: Viewport,
    annotations: AnnotationSet,
    drag: DragController,
    pages: Vec<PageGeometry>,
    renderer_ready: bool,
}

impl Session<RasterSurface> {
    /// Session backed by the CPU rasterizer, the default pad surface.
    pub fn with_raster_pad(
        pad_width: f32,
        pad_height: f32,
        viewer_width: f32,
        viewer_height: f32,
    ) -> Self {
        let pad_viewport = Viewport::new(pad_width, pad_height);
        let (pw, ph) = pad_viewport.physical_size();
        Self::new(RasterSurface::new(pw, ph, 1.0), pad_viewport, viewer_width, viewer_height)
    }
}

impl<S: DrawingSurface> Session<S> {
    pub fn new(pad: S, pad_viewport: Viewport, viewer_width: f32, viewer_height: f32) -> Self {
        Self {
            recorder: StrokeRecorder::new(PenStyle::default()),
            pad,
            pad_viewport,
            viewer_viewport: Viewport::new(viewer_width, viewer_height),
            annotations: AnnotationSet::new(),
            drag: DragController::new(),
            pages: Vec::new(),
            renderer_ready: false,
        }
    }

    /// Run one-time renderer setup. The closure runs on the first call
    /// only; later calls (e.g. repeated mounts) are no-ops.
    pub fn ensure_renderer_init<F: FnOnce()>(&mut self, init: F) {
        if !self.renderer_ready {
            init();
            self.renderer_ready = true;
        }
    }

    /// Load a document described by its page geometries. Placements
    /// from any previous document are discarded.
    pub fn set_document(&mut self, pages: Vec<PageGeometry>) {
        self.pages = pages;
        self.annotations = AnnotationSet::new();
        self.drag = DragController::new();
    }

    pub fn pages(&self) -> &[PageGeometry] {
        &self.pages
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    // --- drawing pad ---

    pub fn pen_down(&mut self, point: Point) -> EngineResult<()> {
        self.recorder.begin_stroke(point)?;
        self.recorder.replay(&mut self.pad);
        Ok(())
    }

    pub fn pen_move(&mut self, point: Point) -> EngineResult<()> {
        self.recorder.extend_stroke(point)?;
        self.recorder.replay(&mut self.pad);
        Ok(())
    }

    pub fn pen_up(&mut self) -> EngineResult<()> {
        self.recorder.end_stroke()?;
        self.recorder.replay(&mut self.pad);
        Ok(())
    }

    pub fn undo_stroke(&mut self) -> EngineResult<()> {
        self.recorder.undo()?;
        self.recorder.replay(&mut self.pad);
        Ok(())
    }

    pub fn clear_pad(&mut self) {
        self.recorder.clear();
        self.recorder.replay(&mut self.pad);
    }

    pub fn is_pad_empty(&self) -> bool {
        self.recorder.is_empty()
    }

    pub fn stroke_count(&self) -> usize {
        self.recorder.stroke_count()
    }

    /// Resize the pad to a new logical size and density. Destructive:
    /// the backing raster is rebuilt at the new physical size and the
    /// stroke history is discarded with it.
    pub fn resize_pad(&mut self, logical_width: f32, logical_height: f32, pixel_density: f32) {
        self.pad_viewport.resize(logical_width, logical_height, pixel_density);
        let (pw, ph) = self.pad_viewport.physical_size();
        self.recorder.clear();
        self.pad.resize_backing(pw, ph, self.pad_viewport.pixel_density);
    }

    pub fn pad_viewport(&self) -> &Viewport {
        &self.pad_viewport
    }

    pub fn pad(&self) -> &S {
        &self.pad
    }

    /// Snapshot the current drawing as a reusable signature image.
    /// Rejected with [`EngineError::EmptyDrawing`] when no stroke has
    /// been completed.
    pub fn save_signature(&mut self) -> EngineResult<SignatureImage> {
        self.recorder.snapshot(&mut self.pad, &self.pad_viewport)
    }

    // --- document viewer ---

    /// Resize the viewer. Non-destructive: placements keep their
    /// logical coordinates and simply cover a different share of the
    /// page.
    pub fn resize_viewer(&mut self, logical_width: f32, logical_height: f32, pixel_density: f32) {
        self.viewer_viewport.resize(logical_width, logical_height, pixel_density);
    }

    pub fn set_viewer_scale(&mut self, scale: f32) {
        self.viewer_viewport.set_scale(scale);
    }

    pub fn viewer_viewport(&self) -> &Viewport {
        &self.viewer_viewport
    }

    /// Place a saved signature at the default rectangle on `page_index`.
    pub fn place_signature(
        &mut self,
        page_index: u32,
        image: SignatureImage,
    ) -> EngineResult<AnnotationId> {
        self.annotations.add(page_index, image, DEFAULT_PLACEMENT, self.page_count())
    }

    /// Feed a viewer pointer event into the drag machinery.
    pub fn viewer_pointer(&mut self, event: PointerEvent) -> DragState {
        self.drag.dispatch(&mut self.annotations, event)
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) {
        self.annotations.remove(id);
    }

    pub fn select_annotation(&mut self, id: AnnotationId) -> bool {
        self.annotations.select(id)
    }

    /// Capture everything an export worker needs. Requires a loaded
    /// document.
    pub fn export_snapshot(&self, source: Vec<u8>) -> EngineResult<ExportSnapshot> {
        if self.pages.is_empty() {
            return Err(EngineError::InvalidState("no document is loaded"));
        }
        Ok(ExportSnapshot {
            source,
            annotations: self.annotations.clone(),
            viewport: self.viewer_viewport,
            pages: self.pages.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter_session() -> Session<RasterSurface> {
        let mut session = Session::with_raster_pad(700.0, 260.0, 600.0, 800.0);
        session.set_document(vec![
            PageGeometry { width_pt: 612.0, height_pt: 792.0 };
            2
        ]);
        session
    }

    fn draw_one_stroke(session: &mut Session<RasterSurface>) {
        session.pen_down(Point::new(20.0, 20.0)).unwrap();
        session.pen_move(Point::new(120.0, 60.0)).unwrap();
        session.pen_up().unwrap();
    }

    #[test]
    fn test_renderer_init_runs_exactly_once() {
        let mut session = letter_session();
        let mut runs = 0;
        session.ensure_renderer_init(|| runs += 1);
        session.ensure_renderer_init(|| runs += 1);
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_resize_pad_rebuilds_backing_at_density() {
        let mut session = letter_session();
        draw_one_stroke(&mut session);

        session.resize_pad(700.0, 260.0, 2.0);
        assert_eq!(session.pad().pixel_dimensions(), (1400, 520));
        // The resize is destructive.
        assert!(session.is_pad_empty());
    }

    #[test]
    fn test_save_signature_requires_ink() {
        let mut session = letter_session();
        assert!(matches!(session.save_signature(), Err(EngineError::EmptyDrawing)));

        draw_one_stroke(&mut session);
        let image = session.save_signature().unwrap();
        assert_eq!(image.logical_size(), (700.0, 260.0));
    }

    #[test]
    fn test_saved_signature_survives_pad_clear() {
        let mut session = letter_session();
        draw_one_stroke(&mut session);
        let image = session.save_signature().unwrap();

        session.clear_pad();
        assert!(session.is_pad_empty());
        // The snapshot still holds the ink drawn before the clear.
        assert!(image.raster().pixels().any(|p| p != &image::Rgba([0xff, 0xff, 0xff, 0xff])));
    }

    #[test]
    fn test_place_and_drag_signature() {
        let mut session = letter_session();
        draw_one_stroke(&mut session);
        let image = session.save_signature().unwrap();
        let id = session.place_signature(0, image).unwrap();

        assert_eq!(session.annotations().get(id).unwrap().rect(), DEFAULT_PLACEMENT);

        session.viewer_pointer(PointerEvent::Down { page_index: 0, x: 110.0, y: 110.0 });
        session.viewer_pointer(PointerEvent::Move { x: 210.0, y: 160.0 });
        session.viewer_pointer(PointerEvent::Up);

        let rect = session.annotations().get(id).unwrap().rect();
        assert_eq!(rect.x, 200.0);
        assert_eq!(rect.y, 150.0);
    }

    #[test]
    fn test_place_rejects_out_of_range_page() {
        let mut session = letter_session();
        draw_one_stroke(&mut session);
        let image = session.save_signature().unwrap();

        let err = session.place_signature(2, image).unwrap_err();
        assert!(matches!(err, EngineError::PageOutOfRange { page: 2, page_count: 2 }));
        assert!(session.annotations().is_empty());
    }

    #[test]
    fn test_set_document_discards_placements() {
        let mut session = letter_session();
        draw_one_stroke(&mut session);
        let image = session.save_signature().unwrap();
        session.place_signature(0, image).unwrap();

        session.set_document(vec![PageGeometry { width_pt: 595.0, height_pt: 842.0 }]);
        assert!(session.annotations().is_empty());
        assert_eq!(session.page_count(), 1);
    }

    #[test]
    fn test_export_snapshot_requires_document() {
        let session = Session::with_raster_pad(700.0, 260.0, 600.0, 800.0);
        assert!(matches!(
            session.export_snapshot(Vec::new()),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_undo_then_redraw_keeps_earlier_ink() {
        let mut session = letter_session();
        draw_one_stroke(&mut session);
        session.pen_down(Point::new(200.0, 200.0)).unwrap();
        session.pen_move(Point::new(300.0, 220.0)).unwrap();
        session.pen_up().unwrap();

        session.undo_stroke().unwrap();
        assert_eq!(session.stroke_count(), 1);
        // The surviving stroke is still painted.
        let raster = session.pad().read_raster();
        assert!(raster.pixels().any(|p| p != &image::Rgba([0xff, 0xff, 0xff, 0xff])));
    }
}
