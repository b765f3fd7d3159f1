//! Viewport state and coordinate conversion.
//!
//! A viewport describes how a surface (the drawing pad or a document
//! page) is currently presented: zoom scale, device pixel density, and
//! logical display size. Scale and density are deliberately
//! orthogonal: density only affects raster crispness, scale only the
//! logical-to-document ratio, so zooming never requires re-snapshotting
//! ink and resizing the pad never invalidates document placements.

use inkpad_pdf_engine::PageGeometry;

/// Axis-aligned rectangle in viewer logical pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewerRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Axis-aligned rectangle in document points, bottom-left origin;
/// (x, y) is the rectangle's bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Live presentation state of one surface. The drawing pad and the
/// document viewer each own an independent instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Zoom factor, > 0.
    pub scale: f32,
    /// Device pixels per logical pixel, >= 1.
    pub pixel_density: f32,
    pub logical_width: f32,
    pub logical_height: f32,
}

impl Viewport {
    pub fn new(logical_width: f32, logical_height: f32) -> Self {
        Self { scale: 1.0, pixel_density: 1.0, logical_width, logical_height }
    }

    /// Record a new logical size and density, e.g. after a container
    /// resize. Whether this destroys content is the owner's concern:
    /// the pad clears its ink, the viewer keeps its annotations
    /// (their coordinates are logical, hence density-independent).
    pub fn resize(&mut self, logical_width: f32, logical_height: f32, pixel_density: f32) {
        self.logical_width = logical_width;
        self.logical_height = logical_height;
        self.pixel_density = pixel_density.max(1.0);
    }

    /// Apply a new zoom factor, rescaling the logical display size so
    /// conversions keep using live displayed dimensions.
    pub fn set_scale(&mut self, scale: f32) {
        let scale = scale.max(f32::EPSILON);
        let ratio = scale / self.scale;
        self.logical_width *= ratio;
        self.logical_height *= ratio;
        self.scale = scale;
    }

    /// Physical backing size: `round(logical * density)` per axis.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.logical_width * self.pixel_density).round() as u32,
            (self.logical_height * self.pixel_density).round() as u32,
        )
    }

    /// Map a viewer-space rectangle into document points.
    ///
    /// Uses the ratio of the live logical display size to the page's
    /// intrinsic point size, and flips the vertical axis (viewer
    /// top-left origin, document bottom-left origin). The stored y
    /// denotes the rectangle's top edge in viewer space and its bottom
    /// edge in point space, hence the height subtraction.
    pub fn to_document_points(&self, rect: ViewerRect, page: PageGeometry) -> PointRect {
        let width = rect.width / self.logical_width * page.width_pt;
        let height = rect.height / self.logical_height * page.height_pt;
        let x = rect.x / self.logical_width * page.width_pt;
        let y = page.height_pt - (rect.y / self.logical_height * page.height_pt) - height;
        PointRect { x, y, width, height }
    }

    /// Inverse of [`to_document_points`](Self::to_document_points).
    pub fn to_viewer_pixels(&self, rect: PointRect, page: PageGeometry) -> ViewerRect {
        let width = rect.width / page.width_pt * self.logical_width;
        let height = rect.height / page.height_pt * self.logical_height;
        let x = rect.x / page.width_pt * self.logical_width;
        let y = (page.height_pt - rect.y - rect.height) / page.height_pt * self.logical_height;
        ViewerRect { x, y, width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageGeometry = PageGeometry { width_pt: 612.0, height_pt: 792.0 };

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_resize_recomputes_physical_size() {
        let mut viewport = Viewport::new(700.0, 260.0);
        viewport.resize(700.0, 260.0, 2.0);
        assert_eq!(viewport.physical_size(), (1400, 520));
    }

    #[test]
    fn test_density_below_one_is_clamped() {
        let mut viewport = Viewport::new(100.0, 100.0);
        viewport.resize(100.0, 100.0, 0.5);
        assert_eq!(viewport.pixel_density, 1.0);
    }

    #[test]
    fn test_physical_size_rounds_half_pixels() {
        let mut viewport = Viewport::new(701.0, 260.0);
        viewport.resize(701.0, 260.0, 1.5);
        // 701 * 1.5 = 1051.5 rounds up.
        assert_eq!(viewport.physical_size(), (1052, 390));
    }

    #[test]
    fn test_to_document_points_letter_page() {
        let viewport = Viewport::new(600.0, 800.0);
        let rect = viewport.to_document_points(ViewerRect::new(100.0, 100.0, 150.0, 60.0), LETTER);

        assert_close(rect.x, 102.0);
        assert_close(rect.width, 153.0);
        assert_close(rect.height, 59.4);
        // 792 - 99 - 59.4
        assert_close(rect.y, 633.6);
    }

    #[test]
    fn test_conversion_tracks_live_viewer_size() {
        let mut viewport = Viewport::new(600.0, 800.0);
        let rect = ViewerRect::new(100.0, 100.0, 150.0, 60.0);
        let before = viewport.to_document_points(rect, LETTER);

        viewport.resize(300.0, 400.0, 1.0);
        let after = viewport.to_document_points(rect, LETTER);

        // Same viewer rect on a half-size viewer covers twice the page.
        assert_close(after.width, before.width * 2.0);
        assert_close(after.x, before.x * 2.0);
    }

    #[test]
    fn test_set_scale_rescales_logical_size() {
        let mut viewport = Viewport::new(600.0, 800.0);
        viewport.set_scale(2.0);
        assert_close(viewport.logical_width, 1200.0);
        assert_close(viewport.logical_height, 1600.0);

        viewport.set_scale(1.0);
        assert_close(viewport.logical_width, 600.0);
        assert_close(viewport.logical_height, 800.0);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let viewport = Viewport::new(640.0, 920.0);
        let original = ViewerRect::new(37.5, 210.25, 144.0, 58.5);

        let points = viewport.to_document_points(original, LETTER);
        let back = viewport.to_viewer_pixels(points, LETTER);

        assert_close(back.x, original.x);
        assert_close(back.y, original.y);
        assert_close(back.width, original.width);
        assert_close(back.height, original.height);
    }

    #[test]
    fn test_round_trip_at_zoom() {
        let mut viewport = Viewport::new(600.0, 800.0);
        viewport.set_scale(1.75);
        let original = ViewerRect::new(250.0, 91.0, 180.0, 72.0);

        let points = viewport.to_document_points(original, LETTER);
        let back = viewport.to_viewer_pixels(points, LETTER);

        assert_close(back.x, original.x);
        assert_close(back.y, original.y);
        assert_close(back.width, original.width);
        assert_close(back.height, original.height);
    }
}
