//! Placed signature instances.
//!
//! An annotation binds one signature image to one document page and a
//! viewer-space rectangle. The set keeps append order (which fixes
//! both z-order and export order) and at most one selection.

use crate::error::{EngineError, EngineResult};
use crate::viewport::ViewerRect;
use image::RgbaImage;
use std::sync::Arc;

/// Unique identifier for a placed annotation, stable for the session.
pub type AnnotationId = uuid::Uuid;

/// Immutable raster snapshot of a drawn signature.
///
/// Shared by reference counting: the image outlives the stroke history
/// that produced it and may be placed on any number of pages. The
/// logical size records the pad presentation at snapshot time.
#[derive(Debug, Clone)]
pub struct SignatureImage {
    raster: Arc<RgbaImage>,
    logical_width: f32,
    logical_height: f32,
}

impl SignatureImage {
    pub fn new(raster: Arc<RgbaImage>, logical_width: f32, logical_height: f32) -> Self {
        Self { raster, logical_width, logical_height }
    }

    pub fn from_raster(raster: RgbaImage, logical_width: f32, logical_height: f32) -> Self {
        Self::new(Arc::new(raster), logical_width, logical_height)
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn logical_size(&self) -> (f32, f32) {
        (self.logical_width, self.logical_height)
    }

    /// Width over height, used for proportional default placements.
    pub fn aspect_ratio(&self) -> f32 {
        if self.logical_height == 0.0 {
            1.0
        } else {
            self.logical_width / self.logical_height
        }
    }

    #[cfg(test)]
    pub(crate) fn raster_arc(&self) -> &Arc<RgbaImage> {
        &self.raster
    }
}

/// One placed signature instance. Position mutates only through
/// [`AnnotationSet::move_to`]; everything else is fixed at creation.
#[derive(Debug, Clone)]
pub struct Annotation {
    id: AnnotationId,
    page_index: u32,
    rect: ViewerRect,
    image: SignatureImage,
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn rect(&self) -> ViewerRect {
        self.rect
    }

    pub fn image(&self) -> &SignatureImage {
        &self.image
    }
}

/// Append-ordered collection of placed signatures with at most one
/// selected entry.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    entries: Vec<Annotation>,
    selected: Option<AnnotationId>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a signature on a page. The page index is validated here,
    /// at add time, never deferred to export. The new annotation
    /// becomes the selection.
    pub fn add(
        &mut self,
        page_index: u32,
        image: SignatureImage,
        rect: ViewerRect,
        page_count: u32,
    ) -> EngineResult<AnnotationId> {
        if page_index >= page_count {
            return Err(EngineError::PageOutOfRange { page: page_index, page_count });
        }

        let id = AnnotationId::new_v4();
        self.entries.push(Annotation { id, page_index, rect, image });
        self.selected = Some(id);
        Ok(id)
    }

    /// Delete an entry; no-op if the id is absent. Clears the
    /// selection when it pointed at the removed entry.
    pub fn remove(&mut self, id: AnnotationId) {
        self.entries.retain(|annotation| annotation.id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    /// Move the selected annotation. Positions clamp to >= 0 on both
    /// axes. Silently ignored unless `id` is the current selection,
    /// matching single-pointer drag semantics.
    pub fn move_to(&mut self, id: AnnotationId, x: f32, y: f32) {
        if self.selected != Some(id) {
            return;
        }
        if let Some(annotation) = self.entries.iter_mut().find(|a| a.id == id) {
            annotation.rect.x = x.max(0.0);
            annotation.rect.y = y.max(0.0);
        }
    }

    /// Select an annotation; returns false (selection unchanged) for
    /// an unknown id.
    pub fn select(&mut self, id: AnnotationId) -> bool {
        if self.entries.iter().any(|annotation| annotation.id == id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.entries.iter().find(|annotation| annotation.id == id)
    }

    /// Annotations bound to `page_index`, in append order. Restartable
    /// by calling again; used for overlay rendering and export.
    pub fn for_page(&self, page_index: u32) -> impl Iterator<Item = &Annotation> + '_ {
        self.entries.iter().filter(move |annotation| annotation.page_index == page_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Topmost annotation on the page containing the point, i.e. the
    /// last-appended hit (append order is z-order).
    pub fn hit_test(&self, page_index: u32, x: f32, y: f32) -> Option<AnnotationId> {
        self.entries
            .iter()
            .rev()
            .find(|annotation| {
                annotation.page_index == page_index && annotation.rect.contains(x, y)
            })
            .map(|annotation| annotation.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image() -> SignatureImage {
        SignatureImage::from_raster(RgbaImage::new(140, 52), 700.0, 260.0)
    }

    fn default_rect() -> ViewerRect {
        ViewerRect::new(100.0, 100.0, 150.0, 60.0)
    }

    #[test]
    fn test_add_selects_new_annotation() {
        let mut set = AnnotationSet::new();
        let id = set.add(0, test_image(), default_rect(), 3).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.selected(), Some(id));
        assert_eq!(set.get(id).unwrap().page_index(), 0);
    }

    #[test]
    fn test_add_rejects_out_of_range_page() {
        let mut set = AnnotationSet::new();
        let err = set.add(3, test_image(), default_rect(), 3).unwrap_err();

        assert!(matches!(err, EngineError::PageOutOfRange { page: 3, page_count: 3 }));
        assert!(set.is_empty());
        assert_eq!(set.selected(), None);
    }

    #[test]
    fn test_remove_clears_matching_selection() {
        let mut set = AnnotationSet::new();
        let first = set.add(0, test_image(), default_rect(), 1).unwrap();
        let second = set.add(0, test_image(), default_rect(), 1).unwrap();

        // Second is selected; removing first keeps it.
        set.remove(first);
        assert_eq!(set.selected(), Some(second));

        set.remove(second);
        assert_eq!(set.selected(), None);
        assert!(set.is_empty());

        // Removing an absent id is a no-op.
        set.remove(second);
    }

    #[test]
    fn test_move_to_requires_selection() {
        let mut set = AnnotationSet::new();
        let first = set.add(0, test_image(), default_rect(), 1).unwrap();
        let _second = set.add(0, test_image(), default_rect(), 1).unwrap();

        // first is no longer selected, so this is a no-op.
        set.move_to(first, 300.0, 300.0);
        assert_eq!(set.get(first).unwrap().rect(), default_rect());

        set.select(first);
        set.move_to(first, 300.0, 300.0);
        assert_eq!(set.get(first).unwrap().rect().x, 300.0);
        assert_eq!(set.get(first).unwrap().rect().y, 300.0);
    }

    #[test]
    fn test_move_to_clamps_negative_positions() {
        let mut set = AnnotationSet::new();
        let id = set.add(0, test_image(), default_rect(), 1).unwrap();

        set.move_to(id, -40.0, -3.0);
        let rect = set.get(id).unwrap().rect();
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn test_select_unknown_id_is_rejected() {
        let mut set = AnnotationSet::new();
        let id = set.add(0, test_image(), default_rect(), 1).unwrap();

        assert!(!set.select(AnnotationId::new_v4()));
        assert_eq!(set.selected(), Some(id));

        set.deselect();
        assert_eq!(set.selected(), None);
    }

    #[test]
    fn test_for_page_preserves_append_order() {
        let mut set = AnnotationSet::new();
        let a = set.add(1, test_image(), ViewerRect::new(0.0, 0.0, 10.0, 10.0), 2).unwrap();
        let _other_page = set.add(0, test_image(), default_rect(), 2).unwrap();
        let b = set.add(1, test_image(), ViewerRect::new(20.0, 0.0, 10.0, 10.0), 2).unwrap();

        let ids: Vec<_> = set.for_page(1).map(Annotation::id).collect();
        assert_eq!(ids, vec![a, b]);

        // Restartable: a second pass yields the same sequence.
        let again: Vec<_> = set.for_page(1).map(Annotation::id).collect();
        assert_eq!(again, ids);
    }

    #[test]
    fn test_hit_test_picks_topmost() {
        let mut set = AnnotationSet::new();
        let below = set.add(0, test_image(), ViewerRect::new(50.0, 50.0, 100.0, 40.0), 1).unwrap();
        let above = set.add(0, test_image(), ViewerRect::new(60.0, 55.0, 100.0, 40.0), 1).unwrap();

        // Overlap region hits the later-appended entry.
        assert_eq!(set.hit_test(0, 70.0, 60.0), Some(above));
        // Region only the first covers.
        assert_eq!(set.hit_test(0, 51.0, 51.0), Some(below));
        // Wrong page or empty space miss.
        assert_eq!(set.hit_test(1, 70.0, 60.0), None);
        assert_eq!(set.hit_test(0, 5.0, 5.0), None);
    }

    #[test]
    fn test_shared_image_is_reference_counted() {
        let image = test_image();
        let mut set = AnnotationSet::new();
        set.add(0, image.clone(), default_rect(), 1).unwrap();
        set.add(0, image.clone(), default_rect(), 1).unwrap();

        // Base + two placements.
        assert_eq!(Arc::strong_count(image.raster_arc()), 3);
    }
}
