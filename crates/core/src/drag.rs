//! Pointer-driven annotation dragging.
//!
//! Translates viewer pointer events into selection and move operations
//! on an [`AnnotationSet`]. The controller holds the grab offset so a
//! drag moves the annotation relative to where it was picked up
//! instead of snapping its corner to the pointer.

use crate::annotation::{AnnotationId, AnnotationSet};

/// A pointer event in viewer logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { page_index: u32, x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    /// Pointer left the viewer; ends any drag in place.
    Leave,
}

/// Current drag phase, reported after every dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        id: AnnotationId,
        /// Pointer position minus the annotation origin at pick-up.
        grab_offset: (f32, f32),
    },
}

/// Single-pointer drag state machine over an annotation set.
#[derive(Debug, Default)]
pub struct DragController {
    state: Option<(AnnotationId, (f32, f32))>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        match self.state {
            Some((id, grab_offset)) => DragState::Dragging { id, grab_offset },
            None => DragState::Idle,
        }
    }

    /// Feed one pointer event.
    ///
    /// Down on an annotation selects it and starts a drag; down on
    /// empty space deselects. Moves while idle are ignored (hover).
    pub fn dispatch(&mut self, set: &mut AnnotationSet, event: PointerEvent) -> DragState {
        match event {
            PointerEvent::Down { page_index, x, y } => {
                match set.hit_test(page_index, x, y) {
                    Some(id) => {
                        set.select(id);
                        let rect = set.get(id).map(|a| a.rect());
                        if let Some(rect) = rect {
                            self.state = Some((id, (x - rect.x, y - rect.y)));
                        }
                    }
                    None => {
                        set.deselect();
                        self.state = None;
                    }
                }
            }
            PointerEvent::Move { x, y } => {
                if let Some((id, (ox, oy))) = self.state {
                    set.move_to(id, x - ox, y - oy);
                }
            }
            PointerEvent::Up | PointerEvent::Leave => {
                self.state = None;
            }
        }
        self.state()
    }
}
