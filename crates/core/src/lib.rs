//! Signature capture and placement engine.
//!
//! The pipeline runs in three stages: a [`StrokeRecorder`] turns
//! pointer input into an ordered stroke history painted onto a
//! [`DrawingSurface`]; a snapshot of that surface becomes a
//! [`SignatureImage`] that can be placed on document pages as
//! [`Annotation`]s; a [`PlacementExporter`] maps each placement
//! through its [`Viewport`] into document points and flattens it into
//! the output PDF. [`Session`] ties the stages together for embedders.

pub mod annotation;
pub mod drag;
pub mod error;
pub mod export;
pub mod job;
pub mod session;
pub mod stroke;
pub mod surface;
pub mod viewport;

pub use annotation::{Annotation, AnnotationId, AnnotationSet, SignatureImage};
pub use drag::{DragController, DragState, PointerEvent};
pub use error::{EngineError, EngineResult};
pub use export::PlacementExporter;
pub use job::{CancellationToken, ExportJob, ExportSnapshot};
pub use session::{Session, DEFAULT_PLACEMENT};
pub use stroke::{PenStyle, Point, Stroke, StrokeRecorder};
pub use surface::{DrawingSurface, RasterSurface};
pub use viewport::{PointRect, ViewerRect, Viewport};
