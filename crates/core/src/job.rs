//! Background export jobs.
//!
//! An export runs on a worker thread over a snapshot of the session
//! state taken at spawn time, so the user can keep dragging
//! annotations while the previous request writes out. Cancellation is
//! cooperative: the exporter polls the token between annotations.

use crate::annotation::AnnotationSet;
use crate::error::{EngineError, EngineResult};
use crate::export::PlacementExporter;
use crate::viewport::Viewport;
use inkpad_pdf_engine::{PageGeometry, PdfBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Shared cancellation flag, cheap to clone across threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Everything an export needs, detached from the live session. Taken
/// by value so session mutations after spawn cannot affect the output.
#[derive(Debug, Clone)]
pub struct ExportSnapshot {
    pub source: Vec<u8>,
    pub annotations: AnnotationSet,
    pub viewport: Viewport,
    pub pages: Vec<PageGeometry>,
}

/// Handle to one in-flight export.
pub struct ExportJob {
    token: CancellationToken,
    handle: JoinHandle<EngineResult<Vec<u8>>>,
}

impl ExportJob {
    /// Run the export on a fresh worker thread.
    pub fn spawn<B>(mut backend: B, snapshot: ExportSnapshot) -> Self
    where
        B: PdfBackend + Send + 'static,
    {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let handle = std::thread::spawn(move || {
            PlacementExporter::export(
                &mut backend,
                &snapshot.source,
                &snapshot.annotations,
                &snapshot.viewport,
                &snapshot.pages,
                &worker_token,
            )
        });
        Self { token, handle }
    }

    /// Request cancellation. The worker notices at its next
    /// per-annotation check and returns [`EngineError::Cancelled`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return the exported bytes.
    pub fn join(self) -> EngineResult<Vec<u8>> {
        self.handle
            .join()
            .map_err(|_| EngineError::InvalidState("export worker panicked"))?
    }
}
