//! Engine error taxonomy.

use inkpad_pdf_engine::PdfBackendError;

/// Errors surfaced by the capture and placement engine.
///
/// `InvalidState` and `EmptyDrawing` are caller-fixable preconditions:
/// the operation is rejected and engine state is left unchanged.
/// `CorruptDocument` aborts an export with no partial output. The
/// engine never retries internally.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("operation out of sequence: {0}")]
    InvalidState(&'static str),
    #[error("snapshot requested with no ink present")]
    EmptyDrawing,
    #[error("document decode/encode failed: {0}")]
    CorruptDocument(#[from] PdfBackendError),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("export was cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;
