//! Flattened placement export.
//!
//! Maps every placed annotation from viewer pixels into document
//! points and embeds its raster into the source document via the PDF
//! backend. The exporter is pure over its inputs: the same source
//! bytes, annotation set, and viewport produce byte-identical output.

use crate::annotation::AnnotationSet;
use crate::error::{EngineError, EngineResult};
use crate::job::CancellationToken;
use crate::viewport::Viewport;
use inkpad_pdf_engine::{PageGeometry, PdfBackend};
use std::collections::BTreeMap;

pub struct PlacementExporter;

impl PlacementExporter {
    /// Embed all annotations into `source` and return the new document
    /// bytes. The source is never modified; an error yields no partial
    /// output. Annotations are processed grouped by page, in append
    /// order within each page, and the token is checked before each
    /// one.
    pub fn export(
        backend: &mut dyn PdfBackend,
        source: &[u8],
        annotations: &AnnotationSet,
        viewport: &Viewport,
        pages: &[PageGeometry],
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let handle = backend.open(source.to_vec())?;
        let result = Self::embed_all(backend, handle, annotations, viewport, pages, cancel)
            .and_then(|()| backend.save(handle).map_err(EngineError::from));
        // Drop the working document whether or not the export
        // succeeded; a close failure cannot change the outcome.
        let _ = backend.close(handle);
        result
    }

    fn embed_all(
        backend: &mut dyn PdfBackend,
        handle: inkpad_pdf_engine::DocumentHandle,
        annotations: &AnnotationSet,
        viewport: &Viewport,
        pages: &[PageGeometry],
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        // Group by page so all of a page's images land together, and
        // iterate pages in ascending order for deterministic object
        // numbering.
        let mut by_page: BTreeMap<u32, Vec<&crate::annotation::Annotation>> = BTreeMap::new();
        for annotation in annotations.iter() {
            by_page.entry(annotation.page_index()).or_default().push(annotation);
        }

        for (page_index, placed) in by_page {
            let page = *pages.get(page_index as usize).ok_or(EngineError::PageOutOfRange {
                page: page_index,
                page_count: pages.len() as u32,
            })?;

            for annotation in placed {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                let rect = viewport.to_document_points(annotation.rect(), page);
                backend.embed_image(
                    handle,
                    page_index,
                    annotation.image().raster(),
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::SignatureImage;
    use crate::viewport::ViewerRect;
    use image::{Rgba, RgbaImage};
    use inkpad_pdf_engine::{default_backend, fixtures};

    fn letter_pages(count: usize) -> Vec<PageGeometry> {
        vec![PageGeometry { width_pt: 612.0, height_pt: 792.0 }; count]
    }

    fn signature() -> SignatureImage {
        SignatureImage::from_raster(
            RgbaImage::from_pixel(140, 52, Rgba([0x0f, 0x17, 0x2a, 0xff])),
            700.0,
            260.0,
        )
    }

    #[test]
    fn test_empty_set_round_trips_the_document() {
        let source = fixtures::letter_pdf(3);
        let mut backend = default_backend();

        let exported = PlacementExporter::export(
            &mut backend,
            &source,
            &AnnotationSet::new(),
            &Viewport::new(600.0, 800.0),
            &letter_pages(3),
            &CancellationToken::new(),
        )
        .unwrap();

        let handle = backend.open(exported.clone()).unwrap();
        assert_eq!(backend.page_count(handle).unwrap(), 3);
        backend.close(handle).unwrap();
        for page in 0..3 {
            assert_eq!(fixtures::page_image_count(&exported, page), 0);
        }
    }

    #[test]
    fn test_annotations_land_on_their_own_pages() {
        let source = fixtures::letter_pdf(3);
        let mut annotations = AnnotationSet::new();
        annotations.add(0, signature(), ViewerRect::new(100.0, 100.0, 150.0, 60.0), 3).unwrap();
        annotations.add(2, signature(), ViewerRect::new(50.0, 600.0, 150.0, 60.0), 3).unwrap();
        annotations.add(2, signature(), ViewerRect::new(300.0, 300.0, 150.0, 60.0), 3).unwrap();

        let mut backend = default_backend();
        let exported = PlacementExporter::export(
            &mut backend,
            &source,
            &annotations,
            &Viewport::new(600.0, 800.0),
            &letter_pages(3),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(fixtures::page_image_count(&exported, 0), 1);
        assert_eq!(fixtures::page_image_count(&exported, 1), 0);
        assert_eq!(fixtures::page_image_count(&exported, 2), 2);
    }

    #[test]
    fn test_export_is_deterministic() {
        let source = fixtures::letter_pdf(2);
        let mut annotations = AnnotationSet::new();
        annotations.add(1, signature(), ViewerRect::new(100.0, 100.0, 150.0, 60.0), 2).unwrap();
        let viewport = Viewport::new(600.0, 800.0);

        let mut backend = default_backend();
        let first = PlacementExporter::export(
            &mut backend,
            &source,
            &annotations,
            &viewport,
            &letter_pages(2),
            &CancellationToken::new(),
        )
        .unwrap();
        let second = PlacementExporter::export(
            &mut backend,
            &source,
            &annotations,
            &viewport,
            &letter_pages(2),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_source_is_rejected_without_output() {
        let mut backend = default_backend();
        let err = PlacementExporter::export(
            &mut backend,
            b"not a document",
            &AnnotationSet::new(),
            &Viewport::new(600.0, 800.0),
            &letter_pages(1),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::CorruptDocument(_)));
    }

    #[test]
    fn test_pre_cancelled_token_aborts_before_opening() {
        let token = CancellationToken::new();
        token.cancel();

        let mut backend = default_backend();
        let err = PlacementExporter::export(
            &mut backend,
            &fixtures::letter_pdf(1),
            &AnnotationSet::new(),
            &Viewport::new(600.0, 800.0),
            &letter_pages(1),
            &token,
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
    }
}
