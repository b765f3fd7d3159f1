//! PDF document backend for signature placement.
//!
//! Exposes the document collaborator contract the engine depends on:
//! decode a PDF from bytes, report per-page geometry, flatten raster
//! images into page content at document-point coordinates, and
//! serialize the result back to bytes. The default backend is pure
//! Rust on top of `lopdf`.

use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Opaque handle to an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Intrinsic page size in document points (1/72 inch), origin at the
/// bottom-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum PdfBackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Document decode/encode contract consumed by the placement engine.
///
/// Coordinates given to `embed_image` are document points with the
/// PDF's bottom-left origin; (x, y) names the bottom-left corner of
/// the destination rectangle.
pub trait PdfBackend {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, PdfBackendError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfBackendError>;
    fn page_geometry(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageGeometry, PdfBackendError>;
    fn embed_image(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        raster: &RgbaImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), PdfBackendError>;
    fn save(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfBackendError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfBackendError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    doc: Document,
    /// Page object ids in document order.
    page_ids: Vec<ObjectId>,
    geometries: Vec<PageGeometry>,
    /// Number of images embedded so far, used for XObject naming.
    image_count: usize,
}

/// Pure-Rust backend over `lopdf`.
#[derive(Debug, Default)]
pub struct LopdfBackend {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: &[u8]) -> Result<(Document, Vec<ObjectId>, Vec<PageGeometry>), PdfBackendError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfBackendError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut page_ids = Vec::with_capacity(pages.len());
        let mut geometries = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let geometry = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageGeometry { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                .unwrap_or(PageGeometry { width_pt: 612.0, height_pt: 792.0 });

            page_ids.push(object_id);
            geometries.push(geometry);
        }

        if page_ids.is_empty() {
            return Err(PdfBackendError::Backend("document has no pages".to_owned()));
        }

        Ok((doc, page_ids, geometries))
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfBackendError> {
        self.docs.get(&handle).ok_or(PdfBackendError::InvalidHandle(handle.raw()))
    }

    fn record_mut(&mut self, handle: DocumentHandle) -> Result<&mut DocumentRecord, PdfBackendError> {
        self.docs.get_mut(&handle).ok_or(PdfBackendError::InvalidHandle(handle.raw()))
    }
}

/// Split an RGBA raster into its RGB samples and alpha channel, the two
/// streams a PDF image XObject with a soft mask needs.
fn split_channels(raster: &RgbaImage) -> (Vec<u8>, Vec<u8>) {
    let pixel_count = (raster.width() * raster.height()) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);

    for pixel in raster.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    (rgb, alpha)
}

/// Build the image XObject (plus its DeviceGray soft mask) and return
/// the XObject's id.
fn add_image_xobject(doc: &mut Document, raster: &RgbaImage) -> ObjectId {
    let (rgb, alpha) = split_channels(raster);
    let width = raster.width() as i64;
    let height = raster.height() as i64;

    let smask_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    )));

    doc.add_object(Object::Stream(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => Object::Reference(smask_id),
        },
        rgb,
    )))
}

/// Register `xobject_id` under `name` in the page's resource
/// dictionary, creating `/Resources` or `/XObject` as needed.
///
/// Indirect dictionaries are resolved to owned copies and written back
/// inline, which sidesteps shared-resource aliasing when the same
/// resource object is referenced from several pages.
fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<(), PdfBackendError> {
    let resources_entry = doc.get_dictionary(page_id)?.get(b"Resources").ok().cloned();

    let mut resources = match resources_entry {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc.get_dictionary(id)?.clone(),
        _ => Dictionary::new(),
    };

    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
        _ => Dictionary::new(),
    };

    xobjects.set(name, Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));

    Ok(())
}

/// Append a content stream painting `name` into the given rectangle
/// (document points, bottom-left anchor) to the page's content list.
fn append_draw_content(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> Result<(), PdfBackendError> {
    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                width.into(),
                0f32.into(),
                0f32.into(),
                height.into(),
                x.into(),
                y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ];

    let encoded = Content { operations }
        .encode()
        .map_err(|err| PdfBackendError::Backend(err.to_string()))?;
    let stream_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, encoded)));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(existing)) => {
            Object::Array(vec![Object::Reference(*existing), Object::Reference(stream_id)])
        }
        Ok(Object::Array(existing)) => {
            let mut streams = existing.clone();
            streams.push(Object::Reference(stream_id));
            Object::Array(streams)
        }
        _ => Object::Reference(stream_id),
    };
    page.set("Contents", contents);

    Ok(())
}

impl PdfBackend for LopdfBackend {
    fn open(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, PdfBackendError> {
        let (doc, page_ids, geometries) = Self::parse(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { doc, page_ids, geometries, image_count: 0 });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfBackendError> {
        Ok(self.record(handle)?.page_ids.len() as u32)
    }

    fn page_geometry(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageGeometry, PdfBackendError> {
        let record = self.record(handle)?;
        record.geometries.get(page_index as usize).copied().ok_or(
            PdfBackendError::PageOutOfRange {
                page: page_index,
                page_count: record.geometries.len() as u32,
            },
        )
    }

    fn embed_image(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        raster: &RgbaImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), PdfBackendError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(PdfBackendError::Backend("cannot embed an empty raster".to_owned()));
        }

        let record = self.record_mut(handle)?;
        let page_id = *record.page_ids.get(page_index as usize).ok_or(
            PdfBackendError::PageOutOfRange {
                page: page_index,
                page_count: record.page_ids.len() as u32,
            },
        )?;

        let name = format!("InkSig{}", record.image_count);
        record.image_count += 1;

        let xobject_id = add_image_xobject(&mut record.doc, raster);
        register_xobject(&mut record.doc, page_id, &name, xobject_id)?;
        append_draw_content(&mut record.doc, page_id, &name, x, y, width, height)?;

        Ok(())
    }

    fn save(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfBackendError> {
        // save_to renumbers objects in place; serialize a copy so the
        // open document stays valid for further embedding.
        let mut doc = self.record(handle)?.doc.clone();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfBackendError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfBackendError::InvalidHandle(handle.raw()))
    }
}

pub fn default_backend() -> LopdfBackend {
    LopdfBackend::new()
}

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    //! Programmatic PDF builders for tests across the workspace.

    use lopdf::{dictionary, Document, Object};

    /// A minimal n-page PDF with the given page size in points.
    pub fn pdf_with_pages(pages: usize, width_pt: f32, height_pt: f32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(pages);
        for _ in 0..pages {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(width_pt),
                    Object::Real(height_pt),
                ],
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture PDF should serialize");
        bytes
    }

    /// US Letter pages, the geometry the engine's scenarios assume.
    pub fn letter_pdf(pages: usize) -> Vec<u8> {
        pdf_with_pages(pages, 612.0, 792.0)
    }

    /// Count image XObjects reachable from a page's resources.
    pub fn page_image_count(bytes: &[u8], page_index: usize) -> usize {
        let doc = Document::load_mem(bytes).expect("exported bytes should parse");
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        let page = doc.get_dictionary(pages[page_index]).expect("page dictionary");

        let resources = match page.get(b"Resources") {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            Ok(Object::Reference(id)) => {
                doc.get_dictionary(*id).expect("resources dictionary").clone()
            }
            _ => return 0,
        };

        match resources.get(b"XObject") {
            Ok(Object::Dictionary(xobjects)) => xobjects.len(),
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).map(|d| d.len()).unwrap_or(0),
            _ => 0,
        }
    }
}
