//! PDF parsing and page rendering via Google PDFium.
//!
//! `PdfiumBackend` is stateless (`Send + Sync`). Each document opens a
//! fresh `Pdfium` instance because the upstream type is `!Send`. The OS
//! caches `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.
//! The library is only loaded when a PDF is opened, so text and image
//! uploads work on machines without PDFium.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::{PdfBackend, PdfDocumentHandle, TextFragment};
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd scale settings.
const MAX_DIMENSION_PX: u32 = 4096;

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumBackend;

impl PdfiumBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path)
/// 2. Alongside the running executable
/// 3. `<exe_dir>/resources/pdfium/{bin,lib}/` and `<exe_dir>/../lib/`
/// 4. System library search paths
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::EngineUnavailable(format!("Failed to load PDFium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [
                exe_dir.to_path_buf(),
                exe_dir.join("resources").join("pdfium").join("bin"),
                exe_dir.join("resources").join("pdfium").join("lib"),
                exe_dir.join("..").join("lib"),
            ];

            for dir in &candidates {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::EngineUnavailable(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Encrypted documents get their own wording; everything else is a parse failure.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfParse("the document is password protected".into())
    } else {
        ExtractionError::PdfParse(msg)
    }
}

/// Pixel dimensions for rendering a page at `scale` times its point size.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
pub fn compute_render_dimensions(width_points: f32, height_points: f32, scale: f32) -> (u32, u32) {
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfBackend for PdfiumBackend {
    fn with_document(
        &self,
        pdf_bytes: &[u8],
        visit: &mut dyn FnMut(&mut dyn PdfDocumentHandle) -> Result<(), ExtractionError>,
    ) -> Result<(), ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let mut handle = PdfiumDocument { document };
        visit(&mut handle)
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, page_index: usize) -> Result<PdfPage<'_>, ExtractionError> {
        let pages = self.document.pages();
        let index = u16::try_from(page_index).map_err(|_| ExtractionError::PageRender {
            page: page_index + 1,
            reason: format!("Page index {page_index} exceeds u16 maximum"),
        })?;
        pages.get(index).map_err(|_| ExtractionError::PageRender {
            page: page_index + 1,
            reason: format!(
                "Page {} out of range (document has {} pages)",
                page_index + 1,
                pages.len()
            ),
        })
    }
}

impl PdfDocumentHandle for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn text_fragments(&mut self, page_index: usize) -> Result<Vec<TextFragment>, ExtractionError> {
        let page = self.page(page_index)?;

        // An unreadable text layer is treated as no text layer; OCR takes over.
        let text = match page.text() {
            Ok(text) => text,
            Err(e) => {
                debug!(page = page_index + 1, error = %e, "Text layer unreadable");
                return Ok(Vec::new());
            }
        };

        let fragments = text
            .segments()
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                TextFragment {
                    text: segment.text(),
                    x: bounds.left().value,
                    y: bounds.bottom().value,
                    width: bounds.width().value,
                    height: bounds.height().value,
                }
            })
            .collect();
        Ok(fragments)
    }

    fn render_page(&mut self, page_index: usize, scale: f32) -> Result<Vec<u8>, ExtractionError> {
        let page_number = page_index + 1;
        let page = self.page(page_index)?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, scale);

        let uncapped_w = (width_points * scale) as u32;
        let uncapped_h = (height_points * scale) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_number,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PageRender {
                page: page_number,
                reason: format!("Rendering failed: {e}"),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::PageRender {
                page: page_number,
                reason: format!("PNG encoding failed: {e}"),
            })?;

        let png_bytes = cursor.into_inner();

        debug!(
            page = page_number,
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            "Rendered PDF page to PNG"
        );

        Ok(png_bytes)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// In-memory PDF backend. Each page is a list of text-layer fragments;
/// rendering returns a minimal PNG.
pub struct MockPdfBackend {
    pages: Vec<Vec<String>>,
    corrupt: bool,
    render_failures: Vec<usize>,
    opens: AtomicUsize,
    renders: Mutex<Vec<(usize, f32)>>,
}

impl MockPdfBackend {
    /// One fragment per page. An empty string is a page with no text layer.
    pub fn new(pages: &[&str]) -> Self {
        Self::with_fragments(
            pages
                .iter()
                .map(|text| if text.is_empty() { vec![] } else { vec![*text] })
                .collect(),
        )
    }

    pub fn with_fragments(pages: Vec<Vec<&str>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|fragments| fragments.into_iter().map(String::from).collect())
                .collect(),
            corrupt: false,
            render_failures: Vec::new(),
            opens: AtomicUsize::new(0),
            renders: Mutex::new(Vec::new()),
        }
    }

    /// A backend that rejects every document as unparseable.
    pub fn corrupt() -> Self {
        let mut backend = Self::with_fragments(vec![]);
        backend.corrupt = true;
        backend
    }

    /// Make rendering of a 0-based page index fail.
    pub fn fail_render_on(mut self, page_index: usize) -> Self {
        self.render_failures.push(page_index);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// (0-based page index, scale) for every successful render.
    pub fn rendered_pages(&self) -> Vec<(usize, f32)> {
        self.renders.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl PdfBackend for MockPdfBackend {
    fn with_document(
        &self,
        _pdf_bytes: &[u8],
        visit: &mut dyn FnMut(&mut dyn PdfDocumentHandle) -> Result<(), ExtractionError>,
    ) -> Result<(), ExtractionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.corrupt {
            return Err(ExtractionError::PdfParse("mock: invalid PDF structure".into()));
        }
        visit(&mut MockPdfDocument { backend: self })
    }
}

struct MockPdfDocument<'a> {
    backend: &'a MockPdfBackend,
}

impl MockPdfDocument<'_> {
    fn check_range(&self, page_index: usize) -> Result<(), ExtractionError> {
        if page_index >= self.backend.pages.len() {
            return Err(ExtractionError::PageRender {
                page: page_index + 1,
                reason: format!(
                    "Page {} out of range (mock has {} pages)",
                    page_index + 1,
                    self.backend.pages.len()
                ),
            });
        }
        Ok(())
    }
}

impl PdfDocumentHandle for MockPdfDocument<'_> {
    fn page_count(&self) -> usize {
        self.backend.pages.len()
    }

    fn text_fragments(&mut self, page_index: usize) -> Result<Vec<TextFragment>, ExtractionError> {
        self.check_range(page_index)?;
        Ok(self.backend.pages[page_index]
            .iter()
            .map(|text| TextFragment::unpositioned(text.as_str()))
            .collect())
    }

    fn render_page(&mut self, page_index: usize, scale: f32) -> Result<Vec<u8>, ExtractionError> {
        self.check_range(page_index)?;
        if self.backend.render_failures.contains(&page_index) {
            return Err(ExtractionError::PdfParse(format!(
                "mock: page object {} is damaged",
                page_index + 1
            )));
        }
        if let Ok(mut renders) = self.backend.renders.lock() {
            renders.push((page_index, scale));
        }
        Ok(minimal_png())
    }
}

/// Minimal valid 1x1 white pixel PNG for mock testing.
pub fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, // 8-bit RGB
        0xDE, // IHDR CRC
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, // compressed
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, // IDAT CRC
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND chunk
        0xAE, 0x42, 0x60, 0x82, // IEND CRC
    ]
}
