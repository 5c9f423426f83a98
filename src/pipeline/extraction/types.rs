use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// An uploaded file awaiting extraction. Owned by the caller and never
/// mutated by the pipeline.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    /// Declared MIME type. Empty when the uploader supplied none.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let media_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }

    /// Lowercase filename extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// A positioned run of characters from a PDF page's text layer.
/// Coordinates are PDF points; only `text` survives into the result.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextFragment {
    pub fn unpositioned(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

/// How a single PDF page produced its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMethod {
    TextLayer,
    Ocr,
}

/// Text for one completed page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based.
    pub page_number: usize,
    pub text: String,
    pub method: PageMethod,
}

/// Per-page summary kept on the outcome; the text itself lives in
/// `ExtractionOutcome::text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page_number: usize,
    pub method: PageMethod,
    pub char_count: usize,
}

/// Which route the dispatcher took for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Every page yielded a usable text layer.
    PdfTextLayer,
    /// At least one page went through OCR.
    PdfWithOcr,
    ImageOcr,
    PlainText,
}

/// Result of one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Flat text, pages joined by a blank line and trimmed as a whole.
    pub text: String,
    pub method: ExtractionMethod,
    /// Empty for images and plain text.
    pub pages: Vec<PageReport>,
}

/// An open PDF, lent to the extractor for the duration of one call.
pub trait PdfDocumentHandle {
    fn page_count(&self) -> usize;

    /// Text-layer fragments for a 0-based page index, in reading order.
    fn text_fragments(&mut self, page_index: usize) -> Result<Vec<TextFragment>, ExtractionError>;

    /// Render a 0-based page to PNG bytes at `scale` times its native size.
    fn render_page(&mut self, page_index: usize, scale: f32) -> Result<Vec<u8>, ExtractionError>;
}

/// PDF parsing capability.
pub trait PdfBackend: Send + Sync {
    /// Open `pdf_bytes` and hand the document to `visit`.
    ///
    /// Must fail with `ExtractionError::PdfParse` before calling `visit`
    /// when the document structure cannot be read.
    fn with_document(
        &self,
        pdf_bytes: &[u8],
        visit: &mut dyn FnMut(&mut dyn PdfDocumentHandle) -> Result<(), ExtractionError>,
    ) -> Result<(), ExtractionError>;
}

/// OCR capability (allows mocking for tests).
pub trait OcrEngine: Send + Sync {
    /// Recognize text in an encoded raster image (PNG, JPEG, TIFF).
    ///
    /// `on_progress` receives the engine's own completion fraction in [0, 1].
    fn recognize(
        &self,
        image_bytes: &[u8],
        language: &str,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<String, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_guesses_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Report.PDF");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let file = SourceFile::from_path(&path).unwrap();
        assert_eq!(file.name, "Report.PDF");
        assert_eq!(file.media_type, "application/pdf");
        assert_eq!(file.extension().as_deref(), Some("pdf"));
        assert_eq!(file.bytes, b"%PDF-1.4");
    }

    #[test]
    fn from_path_unknown_extension_has_empty_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.zzqx");
        std::fs::write(&path, b"data").unwrap();

        let file = SourceFile::from_path(&path).unwrap();
        assert!(file.media_type.is_empty());
    }

    #[test]
    fn from_path_missing_file_is_io_error() {
        let result = SourceFile::from_path(Path::new("/nonexistent/file.pdf"));
        assert!(matches!(result, Err(ExtractionError::Io(_))));
    }

    #[test]
    fn extension_absent_without_dot() {
        let file = SourceFile::new("README", "", vec![]);
        assert!(file.extension().is_none());
    }

    #[test]
    fn extraction_method_serializes_snake_case() {
        let json = serde_json::to_string(&ExtractionMethod::PdfWithOcr).unwrap();
        assert_eq!(json, "\"pdf_with_ocr\"");
    }
}
