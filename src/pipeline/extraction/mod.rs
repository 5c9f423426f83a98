pub mod types;
pub mod config;
pub mod progress;
pub mod dispatch;
pub mod pdf;
pub mod image_ocr;
pub mod ocr;
pub mod pdfium;

pub use types::*;
pub use config::*;
pub use progress::*;
pub use dispatch::*;
pub use ocr::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file type: {media_type}. Please upload a PDF, image, or text file.")]
    UnsupportedFileType { media_type: String },

    #[error("Failed to parse PDF: {0}. Please ensure the file is not corrupted.")]
    PdfParse(String),

    #[error("Failed to render page {page} for OCR: {reason}")]
    PageRender { page: usize, reason: String },

    #[error("OCR failed: {0}. Please try a clearer image.")]
    Ocr(String),

    #[error("Extraction engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction worker failed: {0}")]
    Worker(String),
}
