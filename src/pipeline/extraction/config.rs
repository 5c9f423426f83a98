//! Tunables for the extraction pipeline.
//!
//! The text threshold and render scale have no derivation; they are
//! configuration, not law.

use serde::{Deserialize, Serialize};

/// Pages whose trimmed text layer is longer than this skip OCR.
/// Length is counted in Unicode scalar values (`chars()`), not UTF-16 units.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 40;

/// Upscale factor applied when rasterizing a page for OCR.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Tesseract language code used for every recognition pass.
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Granularity of the OCR fallback for PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrFallback {
    /// OCR only the pages whose text layer is too short.
    #[default]
    PerPage,
    /// OCR every page, but only when the whole document has no text layer.
    WholeDocument,
}

impl OcrFallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerPage => "per_page",
            Self::WholeDocument => "whole_document",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_page" | "page" => Some(Self::PerPage),
            "whole_document" | "document" => Some(Self::WholeDocument),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub min_text_chars: usize,
    pub render_scale: f32,
    pub ocr_language: String,
    pub fallback: OcrFallback,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            render_scale: DEFAULT_RENDER_SCALE,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            fallback: OcrFallback::PerPage,
        }
    }
}

impl ExtractionConfig {
    /// Whether a page's joined text layer is usable without OCR.
    pub fn accepts_text_layer(&self, text: &str) -> bool {
        text.chars().count() > self.min_text_chars
    }
}
