//! PDF extraction: text layer first, OCR for pages without one.
//!
//! Each page runs through a small state machine:
//!
//! ```text
//! TextLayerCheck ──usable──▶ Done
//!       │
//!       └─too short─▶ RenderForOcr ──▶ Recognizing ──▶ Done
//!
//! any state ──error / cancel──▶ Failed
//! ```
//!
//! Pages are processed strictly in order and one failed page aborts the
//! whole document.

use tokio_util::sync::CancellationToken;

use super::config::{ExtractionConfig, OcrFallback};
use super::image_ocr::recognize_raster;
use super::progress::{ProgressStage, ProgressTracker};
use super::types::{
    ExtractionMethod, ExtractionOutcome, OcrEngine, PageMethod, PageReport, PageText, PdfBackend,
    PdfDocumentHandle, TextFragment,
};
use super::ExtractionError;

/// Separator between page texts in the flat result.
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug)]
pub enum PageState {
    TextLayerCheck,
    RenderForOcr,
    Recognizing { raster: Vec<u8> },
    Done(PageText),
    Failed(ExtractionError),
}

impl PageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TextLayerCheck => "text_layer_check",
            Self::RenderForOcr => "render_for_ocr",
            Self::Recognizing { .. } => "recognizing",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// Everything one page transition needs.
pub struct PageContext<'a, 'p> {
    pub document: &'a mut dyn PdfDocumentHandle,
    pub ocr: &'a dyn OcrEngine,
    pub config: &'a ExtractionConfig,
    pub progress: &'a mut ProgressTracker<'p>,
    pub cancel: &'a CancellationToken,
    /// 0-based.
    pub page_index: usize,
    pub total_pages: usize,
}

impl PageContext<'_, '_> {
    fn page_number(&self) -> usize {
        self.page_index + 1
    }

    /// Fraction of the document finished before this page started.
    fn base_fraction(&self) -> f64 {
        self.page_index as f64 / self.total_pages as f64
    }

    fn end_fraction(&self) -> f64 {
        self.page_number() as f64 / self.total_pages as f64
    }
}

/// Concatenate fragment strings with single spaces, trimmed.
pub fn join_fragments(fragments: &[TextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Advance a page by one transition.
pub fn step(state: PageState, ctx: &mut PageContext<'_, '_>) -> PageState {
    if !state.is_terminal() && ctx.cancel.is_cancelled() {
        return PageState::Failed(ExtractionError::Cancelled);
    }

    let page = ctx.page_number();
    let total = ctx.total_pages;

    match state {
        PageState::TextLayerCheck => {
            let fragments = match ctx.document.text_fragments(ctx.page_index) {
                Ok(fragments) => fragments,
                Err(e) => return PageState::Failed(e),
            };
            let text = join_fragments(&fragments);

            if ctx.config.accepts_text_layer(&text) {
                tracing::debug!(page, chars = text.chars().count(), "Using page text layer");
                ctx.progress
                    .report_fraction(ProgressStage::TextLayer { page, total }, ctx.end_fraction());
                PageState::Done(PageText {
                    page_number: page,
                    text,
                    method: PageMethod::TextLayer,
                })
            } else {
                tracing::debug!(
                    page,
                    chars = text.chars().count(),
                    threshold = ctx.config.min_text_chars,
                    "Text layer too short, falling back to OCR"
                );
                PageState::RenderForOcr
            }
        }

        PageState::RenderForOcr => {
            match ctx.document.render_page(ctx.page_index, ctx.config.render_scale) {
                Ok(raster) => PageState::Recognizing { raster },
                Err(e) => PageState::Failed(into_render_failure(e, page)),
            }
        }

        PageState::Recognizing { raster } => {
            let base = ctx.base_fraction();
            let share = 1.0 / total as f64;
            let stage = ProgressStage::Recognizing { page, total };

            let progress = &mut *ctx.progress;
            let result = recognize_raster(ctx.ocr, &raster, &ctx.config.ocr_language, &mut |f| {
                progress.report_fraction(stage, base + f * share)
            });

            match result {
                Ok(text) => {
                    ctx.progress.report_fraction(stage, ctx.end_fraction());
                    tracing::debug!(page, chars = text.chars().count(), "Page OCR complete");
                    PageState::Done(PageText {
                        page_number: page,
                        text,
                        method: PageMethod::Ocr,
                    })
                }
                Err(e) => PageState::Failed(e),
            }
        }

        terminal => terminal,
    }
}

/// Drive a page from `initial` until it is done or failed.
pub fn run_page(
    initial: PageState,
    ctx: &mut PageContext<'_, '_>,
) -> Result<PageText, ExtractionError> {
    let mut state = initial;
    loop {
        state = match state {
            PageState::Done(page) => return Ok(page),
            PageState::Failed(e) => return Err(e),
            pending => step(pending, ctx),
        };
    }
}

/// Extract a whole PDF.
pub fn extract_pdf(
    backend: &dyn PdfBackend,
    ocr: &dyn OcrEngine,
    config: &ExtractionConfig,
    pdf_bytes: &[u8],
    progress: &mut ProgressTracker<'_>,
    cancel: &CancellationToken,
) -> Result<ExtractionOutcome, ExtractionError> {
    if cancel.is_cancelled() {
        return Err(ExtractionError::Cancelled);
    }

    let mut pages: Vec<PageText> = Vec::new();

    backend.with_document(pdf_bytes, &mut |document| {
        let total_pages = document.page_count();
        tracing::info!(
            pages = total_pages,
            fallback = config.fallback.as_str(),
            "Opened PDF"
        );

        pages = match config.fallback {
            OcrFallback::PerPage => {
                extract_per_page(document, ocr, config, &mut *progress, cancel, total_pages)?
            }
            OcrFallback::WholeDocument => {
                extract_whole_document(document, ocr, config, &mut *progress, cancel, total_pages)?
            }
        };
        Ok(())
    })?;

    progress.complete();

    let text = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
        .trim()
        .to_string();

    let method = if pages.iter().any(|p| p.method == PageMethod::Ocr) {
        ExtractionMethod::PdfWithOcr
    } else {
        ExtractionMethod::PdfTextLayer
    };

    let reports = pages
        .iter()
        .map(|p| PageReport {
            page_number: p.page_number,
            method: p.method,
            char_count: p.text.chars().count(),
        })
        .collect::<Vec<_>>();

    tracing::info!(
        method = ?method,
        pages = reports.len(),
        ocr_pages = reports.iter().filter(|p| p.method == PageMethod::Ocr).count(),
        text_length = text.len(),
        "PDF extraction complete"
    );

    Ok(ExtractionOutcome {
        text,
        method,
        pages: reports,
    })
}

fn extract_per_page(
    document: &mut dyn PdfDocumentHandle,
    ocr: &dyn OcrEngine,
    config: &ExtractionConfig,
    progress: &mut ProgressTracker<'_>,
    cancel: &CancellationToken,
    total_pages: usize,
) -> Result<Vec<PageText>, ExtractionError> {
    let mut pages = Vec::with_capacity(total_pages);
    for page_index in 0..total_pages {
        let mut ctx = PageContext {
            document: &mut *document,
            ocr,
            config,
            progress: &mut *progress,
            cancel,
            page_index,
            total_pages,
        };
        pages.push(run_page(PageState::TextLayerCheck, &mut ctx)?);
    }
    Ok(pages)
}

/// Only OCR when no page at all has a text layer.
fn extract_whole_document(
    document: &mut dyn PdfDocumentHandle,
    ocr: &dyn OcrEngine,
    config: &ExtractionConfig,
    progress: &mut ProgressTracker<'_>,
    cancel: &CancellationToken,
    total_pages: usize,
) -> Result<Vec<PageText>, ExtractionError> {
    let mut direct = Vec::with_capacity(total_pages);
    for page_index in 0..total_pages {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        let fragments = document.text_fragments(page_index)?;
        direct.push(PageText {
            page_number: page_index + 1,
            text: join_fragments(&fragments),
            method: PageMethod::TextLayer,
        });
    }

    if direct.iter().any(|p| !p.text.trim().is_empty()) {
        tracing::debug!(pages = total_pages, "Document has a text layer, skipping OCR");
        return Ok(direct);
    }

    tracing::debug!(pages = total_pages, "Document has no text layer, OCR on every page");
    let mut pages = Vec::with_capacity(total_pages);
    for page_index in 0..total_pages {
        let mut ctx = PageContext {
            document: &mut *document,
            ocr,
            config,
            progress: &mut *progress,
            cancel,
            page_index,
            total_pages,
        };
        pages.push(run_page(PageState::RenderForOcr, &mut ctx)?);
    }
    Ok(pages)
}

fn into_render_failure(e: ExtractionError, page: usize) -> ExtractionError {
    match e {
        ExtractionError::PageRender { .. } | ExtractionError::Cancelled => e,
        other => ExtractionError::PageRender {
            page,
            reason: other.to_string(),
        },
    }
}
