use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::ExtractionConfig;
use super::image_ocr::extract_image;
use super::pdf::extract_pdf;
use super::progress::{ProgressSink, ProgressStage, ProgressTracker};
use super::types::{ExtractionMethod, ExtractionOutcome, OcrEngine, PdfBackend, SourceFile};
use super::ExtractionError;

/// Where a file goes, decided from its declared media type and name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Pdf,
    Image,
    PlainText,
}

impl Route {
    /// First match wins: PDF (MIME or a name ending in `.pdf`), then
    /// `image/*`, then `text/*`.
    pub fn for_file(file: &SourceFile) -> Result<Self, ExtractionError> {
        let media_type = file.media_type.trim().to_ascii_lowercase();

        if media_type == "application/pdf" || file.name.to_lowercase().ends_with(".pdf") {
            return Ok(Self::Pdf);
        }
        if media_type.starts_with("image/") {
            return Ok(Self::Image);
        }
        if media_type.starts_with("text/") {
            return Ok(Self::PlainText);
        }

        let offending = if media_type.is_empty() {
            file.extension()
                .map(|e| format!(".{e}"))
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            media_type
        };
        Err(ExtractionError::UnsupportedFileType {
            media_type: offending,
        })
    }
}

/// Routes uploaded files to the PDF, image, or plain-text path.
///
/// Both engines are injected; the pipeline holds no process-wide state.
pub struct ExtractionPipeline {
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    config: ExtractionConfig,
}

impl ExtractionPipeline {
    pub fn new(pdf: Arc<dyn PdfBackend>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self::with_config(pdf, ocr, ExtractionConfig::default())
    }

    pub fn with_config(
        pdf: Arc<dyn PdfBackend>,
        ocr: Arc<dyn OcrEngine>,
        config: ExtractionConfig,
    ) -> Self {
        Self { pdf, ocr, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract text and report which path produced it.
    pub fn extract_document(
        &self,
        file: &SourceFile,
        sink: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let route = Route::for_file(file)?;
        tracing::info!(
            file = %file.name,
            media_type = %file.media_type,
            size = file.bytes.len(),
            route = ?route,
            "Extracting document"
        );

        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let mut progress = ProgressTracker::new(sink);

        match route {
            Route::Pdf => extract_pdf(
                self.pdf.as_ref(),
                self.ocr.as_ref(),
                &self.config,
                &file.bytes,
                &mut progress,
                cancel,
            ),
            Route::Image => {
                let text = extract_image(
                    self.ocr.as_ref(),
                    &file.bytes,
                    &self.config.ocr_language,
                    &mut progress,
                )?;
                Ok(ExtractionOutcome {
                    text,
                    method: ExtractionMethod::ImageOcr,
                    pages: vec![],
                })
            }
            Route::PlainText => {
                let text = String::from_utf8_lossy(&file.bytes).into_owned();
                progress.report_percent(ProgressStage::PlainText, 100.0);
                Ok(ExtractionOutcome {
                    text,
                    method: ExtractionMethod::PlainText,
                    pages: vec![],
                })
            }
        }
    }

    /// Extract flat text, without cancellation.
    pub fn extract_text(
        &self,
        file: &SourceFile,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<String, ExtractionError> {
        self.extract_document(file, sink, &CancellationToken::new())
            .map(|outcome| outcome.text)
    }

    /// Run extraction on the blocking pool so the caller's runtime stays free.
    pub async fn extract_document_async(
        self: Arc<Self>,
        file: SourceFile,
        sink: Option<Arc<dyn ProgressSink>>,
        cancel: CancellationToken,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        tokio::task::spawn_blocking(move || {
            self.extract_document(&file, sink.as_deref(), &cancel)
        })
        .await
        .map_err(|e| ExtractionError::Worker(e.to_string()))?
    }

    pub async fn extract_text_async(
        self: Arc<Self>,
        file: SourceFile,
        sink: Option<Arc<dyn ProgressSink>>,
        cancel: CancellationToken,
    ) -> Result<String, ExtractionError> {
        self.extract_document_async(file, sink, cancel)
            .await
            .map(|outcome| outcome.text)
    }
}
