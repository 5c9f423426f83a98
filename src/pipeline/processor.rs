//! Upload workflow: extract → summarize → suggest → (optionally) save.
//!
//! Engines and the store are injected, so the workflow runs against mocks
//! in tests and against PDFium, Tesseract, Gemini and SQLite in the CLI.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::db::{DatabaseError, DocumentStore};
use crate::models::{Document, FileKind, NewDocument};
use crate::pipeline::extraction::pdfium::PdfiumBackend;
use crate::pipeline::extraction::{
    ExtractionError, ExtractionMethod, ExtractionPipeline, OcrEngine, PageReport, ProgressSink,
    SourceFile,
};
use crate::pipeline::summarize::{SummarizeError, Summarizer, SummaryLength};

pub const EMPTY_EXTRACTION_MESSAGE: &str =
    "No text could be extracted. Try a clearer scan or higher-quality image.";

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("No text could be extracted. Try a clearer scan or higher-quality image.")]
    EmptyExtraction,

    #[error("Summarization failed: {0}")]
    Summarize(#[from] SummarizeError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("No document store configured")]
    NoStore,
}

/// Workflow position, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Idle,
    Extracting,
    Ready,
    Summarizing,
    Suggestions,
    Complete,
    Error,
}

impl ProcessingStage {
    /// Workflow percentage shown on entering the stage.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Idle | Self::Extracting => Some(0),
            Self::Ready => Some(100),
            Self::Summarizing => Some(20),
            Self::Suggestions => Some(70),
            Self::Complete => Some(100),
            Self::Error => None,
        }
    }
}

pub trait StageObserver: Send + Sync {
    fn on_stage(&self, stage: ProcessingStage);
}

impl<F> StageObserver for F
where
    F: Fn(ProcessingStage) + Send + Sync,
{
    fn on_stage(&self, stage: ProcessingStage) {
        self(stage)
    }
}

/// Text pulled from one upload.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedDocument {
    pub filename: String,
    pub file_kind: FileKind,
    pub method: ExtractionMethod,
    pub text: String,
    pub pages: Vec<PageReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub length: SummaryLength,
    pub summary: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessingOutput {
    pub extracted: ExtractedDocument,
    pub summary: SummaryResult,
    /// Present when the result was saved.
    pub document: Option<Document>,
}

fn file_kind_for(method: ExtractionMethod) -> FileKind {
    match method {
        ExtractionMethod::PdfTextLayer | ExtractionMethod::PdfWithOcr => FileKind::Pdf,
        ExtractionMethod::PlainText => FileKind::Text,
        ExtractionMethod::ImageOcr => FileKind::Image,
    }
}

pub struct DocumentProcessor {
    pipeline: Arc<ExtractionPipeline>,
    summarizer: Box<dyn Summarizer>,
    store: Option<Arc<dyn DocumentStore>>,
    observer: Option<Arc<dyn StageObserver>>,
}

impl DocumentProcessor {
    pub fn new(pipeline: Arc<ExtractionPipeline>, summarizer: Box<dyn Summarizer>) -> Self {
        Self {
            pipeline,
            summarizer,
            store: None,
            observer: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn enter(&self, stage: ProcessingStage) {
        tracing::debug!(stage = ?stage, percent = ?stage.percent(), "Processing stage");
        if let Some(observer) = &self.observer {
            observer.on_stage(stage);
        }
    }

    fn fail<T>(&self, error: ProcessingError) -> Result<T, ProcessingError> {
        tracing::warn!(error = %error, "Processing failed");
        self.enter(ProcessingStage::Error);
        Err(error)
    }

    /// Extract text; an all-whitespace result is `EmptyExtraction`.
    pub fn extract(
        &self,
        file: &SourceFile,
        sink: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ProcessingError> {
        self.enter(ProcessingStage::Extracting);

        let outcome = match self.pipeline.extract_document(file, sink, cancel) {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(e.into()),
        };

        if outcome.text.trim().is_empty() {
            return self.fail(ProcessingError::EmptyExtraction);
        }

        self.enter(ProcessingStage::Ready);
        Ok(ExtractedDocument {
            filename: file.name.clone(),
            file_kind: file_kind_for(outcome.method),
            method: outcome.method,
            text: outcome.text,
            pages: outcome.pages,
        })
    }

    /// Summary first, then suggestions based on it.
    pub fn summarize(
        &self,
        extracted: &ExtractedDocument,
        length: SummaryLength,
    ) -> Result<SummaryResult, ProcessingError> {
        self.enter(ProcessingStage::Summarizing);
        let summary = match self.summarizer.summarize(&extracted.text, length) {
            Ok(summary) => summary,
            Err(e) => return self.fail(e.into()),
        };

        self.enter(ProcessingStage::Suggestions);
        let suggestions = match self.summarizer.suggest(&summary, &extracted.text) {
            Ok(suggestions) => suggestions,
            Err(e) => return self.fail(e.into()),
        };

        self.enter(ProcessingStage::Complete);
        Ok(SummaryResult {
            length,
            summary,
            suggestions,
        })
    }

    pub fn save(
        &self,
        extracted: &ExtractedDocument,
        summary: &SummaryResult,
        user_id: Option<String>,
    ) -> Result<Document, ProcessingError> {
        let store = self.store.as_ref().ok_or(ProcessingError::NoStore)?;
        let document = store.create(NewDocument {
            filename: extracted.filename.clone(),
            content: extracted.text.clone(),
            summary: summary.summary.clone(),
            suggestions: summary.suggestions.clone(),
            file_type: extracted.file_kind,
            summary_length: summary.length,
            user_id,
        })?;
        Ok(document)
    }

    /// Full workflow for one upload.
    pub fn process(
        &self,
        file: &SourceFile,
        length: SummaryLength,
        persist: bool,
        sink: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutput, ProcessingError> {
        if persist && self.store.is_none() {
            return Err(ProcessingError::NoStore);
        }

        let extracted = self.extract(file, sink, cancel)?;
        let summary = self.summarize(&extracted, length)?;

        let document = if persist {
            match self.save(&extracted, &summary, None) {
                Ok(document) => Some(document),
                Err(e) => return self.fail(e),
            }
        } else {
            None
        };

        tracing::info!(
            file = %extracted.filename,
            method = ?extracted.method,
            text_length = extracted.text.len(),
            suggestions = summary.suggestions.len(),
            saved = document.is_some(),
            "Document processed"
        );

        Ok(ProcessingOutput {
            extracted,
            summary,
            document,
        })
    }
}

// ---------------------------------------------------------------------------
// Engine wiring
// ---------------------------------------------------------------------------

/// Production extraction pipeline: PDFium for PDFs, Tesseract when compiled in.
///
/// PDFium is loaded when the first PDF is opened, so a missing library only
/// fails PDF uploads.
pub fn build_extraction_pipeline(
    config: &AppConfig,
) -> Result<ExtractionPipeline, ProcessingError> {
    let ocr = build_ocr_engine(config)?;
    Ok(ExtractionPipeline::with_config(
        Arc::new(PdfiumBackend::new()),
        ocr,
        config.extraction.clone(),
    ))
}

fn build_ocr_engine(config: &AppConfig) -> Result<Arc<dyn OcrEngine>, ProcessingError> {
    #[cfg(feature = "tesseract")]
    {
        use crate::pipeline::extraction::TesseractOcr;

        let language = &config.extraction.ocr_language;
        let engine: Arc<dyn OcrEngine> =
            if let Some(tessdata) = find_tessdata_dir(config, language) {
                let engine = TesseractOcr::new(&tessdata, language)?;
                tracing::info!(
                    tessdata = %tessdata.display(),
                    language = %language,
                    "Tesseract OCR initialized"
                );
                Arc::new(engine)
            } else {
                tracing::warn!(
                    language = %language,
                    "Tesseract data not found, falling back to library default"
                );
                Arc::new(TesseractOcr::system())
            };
        Ok(engine)
    }

    #[cfg(not(feature = "tesseract"))]
    {
        let _ = config;
        tracing::info!("Built without OCR, scanned pages and images will fail");
        Ok(Arc::new(crate::pipeline::extraction::UnavailableOcr))
    }
}

/// Locate a tessdata directory holding `<language>.traineddata`.
#[cfg(feature = "tesseract")]
fn find_tessdata_dir(config: &AppConfig, language: &str) -> Option<std::path::PathBuf> {
    let trained = format!("{language}.traineddata");

    if let Some(dir) = &config.tessdata_dir {
        if dir.join(&trained).exists() {
            return Some(dir.clone());
        }
    }

    let candidates = [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
    ];

    candidates
        .iter()
        .map(std::path::PathBuf::from)
        .find(|p| p.join(&trained).exists())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::db::MemoryDocumentStore;
    use crate::pipeline::extraction::ocr::ScriptedOcrEngine;
    use crate::pipeline::extraction::pdfium::{minimal_png, MockPdfBackend};
    use crate::pipeline::extraction::RecordingProgressSink;
    use crate::pipeline::summarize::MockSummarizer;

    const PAGE: &str = "The committee approved the revised budget for the next fiscal year.";

    fn processor(ocr_text: &str, summarizer: MockSummarizer) -> DocumentProcessor {
        let pipeline = ExtractionPipeline::new(
            Arc::new(MockPdfBackend::new(&[PAGE, ""])),
            Arc::new(ScriptedOcrEngine::new(ocr_text)),
        );
        DocumentProcessor::new(Arc::new(pipeline), Box::new(summarizer))
    }

    fn default_summarizer() -> MockSummarizer {
        MockSummarizer::new(
            "Budget approved.",
            &["Name the approving body", "Quote the total amount"],
        )
    }

    #[derive(Default)]
    struct StageLog(Mutex<Vec<ProcessingStage>>);

    impl StageObserver for StageLog {
        fn on_stage(&self, stage: ProcessingStage) {
            self.0.lock().unwrap().push(stage);
        }
    }

    #[test]
    fn production_pipeline_handles_text_without_pdfium() {
        std::env::set_var("PDFIUM_DYNAMIC_LIB_PATH", "/nonexistent/libpdfium.so");
        let pipeline = build_extraction_pipeline(&AppConfig::from_lookup(|_| None)).unwrap();
        let cancel = CancellationToken::new();

        let notes = SourceFile::new("notes.txt", "text/plain", b"Agenda for Monday".to_vec());
        let outcome = pipeline.extract_document(&notes, None, &cancel).unwrap();
        assert_eq!(outcome.text, "Agenda for Monday");
        assert_eq!(outcome.method, ExtractionMethod::PlainText);

        let scan = SourceFile::new("scan.pdf", "application/pdf", b"%PDF-1.4".to_vec());
        let err = pipeline.extract_document(&scan, None, &cancel).unwrap_err();
        assert!(matches!(err, ExtractionError::EngineUnavailable(_)));
    }

    #[test]
    fn stage_percentages() {
        assert_eq!(ProcessingStage::Extracting.percent(), Some(0));
        assert_eq!(ProcessingStage::Ready.percent(), Some(100));
        assert_eq!(ProcessingStage::Summarizing.percent(), Some(20));
        assert_eq!(ProcessingStage::Suggestions.percent(), Some(70));
        assert_eq!(ProcessingStage::Complete.percent(), Some(100));
        assert_eq!(ProcessingStage::Error.percent(), None);
    }

    #[test]
    fn process_runs_all_stages_and_saves() {
        let store = Arc::new(MemoryDocumentStore::new());
        let log = Arc::new(StageLog::default());
        let processor = processor("Signed by the chair", default_summarizer())
            .with_store(store.clone())
            .with_observer(log.clone());
        let sink = RecordingProgressSink::new();
        let file = SourceFile::new("minutes.pdf", "application/pdf", b"%PDF".to_vec());

        let output = processor
            .process(&file, SummaryLength::Long, true, Some(&sink), &CancellationToken::new())
            .unwrap();

        assert_eq!(output.extracted.text, format!("{PAGE}\n\nSigned by the chair"));
        assert_eq!(output.extracted.file_kind, FileKind::Pdf);
        assert_eq!(output.summary.summary, "Budget approved.");
        assert_eq!(output.summary.suggestions.len(), 2);

        let saved = output.document.unwrap();
        assert_eq!(saved.summary_length, SummaryLength::Long);
        assert_eq!(store.list().unwrap()[0].id, saved.id);

        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                ProcessingStage::Extracting,
                ProcessingStage::Ready,
                ProcessingStage::Summarizing,
                ProcessingStage::Suggestions,
                ProcessingStage::Complete,
            ]
        );
        assert_eq!(sink.percents().last(), Some(&100));
    }

    #[test]
    fn whitespace_extraction_is_empty_error() {
        let log = Arc::new(StageLog::default());
        let summarizer = default_summarizer();
        let processor = processor("   ", summarizer).with_observer(log.clone());
        let file = SourceFile::new("blank.png", "image/png", minimal_png());

        let err = processor
            .extract(&file, None, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, ProcessingError::EmptyExtraction));
        assert_eq!(err.to_string(), EMPTY_EXTRACTION_MESSAGE);
        assert_eq!(
            *log.0.lock().unwrap(),
            vec![ProcessingStage::Extracting, ProcessingStage::Error]
        );
    }

    #[test]
    fn extraction_error_is_wrapped() {
        let processor = processor("x", default_summarizer());
        let file = SourceFile::new("data.bin", "application/octet-stream", vec![0]);
        let err = processor
            .extract(&file, None, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Extraction(ExtractionError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn summarizer_failure_enters_error_stage() {
        let log = Arc::new(StageLog::default());
        let processor = processor("ocr", MockSummarizer::failing()).with_observer(log.clone());
        let file = SourceFile::new("n.txt", "text/plain", b"Some plain text body".to_vec());

        let err = processor
            .process(&file, SummaryLength::Short, false, None, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Summarize(SummarizeError::MissingApiKey)));
        assert_eq!(log.0.lock().unwrap().last(), Some(&ProcessingStage::Error));
    }

    #[test]
    fn plain_text_is_text_kind_and_not_saved_without_persist() {
        let store = Arc::new(MemoryDocumentStore::new());
        let summarizer = default_summarizer();
        let processor = processor("ocr", summarizer).with_store(store.clone());
        let file = SourceFile::new("n.txt", "text/plain", b"Plain body".to_vec());

        let output = processor
            .process(&file, SummaryLength::Medium, false, None, &CancellationToken::new())
            .unwrap();

        assert_eq!(output.extracted.file_kind, FileKind::Text);
        assert!(output.document.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn image_is_image_kind() {
        let processor = processor("Receipt 42", default_summarizer());
        let file = SourceFile::new("r.jpg", "image/jpeg", minimal_png());
        let extracted = processor
            .extract(&file, None, &CancellationToken::new())
            .unwrap();
        assert_eq!(extracted.file_kind, FileKind::Image);
        assert_eq!(extracted.text, "Receipt 42");
    }

    #[test]
    fn persist_without_store_fails_fast() {
        let processor = processor("x", default_summarizer());
        let file = SourceFile::new("n.txt", "text/plain", b"body".to_vec());
        let err = processor
            .process(&file, SummaryLength::Medium, true, None, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ProcessingError::NoStore));
    }

    #[test]
    fn summarize_passes_requested_length() {
        let summarizer = default_summarizer();
        let processor = processor("x", summarizer);
        let extracted = ExtractedDocument {
            filename: "a.txt".into(),
            file_kind: FileKind::Text,
            method: ExtractionMethod::PlainText,
            text: "body".into(),
            pages: vec![],
        };
        let result = processor.summarize(&extracted, SummaryLength::Short).unwrap();
        assert_eq!(result.length, SummaryLength::Short);
        assert_eq!(result.suggestions[0], "Name the approving body");
    }
}
