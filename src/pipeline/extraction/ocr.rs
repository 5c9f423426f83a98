use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::types::OcrEngine;
use super::ExtractionError;

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `tesseract` feature flag.
///
/// A fresh libtesseract instance is created for every recognition and
/// dropped when it finishes, so one `TesseractOcr` can serve concurrent
/// calls without sharing engine state.
#[cfg(feature = "tesseract")]
pub struct TesseractOcr {
    tessdata_dir: Option<std::path::PathBuf>,
}

#[cfg(feature = "tesseract")]
impl TesseractOcr {
    /// Use an explicit tessdata directory. `language` must have a
    /// `<language>.traineddata` file there.
    pub fn new(tessdata_dir: &std::path::Path, language: &str) -> Result<Self, ExtractionError> {
        let trained = tessdata_dir.join(format!("{language}.traineddata"));
        if !trained.exists() {
            return Err(ExtractionError::EngineUnavailable(format!(
                "Tesseract language data not found: {}",
                trained.display()
            )));
        }
        Ok(Self {
            tessdata_dir: Some(tessdata_dir.to_path_buf()),
        })
    }

    /// Let libtesseract locate its data (TESSDATA_PREFIX or build default).
    pub fn system() -> Self {
        Self { tessdata_dir: None }
    }
}

#[cfg(feature = "tesseract")]
impl OcrEngine for TesseractOcr {
    fn recognize(
        &self,
        image_bytes: &[u8],
        language: &str,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<String, ExtractionError> {
        let tessdata = match &self.tessdata_dir {
            Some(dir) => Some(
                dir.to_str()
                    .ok_or_else(|| ExtractionError::Ocr("Invalid tessdata path".into()))?
                    .to_string(),
            ),
            None => None,
        };

        on_progress(0.0);
        let start = std::time::Instant::now();

        let tess = tesseract::Tesseract::new(tessdata.as_deref(), Some(language))
            .map_err(|e| ExtractionError::Ocr(format!("engine initialization failed: {e:?}")))?;

        let tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::Ocr(format!("unreadable image: {e:?}")))?;

        let mut tess = tess
            .recognize()
            .map_err(|e| ExtractionError::Ocr(format!("recognition failed: {e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::Ocr(format!("invalid recognized text: {e:?}")))?;

        on_progress(1.0);

        tracing::debug!(
            language,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "Tesseract recognition complete"
        );

        Ok(text)
    }
}

/// Serializes access to a single reusable engine instance.
///
/// Use this when an engine holds expensive state between calls and is not
/// safe to drive from two recognitions at once.
pub struct ExclusiveOcr<E> {
    engine: Mutex<E>,
}

impl<E> ExclusiveOcr<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    pub fn into_inner(self) -> Result<E, ExtractionError> {
        self.engine
            .into_inner()
            .map_err(|_| ExtractionError::Ocr("OCR engine poisoned by an earlier panic".into()))
    }
}

impl<E: OcrEngine> OcrEngine for ExclusiveOcr<E> {
    fn recognize(
        &self,
        image_bytes: &[u8],
        language: &str,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<String, ExtractionError> {
        let engine = self
            .engine
            .lock()
            .map_err(|_| ExtractionError::Ocr("OCR engine poisoned by an earlier panic".into()))?;
        engine.recognize(image_bytes, language, on_progress)
    }
}

/// Stand-in when the binary was built without an OCR backend.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn recognize(
        &self,
        _image_bytes: &[u8],
        _language: &str,
        _on_progress: &mut dyn FnMut(f32),
    ) -> Result<String, ExtractionError> {
        Err(ExtractionError::Ocr(
            "no OCR engine available (rebuild with the `tesseract` feature)".into(),
        ))
    }
}

/// Deterministic OCR engine for unit testing without Tesseract.
///
/// Returns queued texts in call order, then falls back to the default text.
pub struct ScriptedOcrEngine {
    default_text: String,
    queued: Mutex<VecDeque<Result<String, String>>>,
    progress_steps: Vec<f32>,
    calls: AtomicUsize,
    languages: Mutex<Vec<String>>,
}

impl ScriptedOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            default_text: text.to_string(),
            queued: Mutex::new(VecDeque::new()),
            progress_steps: vec![0.0, 0.5, 1.0],
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
        }
    }

    /// Queue a text for the next unconsumed call.
    pub fn then_text(self, text: &str) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(Ok(text.to_string()));
        }
        self
    }

    /// Queue a failure for the next unconsumed call.
    pub fn then_fail(self, reason: &str) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(Err(reason.to_string()));
        }
        self
    }

    /// Fractions reported before each call returns.
    pub fn with_progress_steps(mut self, steps: Vec<f32>) -> Self {
        self.progress_steps = steps;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn languages_seen(&self) -> Vec<String> {
        self.languages.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl OcrEngine for ScriptedOcrEngine {
    fn recognize(
        &self,
        _image_bytes: &[u8],
        language: &str,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut languages) = self.languages.lock() {
            languages.push(language.to_string());
        }

        let next = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(Err(reason)) => Err(ExtractionError::Ocr(reason)),
            Some(Ok(text)) => {
                for step in &self.progress_steps {
                    on_progress(*step);
                }
                Ok(text)
            }
            None => {
                for step in &self.progress_steps {
                    on_progress(*step);
                }
                Ok(self.default_text.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &dyn OcrEngine) -> (Result<String, ExtractionError>, Vec<f32>) {
        let mut seen = Vec::new();
        let result = engine.recognize(b"fake_image_bytes", "eng", &mut |p| seen.push(p));
        (result, seen)
    }

    #[test]
    fn scripted_returns_default_text() {
        let engine = ScriptedOcrEngine::new("Quarterly revenue grew");
        let (result, progress) = run(&engine);
        assert_eq!(result.unwrap(), "Quarterly revenue grew");
        assert_eq!(progress, vec![0.0, 0.5, 1.0]);
        assert_eq!(engine.call_count(), 1);
    }

    #[test]
    fn scripted_consumes_queue_in_order() {
        let engine = ScriptedOcrEngine::new("default")
            .then_text("first")
            .then_text("second");
        assert_eq!(run(&engine).0.unwrap(), "first");
        assert_eq!(run(&engine).0.unwrap(), "second");
        assert_eq!(run(&engine).0.unwrap(), "default");
        assert_eq!(engine.call_count(), 3);
    }

    #[test]
    fn scripted_failure_reports_no_progress() {
        let engine = ScriptedOcrEngine::new("unused").then_fail("blurry scan");
        let (result, progress) = run(&engine);
        assert!(matches!(result, Err(ExtractionError::Ocr(ref m)) if m == "blurry scan"));
        assert!(progress.is_empty());
    }

    #[test]
    fn scripted_records_language() {
        let engine = ScriptedOcrEngine::new("x");
        let _ = engine.recognize(b"img", "deu", &mut |_| {});
        assert_eq!(engine.languages_seen(), vec!["deu".to_string()]);
    }

    #[test]
    fn exclusive_wrapper_delegates() {
        let engine = ExclusiveOcr::new(ScriptedOcrEngine::new("shared"));
        let (result, progress) = run(&engine);
        assert_eq!(result.unwrap(), "shared");
        assert_eq!(progress.len(), 3);
        assert_eq!(engine.into_inner().unwrap().call_count(), 1);
    }

    #[test]
    fn exclusive_wrapper_serializes_threads() {
        let engine = std::sync::Arc::new(ExclusiveOcr::new(ScriptedOcrEngine::new("t")));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.recognize(b"img", "eng", &mut |_| {}).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "t");
        }
        let engine = std::sync::Arc::try_unwrap(engine).ok().unwrap();
        assert_eq!(engine.into_inner().unwrap().call_count(), 4);
    }

    #[test]
    fn unavailable_engine_always_fails() {
        let (result, progress) = run(&UnavailableOcr);
        let err = result.unwrap_err();
        assert!(matches!(err, ExtractionError::Ocr(_)));
        assert!(err.to_string().contains("tesseract"));
        assert!(progress.is_empty());
    }

    #[cfg(feature = "tesseract")]
    #[test]
    fn tesseract_rejects_missing_language_data() {
        let dir = tempfile::tempdir().unwrap();
        let result = TesseractOcr::new(dir.path(), "eng");
        assert!(matches!(result, Err(ExtractionError::EngineUnavailable(_))));
    }

    #[cfg(feature = "tesseract")]
    #[test]
    fn tesseract_accepts_present_language_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), b"stub").unwrap();
        assert!(TesseractOcr::new(dir.path(), "eng").is_ok());
    }
}
