use super::progress::{ProgressStage, ProgressTracker};
use super::types::OcrEngine;
use super::ExtractionError;

/// One recognition pass over an encoded raster.
///
/// `on_fraction` receives the engine's completion fraction, clamped to
/// [0, 1]. The returned text is trimmed.
pub fn recognize_raster(
    ocr: &dyn OcrEngine,
    image_bytes: &[u8],
    language: &str,
    on_fraction: &mut dyn FnMut(f64),
) -> Result<String, ExtractionError> {
    let text = ocr
        .recognize(image_bytes, language, &mut |fraction| {
            on_fraction(f64::from(fraction).clamp(0.0, 1.0))
        })
        .map_err(into_ocr_failure)?;
    Ok(text.trim().to_string())
}

/// OCR a standalone uploaded image.
///
/// Progress is the engine's own fraction mapped onto the whole call.
/// Whitespace-only recognition returns an empty string, not an error.
pub fn extract_image(
    ocr: &dyn OcrEngine,
    image_bytes: &[u8],
    language: &str,
    progress: &mut ProgressTracker<'_>,
) -> Result<String, ExtractionError> {
    tracing::debug!(image_size = image_bytes.len(), "Running OCR on image");

    let text = recognize_raster(ocr, image_bytes, language, &mut |fraction| {
        progress.report_fraction(ProgressStage::ImageOcr, fraction)
    })?;

    progress.complete();

    tracing::info!(text_length = text.len(), "Image OCR complete");
    Ok(text)
}

/// Every engine failure surfaces as `Ocr`; cancellation passes through.
fn into_ocr_failure(e: ExtractionError) -> ExtractionError {
    match e {
        ExtractionError::Ocr(_) | ExtractionError::Cancelled => e,
        other => ExtractionError::Ocr(other.to_string()),
    }
}
