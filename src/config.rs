use std::path::PathBuf;

use crate::pipeline::extraction::{ExtractionConfig, OcrFallback};
use crate::pipeline::summarize::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_TIMEOUT_SECS,
};

/// Application-level constants
pub const APP_NAME: &str = "docsum";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// `<platform data dir>/docsum/`, falling back to the working directory.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the document database
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("documents.db")
}

/// Log filter used when `RUST_LOG` is unset
pub fn default_log_filter() -> &'static str {
    "docsum=info,warn"
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Everything the binary reads from its environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub extraction: ExtractionConfig,
    pub gemini: GeminiConfig,
    pub database_path: PathBuf,
    pub tessdata_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep their
    /// default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut extraction = ExtractionConfig::default();
        if let Some(raw) = get("DOCSUM_MIN_TEXT_CHARS") {
            match raw.trim().parse::<usize>() {
                Ok(value) => extraction.min_text_chars = value,
                Err(_) => ignored("DOCSUM_MIN_TEXT_CHARS", &raw),
            }
        }
        if let Some(raw) = get("DOCSUM_RENDER_SCALE") {
            match raw.trim().parse::<f32>() {
                Ok(value) if value.is_finite() && value > 0.0 => extraction.render_scale = value,
                _ => ignored("DOCSUM_RENDER_SCALE", &raw),
            }
        }
        if let Some(raw) = get("DOCSUM_OCR_LANG") {
            extraction.ocr_language = raw.trim().to_string();
        }
        if let Some(raw) = get("DOCSUM_OCR_FALLBACK") {
            match OcrFallback::parse(&raw) {
                Some(mode) => extraction.fallback = mode,
                None => ignored("DOCSUM_OCR_FALLBACK", &raw),
            }
        }

        let mut gemini = GeminiConfig::default();
        if let Some(key) = get("GEMINI_API_KEY") {
            gemini.api_key = key.trim().to_string();
        }
        if let Some(model) = get("GEMINI_MODEL") {
            gemini.model = model.trim().to_string();
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            gemini.base_url = url.trim().to_string();
        }

        Self {
            extraction,
            gemini,
            database_path: get("DOCSUM_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            tessdata_dir: get("TESSDATA_PREFIX").map(PathBuf::from),
        }
    }
}

fn ignored(key: &str, value: &str) {
    tracing::warn!(key, value, "Ignoring invalid configuration value");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("docsum"));
        assert!(default_database_path().ends_with("docsum/documents.db"));
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.extraction, ExtractionConfig::default());
        assert_eq!(config.gemini, GeminiConfig::default());
        assert_eq!(config.database_path, default_database_path());
        assert!(config.tessdata_dir.is_none());
    }

    #[test]
    fn extraction_overrides_are_applied() {
        let config = config_from(&[
            ("DOCSUM_MIN_TEXT_CHARS", "100"),
            ("DOCSUM_RENDER_SCALE", "3"),
            ("DOCSUM_OCR_LANG", "deu"),
            ("DOCSUM_OCR_FALLBACK", "whole-document"),
        ]);
        assert_eq!(config.extraction.min_text_chars, 100);
        assert!((config.extraction.render_scale - 3.0).abs() < f32::EPSILON);
        assert_eq!(config.extraction.ocr_language, "deu");
        assert_eq!(config.extraction.fallback, OcrFallback::WholeDocument);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = config_from(&[
            ("DOCSUM_MIN_TEXT_CHARS", "lots"),
            ("DOCSUM_RENDER_SCALE", "-2"),
            ("DOCSUM_OCR_FALLBACK", "sometimes"),
        ]);
        assert_eq!(config.extraction, ExtractionConfig::default());
    }

    #[test]
    fn gemini_and_paths_from_env() {
        let config = config_from(&[
            ("GEMINI_API_KEY", " secret "),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_BASE_URL", "http://localhost:9000"),
            ("DOCSUM_DB_PATH", "/tmp/docs.db"),
            ("TESSDATA_PREFIX", "/opt/tessdata"),
        ]);
        assert_eq!(config.gemini.api_key, "secret");
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.gemini.base_url, "http://localhost:9000");
        assert_eq!(config.database_path, PathBuf::from("/tmp/docs.db"));
        assert_eq!(config.tessdata_dir, Some(PathBuf::from("/opt/tessdata")));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(APP_NAME, "docsum");
    }
}
