//! Extractor configuration
//!
//! Read from `<config_dir>/bank-statements/config.json` when that file exists,
//! then overridden by `BANK_STATEMENTS_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Minimum non-whitespace characters before text extraction counts as successful
pub const DEFAULT_MIN_TEXT_CHARS: usize = 100;

/// OCR timeout per document in seconds
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 120;

/// Rasterization resolution for OCR
pub const DEFAULT_OCR_DPI: u32 = 300;

const CONFIG_DIR_NAME: &str = "bank-statements";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Fall back to OCR when the text layer is (nearly) empty
    pub ocr_enabled: bool,
    pub min_text_chars: usize,
    pub tesseract_cmd: String,
    pub pdftoppm_cmd: String,
    pub ocr_language: String,
    pub ocr_dpi: u32,
    pub ocr_timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            tesseract_cmd: "tesseract".to_string(),
            pdftoppm_cmd: "pdftoppm".to_string(),
            ocr_language: "spa".to_string(),
            ocr_dpi: DEFAULT_OCR_DPI,
            ocr_timeout_secs: DEFAULT_OCR_TIMEOUT_SECS,
        }
    }
}

impl ExtractorConfig {
    /// Config file, environment overrides, defaults, in that order of precedence
    pub fn load() -> Self {
        let mut config = default_config_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!("Config: ignoring {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply `BANK_STATEMENTS_*` overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BANK_STATEMENTS_OCR") {
            self.ocr_enabled = !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "off" | "no");
        }
        if let Some(v) = lookup("BANK_STATEMENTS_TESSERACT") {
            self.tesseract_cmd = v;
        }
        if let Some(v) = lookup("BANK_STATEMENTS_PDFTOPPM") {
            self.pdftoppm_cmd = v;
        }
        if let Some(v) = lookup("BANK_STATEMENTS_OCR_LANG") {
            self.ocr_language = v;
        }
        if let Some(v) = lookup("BANK_STATEMENTS_OCR_TIMEOUT_SECS") {
            match v.trim().parse() {
                Ok(secs) => self.ocr_timeout_secs = secs,
                Err(_) => log::warn!("Config: invalid BANK_STATEMENTS_OCR_TIMEOUT_SECS '{}'", v),
            }
        }
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BANK_STATEMENTS_OCR", "off"),
            ("BANK_STATEMENTS_TESSERACT", "/opt/tesseract/bin/tesseract"),
            ("BANK_STATEMENTS_OCR_TIMEOUT_SECS", "30"),
        ]
        .into_iter()
        .collect();

        let mut config = ExtractorConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert!(!config.ocr_enabled);
        assert_eq!(config.tesseract_cmd, "/opt/tesseract/bin/tesseract");
        assert_eq!(config.ocr_timeout(), Duration::from_secs(30));
        assert_eq!(config.ocr_language, "spa");
    }

    #[test]
    fn test_invalid_timeout_is_ignored() {
        let mut config = ExtractorConfig::default();
        config.apply_env(|key| (key == "BANK_STATEMENTS_OCR_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(config.ocr_timeout_secs, DEFAULT_OCR_TIMEOUT_SECS);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "ocr_language": "spa+eng", "ocr_dpi": 200 }"#).unwrap();

        let config = ExtractorConfig::from_file(&path).unwrap();
        assert_eq!(config.ocr_language, "spa+eng");
        assert_eq!(config.ocr_dpi, 200);
        assert_eq!(config.min_text_chars, DEFAULT_MIN_TEXT_CHARS);
        assert!(config.ocr_enabled);
    }
}
