//! Tesseract-based OCR for scanned statements
//!
//! Pages are rasterized with `pdftoppm` (poppler-utils) into a temporary
//! directory, then each image goes through `tesseract` with the Spanish
//! language pack. Used when the PDF has no usable text layer.

use super::StatementText;
use crate::config::ExtractorConfig;
use crate::error::StatementError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

/// OCR request options
#[derive(Debug, Clone)]
pub struct OcrOptions {
    pub tesseract_cmd: String,
    pub pdftoppm_cmd: String,
    pub language: String,
    pub dpi: u32,
    /// Budget for the whole document
    pub timeout: Duration,
}

impl From<&ExtractorConfig> for OcrOptions {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            tesseract_cmd: config.tesseract_cmd.clone(),
            pdftoppm_cmd: config.pdftoppm_cmd.clone(),
            language: config.ocr_language.clone(),
            dpi: config.ocr_dpi,
            timeout: config.ocr_timeout(),
        }
    }
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self::from(&ExtractorConfig::default())
    }
}

/// Check if a command-line tool answers `-v`
fn is_tool_available(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("-v")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if pdftoppm (poppler-utils) is available
pub fn is_pdftoppm_available(options: &OcrOptions) -> bool {
    is_tool_available(&options.pdftoppm_cmd)
}

pub fn is_tesseract_available(options: &OcrOptions) -> bool {
    is_tool_available(&options.tesseract_cmd)
}

/// Convert PDF to PNG images using pdftoppm
async fn pdf_to_images(
    pdf_path: &Path,
    output_dir: &Path,
    options: &OcrOptions,
) -> Result<Vec<PathBuf>, StatementError> {
    let output_prefix = output_dir.join("page");

    let output = tokio::process::Command::new(&options.pdftoppm_cmd)
        .arg("-png")
        .arg("-r")
        .arg(options.dpi.to_string())
        .arg(pdf_path)
        .arg(&output_prefix)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| StatementError::Ocr(format!("could not run {}: {}", options.pdftoppm_cmd, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StatementError::Ocr(format!(
            "PDF rasterization failed: {}",
            stderr.trim()
        )));
    }

    // pdftoppm zero-pads page numbers, so name order is page order
    let mut image_paths: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "png").unwrap_or(false))
        .collect();
    image_paths.sort();

    if image_paths.is_empty() {
        return Err(StatementError::EmptyOrUnreadableDocument(format!(
            "{} produced no page images",
            pdf_path.display()
        )));
    }

    Ok(image_paths)
}

/// Recognize one page image; text goes to stdout
async fn ocr_image(image_path: &Path, options: &OcrOptions) -> Result<String, StatementError> {
    let output = tokio::process::Command::new(&options.tesseract_cmd)
        .arg(image_path)
        .arg("stdout")
        .arg("-l")
        .arg(&options.language)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| StatementError::Ocr(format!("could not run {}: {}", options.tesseract_cmd, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StatementError::Ocr(format!(
            "tesseract failed on {}: {}",
            image_path.display(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn ocr_pages(pdf_path: &Path, options: &OcrOptions) -> Result<StatementText, StatementError> {
    let temp_dir = TempDir::new()?;

    log::info!("OCR: Converting PDF to images at {} dpi", options.dpi);
    let image_paths = pdf_to_images(pdf_path, temp_dir.path(), options).await?;
    let total_pages = image_paths.len();
    log::info!("OCR: Converted {} pages", total_pages);

    let mut pages = Vec::with_capacity(total_pages);
    for (i, image_path) in image_paths.iter().enumerate() {
        log::info!("OCR: Processing page {}/{}", i + 1, total_pages);
        pages.push(ocr_image(image_path, options).await?);
    }

    Ok(StatementText::new(pages))
}

/// OCR every page of a PDF file.
///
/// Dropping the returned future kills any running child process; the
/// temporary image directory is removed on every exit path.
pub async fn ocr_pdf(pdf_path: &Path, options: &OcrOptions) -> Result<StatementText, StatementError> {
    match tokio::time::timeout(options.timeout, ocr_pages(pdf_path, options)).await {
        Ok(result) => result,
        Err(_) => Err(StatementError::Ocr(format!(
            "timed out after {}s on {}",
            options.timeout.as_secs(),
            pdf_path.display()
        ))),
    }
}

/// Check if text extraction yielded too little content
/// Returns true if OCR fallback should be used
pub fn should_use_ocr_fallback(extracted_text: &str, min_chars: usize) -> bool {
    // Clean text: remove whitespace and common PDF artifacts
    let cleaned = extracted_text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{0}')
        .count();

    cleaned < min_chars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_use_ocr_fallback() {
        // Very short text - should use OCR
        assert!(should_use_ocr_fallback("", 100));
        assert!(should_use_ocr_fallback("   \n\n\t  ", 100));
        assert!(should_use_ocr_fallback("\u{0}\u{0}ABC", 100));

        // Just at threshold
        assert!(!should_use_ocr_fallback("A".repeat(100).as_str(), 100));
        assert!(should_use_ocr_fallback("A".repeat(99).as_str(), 100));
        // Accented characters count once each
        assert!(!should_use_ocr_fallback("Ó".repeat(100).as_str(), 100));
    }

    #[test]
    fn test_options_follow_config() {
        let config = ExtractorConfig {
            ocr_language: "spa+eng".to_string(),
            ocr_timeout_secs: 5,
            ..ExtractorConfig::default()
        };
        let options = OcrOptions::from(&config);
        assert_eq!(options.language, "spa+eng");
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.dpi, 300);
    }

    #[tokio::test]
    async fn test_missing_tool_is_ocr_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let pdf = dir.path().join("escaneado.pdf");
        std::fs::write(&pdf, b"%PDF-1.4\n").unwrap();

        let options = OcrOptions {
            pdftoppm_cmd: "/nonexistent/pdftoppm".to_string(),
            ..OcrOptions::default()
        };
        assert!(!is_pdftoppm_available(&options));
        let err = ocr_pdf(&pdf, &options).await.unwrap_err();
        assert!(matches!(err, StatementError::Ocr(_)));
    }
}
