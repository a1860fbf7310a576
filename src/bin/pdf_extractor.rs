//! Standalone PDF text extractor binary.
//!
//! Prints the text layer page by page, the same text the statement parsers
//! see. Useful for building test fixtures and for checking whether a PDF
//! needs OCR.
//!
//! Usage: pdf_extractor [--check-ocr] <path_to_pdf>
//! Output: Extracted text on stdout, errors on stderr
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments
//!   2 - PDF read error
//!   3 - PDF extraction error
//!   4 - PDF validation failed

use anyhow::{Context, Result};
use env_logger::Env;
use statement_lib::pdf_import::ocr::{
    is_pdftoppm_available, is_tesseract_available, should_use_ocr_fallback, OcrOptions,
};
use statement_lib::ExtractorConfig;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

/// PDF magic bytes
const PDF_MAGIC: &[u8] = b"%PDF";
/// Maximum PDF file size (100 MB)
const MAX_PDF_SIZE: usize = 100 * 1024 * 1024;

fn validate_pdf(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < 8 {
        return Err("file too small to be a valid PDF".to_string());
    }

    if bytes.len() > MAX_PDF_SIZE {
        return Err(format!(
            "PDF file too large ({} MB). Maximum: {} MB",
            bytes.len() / (1024 * 1024),
            MAX_PDF_SIZE / (1024 * 1024)
        ));
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return Err("invalid PDF file: missing PDF header".to_string());
    }

    Ok(())
}

fn write_pages(pages: &[String]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for (i, page) in pages.iter().enumerate() {
        writeln!(handle, "===== Page {} =====", i + 1)?;
        handle.write_all(page.as_bytes())?;
        writeln!(handle)?;
    }
    handle.flush().context("failed to flush stdout")?;
    Ok(())
}

fn report_ocr(pages: &[String]) {
    let config = ExtractorConfig::load();
    let options = OcrOptions::from(&config);
    let text = pages.concat();

    eprintln!(
        "OCR needed: {}",
        should_use_ocr_fallback(&text, config.min_text_chars)
    );
    eprintln!(
        "{}: {}",
        options.pdftoppm_cmd,
        if is_pdftoppm_available(&options) { "found" } else { "missing" }
    );
    eprintln!(
        "{}: {}",
        options.tesseract_cmd,
        if is_tesseract_available(&options) { "found" } else { "missing" }
    );
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (check_ocr, pdf_path) = match args.as_slice() {
        [path] => (false, path),
        [flag, path] if flag == "--check-ocr" => (true, path),
        _ => {
            eprintln!("Usage: pdf_extractor [--check-ocr] <path_to_pdf>");
            return ExitCode::from(1);
        }
    };

    let bytes = match fs::read(pdf_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("READ_ERROR:{}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = validate_pdf(&bytes) {
        eprintln!("VALIDATE_ERROR:{}", e);
        return ExitCode::from(4);
    }

    let pages = match pdf_extract::extract_text_from_mem_by_pages(&bytes) {
        Ok(pages) => pages,
        Err(e) => {
            eprintln!("EXTRACT_ERROR:{}", e);
            return ExitCode::from(3);
        }
    };
    log::info!("{}: {} pages", pdf_path, pages.len());

    if let Err(e) = write_pages(&pages) {
        eprintln!("WRITE_ERROR:{:#}", e);
        return ExitCode::from(3);
    }

    if check_ocr {
        report_ocr(&pages);
    }
    ExitCode::SUCCESS
}
