//! Extract a bank statement PDF and print the analysis as JSON
//!
//! Exit codes:
//!   0 - Success
//!   1 - Extraction failed
//!   2 - Invalid arguments
//!   3 - Unsupported bank or account type

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use statement_lib::{analyze_pdf, ExtractorConfig, StatementAnalysis, StatementError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "bank-statements",
    version,
    about = "Extract account ledgers from Mexican bank statement PDFs"
)]
struct Cli {
    /// Statement PDF
    pdf: PathBuf,

    /// Config file (defaults to <config_dir>/bank-statements/config.json)
    #[arg(short, long, env = "BANK_STATEMENTS_CONFIG")]
    config: Option<PathBuf>,

    /// Never fall back to OCR
    #[arg(long)]
    no_ocr: bool,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

fn load_config(cli: &Cli) -> Result<ExtractorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ExtractorConfig::from_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => ExtractorConfig::load(),
    };
    if cli.no_ocr {
        config.ocr_enabled = false;
    }
    log::debug!("Config: {:?}", config);
    Ok(config)
}

async fn run(cli: &Cli) -> Result<StatementAnalysis> {
    let config = load_config(cli)?;
    let analysis = analyze_pdf(&cli.pdf, &config)
        .await
        .with_context(|| format!("failed to analyze {}", cli.pdf.display()))?;
    Ok(analysis)
}

fn report(analysis: &StatementAnalysis) {
    log::info!(
        "{}: {} accounts, {} transactions",
        analysis.variant,
        analysis.accounts.len(),
        analysis.transaction_count()
    );
    for warning in &analysis.warnings {
        log::warn!("{:?} {}: {}", warning.severity, warning.field, warning.message);
    }
    for account in &analysis.accounts {
        if !account.reconciles() {
            log::warn!(
                "{} {} does not reconcile (gap {:.2})",
                account.account_name,
                account.account_number,
                account.reconciliation_gap()
            );
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let analysis = match run(&cli).await {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let unsupported = e
                .downcast_ref::<StatementError>()
                .is_some_and(StatementError::is_unsupported);
            return ExitCode::from(if unsupported { 3 } else { 1 });
        }
    };
    report(&analysis);

    let json = if cli.compact {
        serde_json::to_string(&analysis)
    } else {
        serde_json::to_string_pretty(&analysis)
    };
    match json {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: failed to serialize analysis: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["bank-statements", "--no-ocr", "--compact", "enero.pdf"]);
        assert_eq!(cli.pdf, PathBuf::from("enero.pdf"));
        assert!(cli.no_ocr);
        assert!(cli.compact);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_no_ocr_overrides_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ocr_enabled": true, "ocr_dpi": 200}"#).unwrap();

        let cli = Cli::parse_from([
            "bank-statements",
            "--config",
            path.to_str().unwrap(),
            "--no-ocr",
            "enero.pdf",
        ]);
        let config = load_config(&cli).unwrap();
        assert!(!config.ocr_enabled);
        assert_eq!(config.ocr_dpi, 200);
    }
}
