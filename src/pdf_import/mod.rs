//! PDF Bank Statement Import Module
//!
//! Extracts account ledgers from Mexican bank statements. Each supported
//! bank/account layout has its own [`StatementParser`]; the issuing bank is
//! recognized from anchor phrases on the first page.

pub mod assemble;
mod banamex;
pub mod banamex_empresarial;
pub mod banamex_personal;
pub mod banbajio;
pub mod banorte;
pub mod bbva;
pub mod categorize;
pub mod identify;
pub mod ocr;
pub mod ocr_text;
pub mod resolve;
pub mod santander;
pub mod scotiabank;
pub mod segment;

use crate::config::ExtractorConfig;
use crate::error::StatementError;
use crate::models::{
    Account, BankVariant, ParseWarning, StatementAnalysis, Transaction, WarningSeverity, NOT_FOUND,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Monetary token as printed: `1,234.56`, `0.00`
static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})+\.\d{2}|\d+\.\d{2}").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Extracted text, one entry per page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementText {
    pages: Vec<String>,
}

impl StatementText {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Single-page text, mostly for fixtures
    pub fn from_text(text: &str) -> Self {
        Self {
            pages: vec![text.to_string()],
        }
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn first_page(&self) -> &str {
        self.pages.first().map(String::as_str).unwrap_or("")
    }

    /// All pages joined with a newline
    pub fn full_text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.trim().is_empty())
    }
}

/// Collects partial-extraction notes while a parser runs
#[derive(Debug)]
pub struct ParseContext {
    variant: BankVariant,
    warnings: Vec<ParseWarning>,
}

impl ParseContext {
    pub fn new(variant: BankVariant) -> Self {
        Self {
            variant,
            warnings: Vec::new(),
        }
    }

    pub fn variant(&self) -> BankVariant {
        self.variant
    }

    fn push(&mut self, severity: WarningSeverity, field: &str, message: &str, raw_value: &str) {
        self.warnings.push(ParseWarning {
            severity,
            field: field.to_string(),
            message: message.to_string(),
            raw_value: raw_value.to_string(),
        });
    }

    /// A field fell back to a sentinel or zero
    pub fn warn(&mut self, field: &str, message: &str, raw_value: &str) {
        log::warn!("{}: {} ({})", self.variant, message, field);
        self.push(WarningSeverity::Warning, field, message, raw_value);
    }

    pub fn info(&mut self, field: &str, message: &str, raw_value: &str) {
        log::debug!("{}: {} ({})", self.variant, message, field);
        self.push(WarningSeverity::Info, field, message, raw_value);
    }

    /// A whole section could not be read; the ledger is incomplete
    pub fn error(&mut self, field: &str, message: &str, raw_value: &str) {
        log::warn!("{}: {} ({})", self.variant, message, field);
        self.push(WarningSeverity::Error, field, message, raw_value);
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ParseWarning> {
        self.warnings
    }
}

/// Parser output before assembly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStatement {
    pub statement_period: Option<String>,
    pub cutoff_date: Option<String>,
    pub accounts: Vec<Account>,
}

/// Statement parser for one bank/account layout
pub trait StatementParser: Send + Sync {
    /// Layout this parser handles
    fn variant(&self) -> BankVariant;

    /// Parse extracted text into accounts and ledgers
    fn parse(
        &self,
        text: &StatementText,
        ctx: &mut ParseContext,
    ) -> Result<ParsedStatement, StatementError>;
}

pub fn parser_for(variant: BankVariant) -> Box<dyn StatementParser> {
    match variant {
        BankVariant::BanamexPersonal => Box::new(banamex_personal::BanamexPersonalParser::new()),
        BankVariant::BanamexEmpresarial => {
            Box::new(banamex_empresarial::BanamexEmpresarialParser::new())
        }
        BankVariant::BanBajioEmpresarial => Box::new(banbajio::BanBajioParser::new()),
        BankVariant::Bbva => Box::new(bbva::BbvaParser::new()),
        BankVariant::Banorte => Box::new(banorte::BanorteParser::new()),
        BankVariant::ScotiabankPyme => Box::new(scotiabank::ScotiabankParser::new()),
        BankVariant::Santander => Box::new(santander::SantanderParser::new()),
    }
}

/// All available statement parsers
pub fn get_parsers() -> Vec<Box<dyn StatementParser>> {
    BankVariant::ALL.iter().map(|v| parser_for(*v)).collect()
}

/// Extract per-page text from a PDF file
pub fn extract_pdf_pages(pdf_path: &Path) -> Result<StatementText, StatementError> {
    let bytes = std::fs::read(pdf_path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| unreadable(pdf_path, e))?;
    if pages.is_empty() {
        return Err(no_pages(pdf_path));
    }
    Ok(StatementText::new(pages))
}

fn unreadable(pdf_path: &Path, e: impl std::fmt::Display) -> StatementError {
    StatementError::EmptyOrUnreadableDocument(format!(
        "failed to extract text from {}: {}",
        pdf_path.display(),
        e
    ))
}

fn no_pages(pdf_path: &Path) -> StatementError {
    StatementError::EmptyOrUnreadableDocument(format!("{} has no pages", pdf_path.display()))
}

/// Analyze a statement PDF, falling back to OCR for image-only documents
pub async fn analyze_pdf(
    pdf_path: impl AsRef<Path>,
    config: &ExtractorConfig,
) -> Result<StatementAnalysis, StatementError> {
    let pdf_path = pdf_path.as_ref();
    log::info!("PDF Import: Analyzing {}", pdf_path.display());

    // A document without pages has nothing to rasterize either
    let bytes = std::fs::read(pdf_path)?;
    let mut text = match pdf_extract::extract_text_from_mem_by_pages(&bytes) {
        Ok(pages) if pages.is_empty() => return Err(no_pages(pdf_path)),
        Ok(pages) => StatementText::new(pages),
        Err(e) if config.ocr_enabled => {
            log::warn!("PDF Import: {}, trying OCR", unreadable(pdf_path, e));
            StatementText::default()
        }
        Err(e) => return Err(unreadable(pdf_path, e)),
    };

    if config.ocr_enabled && ocr::should_use_ocr_fallback(&text.full_text(), config.min_text_chars)
    {
        log::info!(
            "PDF Import: Text layer too short ({} pages), using OCR",
            text.page_count()
        );
        text = ocr::ocr_pdf(pdf_path, &ocr::OcrOptions::from(config)).await?;
    }

    analyze_text(&assemble::file_name(pdf_path), &text)
}

/// Identify, parse and assemble already-extracted text
pub fn analyze_text(
    file_name: &str,
    text: &StatementText,
) -> Result<StatementAnalysis, StatementError> {
    if text.is_empty() {
        return Err(StatementError::EmptyOrUnreadableDocument(format!(
            "{}: no extractable text",
            file_name
        )));
    }

    let first_page = text.first_page();
    let bank = identify::identify_bank(first_page)
        .ok_or(StatementError::UnsupportedDocument { bank: None })?;
    let variant = identify::identify_account_variant(bank, first_page)
        .ok_or(StatementError::UnsupportedDocument { bank: Some(bank) })?;

    log::info!(
        "PDF Import: {} identified as {} ({} pages)",
        file_name,
        variant,
        text.page_count()
    );

    let parser = parser_for(variant);
    let mut ctx = ParseContext::new(variant);
    let parsed = parser.parse(text, &mut ctx)?;

    Ok(assemble::assemble(file_name, variant, parsed, ctx.into_warnings()))
}

/// Monetary token found in a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountToken {
    pub value: f64,
    pub start: usize,
    pub end: usize,
}

/// Parse a Mexican-format amount (`$1,234.56`, `1,234.56 USD` -> 1234.56)
pub fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches("USD")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// All monetary tokens in `text`, in order of appearance
pub fn find_amounts(text: &str) -> Vec<AmountToken> {
    AMOUNT_RE
        .find_iter(text)
        .filter_map(|m| {
            parse_amount(m.as_str()).map(|value| AmountToken {
                value,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect()
}

pub fn amount_values(text: &str) -> Vec<f64> {
    find_amounts(text).into_iter().map(|t| t.value).collect()
}

/// Remove monetary tokens (and stray `$`) and collapse whitespace
pub fn strip_amounts(text: &str) -> String {
    let without = AMOUNT_RE.replace_all(text, " ");
    collapse_whitespace(&without.replace('$', " "))
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// First capture group of `re` in `text`, trimmed
pub fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Opening/income/expense/closing figures from a statement's summary block
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub opening: f64,
    pub income: f64,
    pub expense: f64,
    pub closing: f64,
}

impl Summary {
    /// Read the `opening`, `income`, `expense` and `closing` named groups
    pub fn capture(re: &Regex, text: &str) -> Option<Self> {
        let caps = re.captures(text)?;
        let value = |name: &str| caps.name(name).and_then(|m| parse_amount(m.as_str()));
        Some(Self {
            opening: value("opening")?,
            income: value("income")?,
            expense: value("expense")?,
            closing: value("closing")?,
        })
    }

    /// Like [`Summary::capture`], but records a warning on a miss.
    /// Callers zero the totals with `unwrap_or_default`.
    pub fn capture_or_warn(
        re: &Regex,
        text: &str,
        ctx: &mut ParseContext,
        field: &str,
    ) -> Option<Self> {
        let summary = Self::capture(re, text);
        if summary.is_none() {
            ctx.warn(field, "summary block not found; totals set to 0.00", "");
        }
        summary
    }

    /// Totals taken from the ledger itself
    pub fn from_ledger(opening: f64, transactions: &[Transaction]) -> Self {
        let income: f64 = transactions.iter().map(|t| t.deposit).sum();
        let expense: f64 = transactions.iter().map(|t| t.withdrawal).sum();
        Self {
            opening,
            income,
            expense,
            closing: opening + income - expense,
        }
    }

    pub fn into_account(
        self,
        account_name: impl Into<String>,
        account_number: impl Into<String>,
        currency: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Account {
        Account {
            account_name: account_name.into(),
            account_number: account_number.into(),
            currency: currency.into(),
            opening_balance_summary: self.opening,
            closing_balance_summary: self.closing,
            total_income: self.income,
            total_expense: self.expense,
            transactions,
        }
    }
}

/// Header field with a warning when absent
pub fn capture_or_warn(re: &Regex, text: &str, ctx: &mut ParseContext, field: &str) -> Option<String> {
    let value = capture(re, text);
    if value.is_none() {
        ctx.warn(field, &format!("{} not found", field), "");
    }
    value
}

/// Account number or the `No encontrado` sentinel
pub fn account_number_or_sentinel(
    re: &Regex,
    text: &str,
    ctx: &mut ParseContext,
) -> String {
    capture_or_warn(re, text, ctx, "account_number").unwrap_or_else(|| NOT_FOUND.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BALANCE_TOLERANCE;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("$ 45,000.00"), Some(45000.0));
        assert_eq!(parse_amount("1,250.75 USD"), Some(1250.75));
        assert_eq!(parse_amount("0.00"), Some(0.0));
        assert_eq!(parse_amount("ABC"), None);
    }

    #[test]
    fn test_find_amounts() {
        let line = "15 ENE DEPOSITO SPEI RECIBIDO 1,000.00 5,000.00";
        let tokens = find_amounts(line);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].value, 1000.0);
        assert_eq!(tokens[1].value, 5000.0);
        assert_eq!(&line[tokens[1].start..tokens[1].end], "5,000.00");
    }

    #[test]
    fn test_find_amounts_ignores_plain_numbers() {
        assert!(find_amounts("REF 0012345 CUENTA 7001234").is_empty());
    }

    #[test]
    fn test_strip_amounts() {
        assert_eq!(
            strip_amounts("PAGO  RECIBIDO $ 1,000.00   2,000.00 "),
            "PAGO RECIBIDO"
        );
    }

    #[test]
    fn test_statement_text() {
        let text = StatementText::new(vec![
            "portada".to_string(),
            "DETALLE DE OPERACIONES\n15 ENE".to_string(),
        ]);
        assert_eq!(text.first_page(), "portada");
        assert_eq!(text.page_count(), 2);
        assert_eq!(text.full_text(), "portada\nDETALLE DE OPERACIONES\n15 ENE");
        assert!(!text.is_empty());
        assert!(StatementText::new(vec!["  \n".to_string()]).is_empty());
        assert!(StatementText::default().is_empty());
    }

    #[test]
    fn test_empty_text_is_unreadable() {
        let err = analyze_text("vacio.pdf", &StatementText::default()).unwrap_err();
        assert!(matches!(err, StatementError::EmptyOrUnreadableDocument(_)));
    }

    #[test]
    fn test_unknown_bank_is_unsupported() {
        let text = StatementText::from_text("ESTADO DE CUENTA\nBANCO DESCONOCIDO S.A.\n");
        let err = analyze_text("otro.pdf", &text).unwrap_err();
        assert!(matches!(err, StatementError::UnsupportedDocument { bank: None }));
    }

    #[test]
    fn test_unknown_banamex_layout_is_unsupported() {
        let text = StatementText::from_text("RESUMEN POR MEDIOS DE ACCESO\nCUENTA DE INVERSION\n");
        let err = analyze_text("banamex.pdf", &text).unwrap_err();
        assert!(matches!(
            err,
            StatementError::UnsupportedDocument {
                bank: Some(crate::models::BankTag::Banamex)
            }
        ));
    }

    #[test]
    fn test_every_variant_has_a_parser() {
        let parsers = get_parsers();
        assert_eq!(parsers.len(), BankVariant::ALL.len());
        for (parser, variant) in parsers.iter().zip(BankVariant::ALL) {
            assert_eq!(parser.variant(), variant);
        }
    }

    #[test]
    fn test_fixture_ledgers_are_consistent() {
        let fixtures = [
            ("micuenta.pdf", BankVariant::BanamexPersonal, banamex_personal::tests::statement()),
            ("empresa.pdf", BankVariant::BanamexEmpresarial, banamex_empresarial::tests::statement()),
            ("bajio.pdf", BankVariant::BanBajioEmpresarial, banbajio::tests::statement()),
            ("banorte.pdf", BankVariant::Banorte, banorte::tests::statement()),
            ("bbva.pdf", BankVariant::Bbva, bbva::tests::statement()),
            ("santander.pdf", BankVariant::Santander, santander::tests::statement()),
            ("scotia.pdf", BankVariant::ScotiabankPyme, scotiabank::tests::statement()),
        ];
        assert_eq!(fixtures.len(), BankVariant::ALL.len());

        for (file_name, variant, text) in &fixtures {
            let analysis = analyze_text(file_name, text).unwrap();
            assert_eq!(analysis.variant, *variant);
            assert!(!analysis.accounts.is_empty(), "{}: no accounts", file_name);

            for account in &analysis.accounts {
                let label = format!("{} / {}", file_name, account.account_name);
                assert!(account.reconciles(), "{}: summary does not reconcile", label);
                assert!(
                    (account.ledger_income() - account.total_income).abs() < BALANCE_TOLERANCE,
                    "{}: ledger income {} vs {}",
                    label,
                    account.ledger_income(),
                    account.total_income
                );
                assert!(
                    (account.ledger_expense() - account.total_expense).abs() < BALANCE_TOLERANCE,
                    "{}: ledger expense {} vs {}",
                    label,
                    account.ledger_expense(),
                    account.total_expense
                );
                for txn in &account.transactions {
                    assert!(
                        txn.deposit == 0.0 || txn.withdrawal == 0.0,
                        "{}: both columns filled on {:?}",
                        label,
                        txn
                    );
                    assert!(txn.deposit >= 0.0 && txn.withdrawal >= 0.0, "{}: {:?}", label, txn);
                }
            }
        }
    }

    /// Minimal well-formed PDF whose page tree has no kids
    fn zero_page_pdf() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [] /Count 0 >>",
        ];
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    #[tokio::test]
    async fn test_zero_page_pdf_is_unreadable_not_ocr() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        std::io::Write::write_all(&mut file, &zero_page_pdf()).unwrap();

        // OCR on, with a rasterizer that would fail if it were ever reached
        let config = ExtractorConfig {
            ocr_enabled: true,
            pdftoppm_cmd: "/nonexistent/pdftoppm".to_string(),
            tesseract_cmd: "/nonexistent/tesseract".to_string(),
            ..ExtractorConfig::default()
        };
        let err = analyze_pdf(file.path(), &config).await.unwrap_err();
        assert!(
            matches!(err, StatementError::EmptyOrUnreadableDocument(ref msg) if msg.contains("no pages")),
            "unexpected error: {:?}",
            err
        );

        let err = extract_pdf_pages(file.path()).unwrap_err();
        assert!(matches!(err, StatementError::EmptyOrUnreadableDocument(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let config = ExtractorConfig {
            ocr_enabled: false,
            ..ExtractorConfig::default()
        };
        let err = analyze_pdf("/nonexistent/estado.pdf", &config).await.unwrap_err();
        assert!(matches!(err, StatementError::Io(_)));
    }
}
