//! Layout pieces shared by both Banamex statement families

use super::{capture, ParseContext, StatementText, Summary};
use once_cell::sync::Lazy;
use regex::Regex;

pub(super) const CURRENCY: &str = "PESOS";

const OPERATIONS_HEADING: &str = "DETALLE DE OPERACIONES";

static CUTOFF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ESTADO DE CUENTA AL\s+(.*)").unwrap());

/// `Saldo Anterior` → `N Depósitos` → `N Retiros` → `SALDO AL <fecha>`
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?s)Saldo Anterior\s*\$?\s*(?P<opening>[\d,]+\.\d{2})",
        r".*?(?P<deposits>\d+)\s*Dep[oó]sitos.*?(?P<income>[\d,]+\.\d{2})",
        r".*?(?P<withdrawals>\d+)\s*Retiros.*?(?P<expense>[\d,]+\.\d{2})",
        r".*?SALDO AL\s+\d{1,2}\s+DE\s+[A-ZÁÉÍÓÚ]+\s+DE\s+\d{4}\s*\$?\s*(?P<closing>[\d,]+\.\d{2})",
    ))
    .unwrap()
});

/// Bank-internal footer codes printed at the bottom of ledger pages
static FOOTER_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[\d.A-Z]+\.OD\.\d{4}\.\d{2}.*$").unwrap());

static COLUMN_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*FECHA\s+CONCEPTO\s+RETIROS\s+DEPOSITOS\s+SALDO\s*$").unwrap()
});

pub(super) fn cutoff_date(first_page: &str, ctx: &mut ParseContext) -> Option<String> {
    let cutoff = capture(&CUTOFF_RE, first_page);
    if cutoff.is_none() {
        ctx.warn("cutoff_date", "cutoff date not found", "");
    }
    cutoff
}

/// `"<start> AL <end>"` from a `RESUMEN DEL` style line
pub(super) fn period(re: &Regex, first_page: &str, ctx: &mut ParseContext) -> Option<String> {
    let period = re
        .captures(first_page)
        .map(|c| format!("{} AL {}", c[1].trim(), c[2].trim()));
    if period.is_none() {
        ctx.warn("statement_period", "statement period not found", "");
    }
    period
}

/// Summary figures; `None` (with a warning) when the block is missing
pub(super) fn summary(first_page: &str, ctx: &mut ParseContext) -> Option<Summary> {
    let Some(caps) = SUMMARY_RE.captures(first_page) else {
        ctx.warn("summary", "summary block not found; totals set to 0.00", "");
        return None;
    };
    log::debug!(
        "{}: summary lists {} deposits and {} withdrawals",
        ctx.variant(),
        &caps["deposits"],
        &caps["withdrawals"]
    );
    Summary::capture(&SUMMARY_RE, first_page)
}

/// Ledger text of every page carrying the operations heading.
///
/// Footer codes and the column header row are removed and only the text
/// after the last heading occurrence on each page is kept. With a
/// `terminator`, each page is also cut where it appears.
pub(super) fn operations_text(text: &StatementText, terminator: Option<&str>) -> String {
    let mut out = String::new();

    for page in text.pages() {
        let Some(pos) = page.rfind(OPERATIONS_HEADING) else {
            continue;
        };
        let mut section = &page[pos + OPERATIONS_HEADING.len()..];
        if let Some(end) = terminator.and_then(|t| section.find(t)) {
            section = &section[..end];
        }
        let section = FOOTER_CODE_RE.replace_all(section, "");
        let section = COLUMN_HEADER_RE.replace_all(&section, "");
        out.push_str(section.trim());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BankVariant;

    const FIRST_PAGE: &str = r#"ESTADO DE CUENTA AL 31 DE ENERO DE 2024
RESUMEN DEL 01 DE ENERO AL 31 DE ENERO DE 2024
Saldo Anterior $4,000.00
3 Depósitos $ 1,500.00
2 Retiros $ 700.00
SALDO AL 31 DE ENERO DE 2024 $4,800.00"#;

    #[test]
    fn test_compound_summary() {
        let mut ctx = ParseContext::new(BankVariant::BanamexPersonal);
        let s = summary(FIRST_PAGE, &mut ctx).unwrap();
        assert_eq!((s.opening, s.income, s.expense, s.closing), (4_000.0, 1_500.0, 700.0, 4_800.0));
        assert!(ctx.warnings().is_empty());
        assert_eq!(cutoff_date(FIRST_PAGE, &mut ctx).as_deref(), Some("31 DE ENERO DE 2024"));
    }

    #[test]
    fn test_summary_counts_glued_to_labels() {
        let page = FIRST_PAGE
            .replace("3 Depósitos", "3Depósitos")
            .replace("2 Retiros", "2Retiros");
        let mut ctx = ParseContext::new(BankVariant::BanamexEmpresarial);
        let s = summary(&page, &mut ctx).unwrap();
        assert_eq!((s.opening, s.income, s.expense, s.closing), (4_000.0, 1_500.0, 700.0, 4_800.0));
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_missing_summary_zeroes() {
        let mut ctx = ParseContext::new(BankVariant::BanamexPersonal);
        assert_eq!(summary("Saldo Anterior $4,000.00", &mut ctx), None);
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn test_operations_text() {
        let text = StatementText::new(vec![
            "RESUMEN\nsin detalle".to_string(),
            "DETALLE DE OPERACIONES\nFECHA CONCEPTO RETIROS DEPOSITOS SALDO\n02 ENE PAGO 1.00 2.00\n000123.B07.OD.0101.01\nSALDO MINIMO REQUERIDO 3,000.00\n".to_string(),
        ]);
        let ops = operations_text(&text, Some("SALDO MINIMO REQUERIDO"));
        assert_eq!(ops.trim(), "02 ENE PAGO 1.00 2.00");
    }
}
