//! BanBajío business statement parser
//!
//! One statement may carry a peso account (`CUENTA CONECTA BANBAJIO`) and a
//! dollar checking account. Peso amounts print as `$ 1,234.56`, dollar
//! amounts as `1,234.56 USD`. Text often comes from OCR, so it is normalized
//! before any matching.

use super::categorize::CategoryTable;
use super::ocr_text::normalize_ocr_text;
use super::resolve::{direction_by_balance, Direction, TwoTokenRules};
use super::segment::{Block, Segmenter};
use super::{
    capture, capture_or_warn, collapse_whitespace, parse_amount, ParseContext, ParsedStatement,
    StatementParser, StatementText, Summary,
};
use crate::error::StatementError;
use crate::models::{Account, BankVariant, Transaction, NOT_FOUND};
use once_cell::sync::Lazy;
use regex::Regex;

static CUTOFF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)FECHA DE CORTE\s+(\d{1,2}\s+[A-Z]+\s+\d{4})").unwrap());
static PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)PERIODO:\s*(\d+\s+DE\s+[A-Z]+\s+AL\s+\d+\s+DE\s+[A-Z]+\s+DE\s+\d{4})").unwrap()
});
/// Start day and month, plus the closing year
static PERIOD_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)PERIODO:\s*(\d+\s+DE\s+[A-Z]+)\s+AL\s+\d+\s+DE\s+[A-Z]+\s+DE\s+(\d{4})").unwrap()
});
static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"DETALLE DE LA CUENTA:.*?#(\d+)").unwrap());
static OPENING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SALDO INICIAL.*?([\d,]+\.\d{2})").unwrap());
static LEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}\s+[A-Z]{3})").unwrap());
static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s+(.+)$").unwrap());

static PESOS_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s*([\d,]+\.\d{2})").unwrap());
static DOLLARS_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d,]+\.\d{2})\s*USD").unwrap());

static PESOS_SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?s)SALDO ANTERIOR.*?\(\+\)\s*DEPOSITOS.*?\(-\)\s*CARGOS.*?SALDO ACTUAL",
        r".*?\$\s*(?P<opening>[\d,]+\.\d{2})",
        r".*?\$\s*(?P<income>[\d,]+\.\d{2})",
        r".*?\$\s*(?P<expense>[\d,]+\.\d{2})",
        r".*?\$\s*(?P<closing>[\d,]+\.\d{2})",
    ))
    .unwrap()
});
static DOLLARS_SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?s)SALDO ANTERIOR.*?\(\+\)\s*DEPOSITOS.*?\(-\)\s*CARGOS.*?SALDO ACTUAL",
        r".*?(?P<opening>[\d,]+\.\d{2})\s*USD",
        r".*?(?P<income>[\d,]+\.\d{2})\s*USD",
        r".*?(?P<expense>[\d,]+\.\d{2})\s*USD",
        r".*?(?P<closing>[\d,]+\.\d{2})\s*USD",
    ))
    .unwrap()
});

const TERMINATORS: &[&str] = &[
    "SALDO TOTAL",
    "TOTAL DE MOVIMIENTOS",
    "RESUMEN DE",
    "DETALLE DE LA CUENTA",
    "ESTADO DE CUENTA",
];

/// Compared with spaces removed; OCR splits these words unpredictably
const RULES: TwoTokenRules = TwoTokenRules {
    deposit_keywords: &[],
    withdrawal_keywords: &[
        "ENVÍO SPEI",
        "ENVIO SPEI",
        "TRASPASO DE RECURSOS A LA CUENTA",
        "PAGO DE SERVICIO",
        "RETIRO POR DOMICILIACION",
        "COMISION POR",
        "IVA COMISION",
    ],
    default: Some(Direction::Deposit),
    ignore_spaces: true,
};

const CATEGORIES: CategoryTable = CategoryTable::new(&[
    (&["ENVÍO SPEI", "ENVIO SPEI"], "Transferencia SPEI"),
    (&["TRASPASO DE RECURSOS"], "Traspaso de Recursos"),
    (&["DEPÓSITO SPEI", "DEPOSITO SPEI"], "Depósito SPEI"),
    (&["PAGO DE SERVICIO"], "Pago de Servicios"),
    (&["RETIRO POR DOMICILIACION"], "Domiciliación"),
    (&["COMISION", "COMISIÓN"], "Comisión"),
    (&["DEPOSITO DE TRANSFERENCIA"], "Transferencia del Extranjero"),
]);

/// Account sections in the order they are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Pesos,
    Dollars,
}

impl Section {
    /// Heading that opens the section; also used as the account name
    pub fn anchor(self) -> &'static str {
        match self {
            Self::Pesos => "CUENTA CONECTA BANBAJIO",
            Self::Dollars => "CUENTA DE CHEQUES EN DOLARES",
        }
    }

    pub fn currency(self) -> &'static str {
        match self {
            Self::Pesos => "PESOS",
            Self::Dollars => "DOLARES",
        }
    }

    fn token_re(self) -> &'static Regex {
        match self {
            Self::Pesos => &PESOS_TOKEN_RE,
            Self::Dollars => &DOLLARS_TOKEN_RE,
        }
    }

    fn summary_re(self) -> &'static Regex {
        match self {
            Self::Pesos => &PESOS_SUMMARY_RE,
            Self::Dollars => &DOLLARS_SUMMARY_RE,
        }
    }

    /// Amounts in currency notation, in order
    pub fn amounts(self, text: &str) -> Vec<f64> {
        self.token_re()
            .captures_iter(text)
            .filter_map(|c| parse_amount(&c[1]))
            .collect()
    }

    fn strip_amounts(self, text: &str) -> String {
        collapse_whitespace(&self.token_re().replace_all(text, " "))
    }
}

/// Section texts keyed by kind; the peso section stops where the dollar one begins
fn split_sections(text: &str) -> Vec<(Section, &str)> {
    let pesos = text.find(Section::Pesos.anchor());
    let dollars = text.find(Section::Dollars.anchor());

    let mut sections = Vec::new();
    if let Some(start) = pesos {
        let end = dollars.filter(|d| *d > start).unwrap_or(text.len());
        sections.push((Section::Pesos, &text[start..end]));
    }
    if let Some(start) = dollars {
        sections.push((Section::Dollars, &text[start..]));
    }
    sections
}

pub struct BanBajioParser;

impl BanBajioParser {
    pub fn new() -> Self {
        Self
    }

    /// `None` for blocks with fewer than two currency amounts
    fn transaction(
        &self,
        section: Section,
        block: &Block,
        previous_balance: Option<f64>,
    ) -> Option<Transaction> {
        let body = block.body();
        let amounts = section.amounts(&body);
        let &[.., amount, balance] = amounts.as_slice() else {
            return None;
        };

        let (reference, rest) = match REFERENCE_RE.captures(&body) {
            Some(c) => (Some(c[1].to_string()), c[2].to_string()),
            None => (None, body.clone()),
        };
        let description = section.strip_amounts(&rest);

        let direction = previous_balance
            .and_then(|prev| direction_by_balance(prev, amount, balance))
            .or_else(|| RULES.keyword_direction(&description.to_uppercase()))
            .or(RULES.default)
            .unwrap_or(Direction::Deposit);
        let (deposit, withdrawal) = direction.split(amount);

        let description = match &reference {
            Some(r) => format!("{} {}", r, description),
            None => description,
        };
        let category = CATEGORIES.categorize(&description);
        let txn =
            Transaction::movement(&block.date, description, deposit, withdrawal, Some(balance), category);

        Some(match reference {
            Some(r) => txn.with_reference(r),
            None => txn,
        })
    }

    fn transactions(
        &self,
        section: Section,
        ledger: &str,
        period_start: Option<&str>,
        ctx: &mut ParseContext,
    ) -> Vec<Transaction> {
        let mut transactions = Vec::new();

        let ledger = match ledger.find("SALDO INICIAL") {
            Some(pos) => {
                let from_opening = &ledger[pos..];
                if let Some(balance) = capture(&OPENING_RE, from_opening).and_then(|s| parse_amount(&s)) {
                    transactions.push(Transaction::opening_balance(
                        period_start.unwrap_or(""),
                        "Saldo inicial de la cuenta",
                        balance,
                        "Saldo Inicial",
                    ));
                }
                from_opening
            }
            None => {
                ctx.warn(
                    "opening_balance",
                    "SALDO INICIAL line not found; reading the whole account detail",
                    section.anchor(),
                );
                ledger
            }
        };

        let lines = ledger.lines().filter(|l| !l.contains("SALDO INICIAL"));
        let blocks = Segmenter::new(&LEADER_RE, TERMINATORS).segment(lines);
        log::debug!("banbajio: {} blocks in {}", blocks.len(), section.anchor());

        let mut previous = transactions.first().and_then(|t| t.balance);
        for block in &blocks {
            if let Some(txn) = self.transaction(section, block, previous) {
                previous = txn.balance;
                transactions.push(txn);
            }
        }
        transactions
    }

    fn account(
        &self,
        section: Section,
        text: &str,
        period_start: Option<&str>,
        ctx: &mut ParseContext,
    ) -> Account {
        let summary =
            Summary::capture_or_warn(section.summary_re(), text, ctx, "summary").unwrap_or_default();

        let (account_number, transactions) = match ACCOUNT_RE.captures(text) {
            Some(c) => {
                let ledger = &text[c.get(0).map(|m| m.end()).unwrap_or(0)..];
                (c[1].to_string(), self.transactions(section, ledger, period_start, ctx))
            }
            None => {
                ctx.warn("account_number", "DETALLE DE LA CUENTA not found", section.anchor());
                (NOT_FOUND.to_string(), Vec::new())
            }
        };

        summary.into_account(section.anchor(), account_number, section.currency(), transactions)
    }
}

impl Default for BanBajioParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for BanBajioParser {
    fn variant(&self) -> BankVariant {
        BankVariant::BanBajioEmpresarial
    }

    fn parse(
        &self,
        text: &StatementText,
        ctx: &mut ParseContext,
    ) -> Result<ParsedStatement, StatementError> {
        let full_text = normalize_ocr_text(&text.full_text());

        let cutoff_date = capture_or_warn(&CUTOFF_RE, &full_text, ctx, "cutoff_date");
        let statement_period = capture_or_warn(&PERIOD_RE, &full_text, ctx, "statement_period");
        let period_start = PERIOD_START_RE
            .captures(&full_text)
            .map(|c| format!("{} DE {}", &c[1], &c[2]));

        let sections = split_sections(&full_text);
        if sections.is_empty() {
            return Err(StatementError::parse(
                ctx.variant(),
                "neither CUENTA CONECTA BANBAJIO nor CUENTA DE CHEQUES EN DOLARES found",
            ));
        }

        let accounts = sections
            .into_iter()
            .map(|(section, body)| self.account(section, body, period_start.as_deref(), ctx))
            .collect();

        Ok(ParsedStatement {
            statement_period,
            cutoff_date,
            accounts,
        })
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::models::MovementKind;
    use crate::pdf_import::analyze_text;

    const STATEMENT: &str = r#"BANCO DEL BAJIO S.A. INSTITUCION DE BANCA MULTIPLE
PERIODO: 1 DE ENERO AL 31 DE ENERO DE 2024
FECHA DE CORTE 31 ENE 2024
CUENTA CONECTA BANBAJIO
SALDO ANTERIOR (+) DEPOSITOS (-) CARGOS SALDO ACTUAL
$ 10,000.00 $ 5,000.00 $ 2,116.00 $ 12,884.00
DETALLE DE LA CUENTA: CONECTA #0123456
FECHA NO. REF DESCRIPCION DEPOSITOS RETIROS SALDO
SALDO INICIAL $ 10,000.00
3 ENE 998877 DEPOSITO SPEI CLIENTE UNO $ 5,000.00 $ 15,000.00
10 ENE 445566 E N V I O SPEI PROVEEDOR
BENEFICIARIO MATERIALES SA $ 2,000.00 $ 13,000.00
31 ENE COMISION POR MANEJO DE CUENTA $ 100.00 $ 12,900.00
31 ENE IVA COMISION $ 16.00 $ 12,884.00
SALDO TOTAL $ 12,884.00
CUENTA DE CHEQUES EN DOLARES
SALDO ANTERIOR (+) DEPOSITOS (-) CARGOS SALDO ACTUAL
1,000.00 USD 250.00 USD 0.00 USD 1,250.00 USD
DETALLE DE LA CUENTA: DOLARES #0987654
SALDO INICIAL 1,000.00 USD
15 ENE DEPOSITO DE TRANSFERENCIA 250.00 USD 1,250.00 USD"#;

    pub(crate) fn statement() -> StatementText {
        StatementText::from_text(STATEMENT)
    }

    #[test]
    fn test_parse_two_sections() {
        let analysis = analyze_text("bajio.pdf", &StatementText::from_text(STATEMENT)).unwrap();
        assert_eq!(analysis.variant, BankVariant::BanBajioEmpresarial);
        assert_eq!(analysis.cutoff_date.as_deref(), Some("31 ENE 2024"));
        assert_eq!(
            analysis.statement_period.as_deref(),
            Some("1 DE ENERO AL 31 DE ENERO DE 2024")
        );
        assert_eq!(analysis.accounts.len(), 2);

        let pesos = &analysis.accounts[0];
        assert_eq!(pesos.account_name, "CUENTA CONECTA BANBAJIO");
        assert_eq!(pesos.account_number, "0123456");
        assert_eq!(pesos.currency, "PESOS");
        assert!(pesos.reconciles());

        let txns = &pesos.transactions;
        assert_eq!(txns.len(), 5);
        assert_eq!(txns[0].movement_kind, MovementKind::OpeningBalance);
        assert_eq!(txns[0].date, "1 DE ENERO DE 2024");
        assert_eq!(txns[0].balance, Some(10_000.0));

        assert_eq!(txns[1].deposit, 5_000.0);
        assert_eq!(txns[1].reference.as_deref(), Some("998877"));
        assert_eq!(txns[1].description, "998877 DEPOSITO SPEI CLIENTE UNO");
        assert_eq!(txns[1].category, "Depósito SPEI");

        assert_eq!(txns[2].withdrawal, 2_000.0);
        assert_eq!(txns[2].category, "Transferencia SPEI");
        assert_eq!(txns[3].withdrawal, 100.0);
        assert_eq!(txns[4].withdrawal, 16.0);
        assert_eq!(txns[4].balance, Some(12_884.0));

        let dollars = &analysis.accounts[1];
        assert_eq!(dollars.currency, "DOLARES");
        assert_eq!(dollars.account_number, "0987654");
        assert_eq!(dollars.closing_balance_summary, 1_250.0);
        assert_eq!(dollars.transactions.len(), 2);
        assert_eq!(dollars.transactions[1].deposit, 250.0);
        assert_eq!(dollars.transactions[1].category, "Transferencia del Extranjero");
    }

    #[test]
    fn test_keyword_direction_without_balance_history() {
        let block = Block {
            date: "12 ENE".to_string(),
            lines: vec!["12 ENE PAGO DE SERV ICIO TELMEX $ 500.00 $ 1,500.00".to_string()],
        };
        let txn = BanBajioParser::new()
            .transaction(Section::Pesos, &block, None)
            .unwrap();
        assert_eq!(txn.withdrawal, 500.0);
        assert_eq!(txn.category, "Otro");
    }

    #[test]
    fn test_single_token_block_dropped() {
        let block = Block {
            date: "12 ENE".to_string(),
            lines: vec!["12 ENE AVISO $ 500.00".to_string()],
        };
        assert!(BanBajioParser::new()
            .transaction(Section::Pesos, &block, Some(100.0))
            .is_none());
    }

    #[test]
    fn test_missing_sections_is_parse_error() {
        let mut ctx = ParseContext::new(BankVariant::BanBajioEmpresarial);
        let err = BanBajioParser::new()
            .parse(&StatementText::from_text("BANCO DEL BAJIO S.A."), &mut ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            StatementError::Parse {
                variant: BankVariant::BanBajioEmpresarial,
                ..
            }
        ));
        assert_eq!(ctx.warnings().len(), 2);
    }

    #[test]
    fn test_missing_opening_line_warns() {
        let text = STATEMENT.replace("SALDO INICIAL $ 10,000.00\n", "");
        let analysis = analyze_text("bajio.pdf", &StatementText::from_text(&text)).unwrap();

        let pesos = &analysis.accounts[0];
        assert_eq!(pesos.transactions.len(), 4);
        assert!(pesos
            .transactions
            .iter()
            .all(|t| t.movement_kind != MovementKind::OpeningBalance));
        assert_eq!(pesos.transactions[0].deposit, 5_000.0);
        assert_eq!(pesos.transactions[3].withdrawal, 16.0);

        let opening: Vec<_> = analysis
            .warnings
            .iter()
            .filter(|w| w.field == "opening_balance")
            .collect();
        assert_eq!(opening.len(), 1);
        assert_eq!(opening[0].severity, crate::models::WarningSeverity::Warning);
        assert_eq!(opening[0].raw_value, "CUENTA CONECTA BANBAJIO");

        // The dollar account still has its own opening line
        assert_eq!(
            analysis.accounts[1].transactions[0].movement_kind,
            MovementKind::OpeningBalance
        );
    }

    #[test]
    fn test_missing_account_number() {
        let text = "CUENTA CONECTA BANBAJIO\nSIN DETALLE";
        let mut ctx = ParseContext::new(BankVariant::BanBajioEmpresarial);
        let parsed = BanBajioParser::new()
            .parse(&StatementText::from_text(text), &mut ctx)
            .unwrap();
        assert_eq!(parsed.accounts[0].account_number, NOT_FOUND);
        assert!(parsed.accounts[0].transactions.is_empty());
        assert_eq!(parsed.accounts[0].opening_balance_summary, 0.0);
    }
}
