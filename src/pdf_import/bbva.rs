//! BBVA México (Maestra PyME) statement parser
//!
//! Every movement row carries a short operation code. Most codes always move
//! money the same way; `N06` (third-party payments) can go either way and is
//! decided from the description. Unknown codes fall back to description
//! keywords and finally to a withdrawal.

use super::categorize::CategoryTable;
use super::resolve::{Direction, TwoTokenRules};
use super::segment::{Block, Segmenter};
use super::{
    account_number_or_sentinel, capture, capture_or_warn, find_amounts, ParseContext,
    ParsedStatement, StatementParser, StatementText, Summary,
};
use crate::error::StatementError;
use crate::models::{BankVariant, Transaction};
use once_cell::sync::Lazy;
use regex::Regex;

const CURRENCY: &str = "PESOS";
const DEFAULT_ACCOUNT_NAME: &str = "No Identificada";
const MOVEMENTS_START: &str = "Detalle de Movimientos Realizados";
const MOVEMENTS_END: &str = "Total de Movimientos";

static PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Periodo\s*DEL\s*(\d{2}/\d{2}/\d{4})\s*AL\s*(\d{2}/\d{2}/\d{4})").unwrap()
});
static CUTOFF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Fecha de Corte\s*(\d{2}/\d{2}/\d{4})").unwrap());
static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"No\. de Cuenta\s*(\d+)").unwrap());
static ACCOUNT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Estado de Cuenta\s*(MAESTRA PYME BBVA)").unwrap());

/// Balance summary ("Comportamiento")
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?is)Saldo de Operaci[oó]n Inicial\s+(?P<opening>[\d,]+\.\d{2})",
        r".*?Dep[oó]sitos\s*/\s*Abonos\s*\(\+\)\s+\d+\s+(?P<income>[\d,]+\.\d{2})",
        r".*?Retiros\s*/\s*Cargos\s*\(-\)\s+\d+\s+(?P<expense>[\d,]+\.\d{2})",
        r".*?Saldo Final\s*\(\+\)\s+(?P<closing>[\d,]+\.\d{2})",
    ))
    .unwrap()
});

/// Operation date, settlement date, operation code
static LEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}/[A-Z]{3})\s+(\d{2}/[A-Z]{3})\s+([A-Z0-9]+)").unwrap());

/// Statement boilerplate that interrupts the movements table
const INSTITUTIONAL_PHRASES: &[&str] = &[
    "ESTIMADO CLIENTE",
    "SU ESTADO DE CUENTA HA SIDO MODIFICADO",
    "TAMBIÉN LE INFORMAMOS QUE SU CONTRATO HA SIDO MODIFICADO",
    "WWW.BBVA.MX",
    "CON BBVA ADELANTE",
    "LA GAT REAL",
    "BBVA MEXICO",
    "PAGINA",
    "AV. PASEO DE LA REFORMA",
    "ESTADO DE CUENTA",
    "RFC",
    "NO. CUENTA",
    "NO. CLIENTE",
    "CIUDAD DE MÉXICO",
    "MAESTRA PYME BBVA",
];

/// Column-header fragments repeated on each page
const HEADER_WORDS: &[&str] = &[
    "FECHA",
    "OPER",
    "LIQ",
    "COD.",
    "DESCRIPCIÓN",
    "REFERENCIA",
    "CARGOS",
    "ABONOS",
    "OPERACIÓN",
    "LIQUIDACIÓN",
];

const WITHDRAWAL_CODES: &[&str] = &["C03", "T17", "S39", "S40", "P14", "P31"];
const DEPOSIT_CODES: &[&str] = &["T20", "C02", "W02", "M97", "Y45"];

/// Code whose direction depends on the description
const THIRD_PARTY_CODE: &str = "N06";
const N06_CHARGE_WORDS: &[&str] = &["PAGO", "PAGO A TERCERO", "PAGO CUENTA"];
const N06_CREDIT_WORDS: &[&str] = &["ABONO", "DEPOSITO", "REEMBOLSO"];

/// Unknown codes
const GENERIC_RULES: TwoTokenRules = TwoTokenRules {
    deposit_keywords: &["RECIBIDO", "DEPOSITO", "ABONO", "INGRESO"],
    withdrawal_keywords: &["PAGO", "ENVIADO", "CARGO", "COMISION"],
    default: Some(Direction::Withdrawal),
    ignore_spaces: false,
};

const CATEGORIES: CategoryTable = CategoryTable::new(&[
    (&["SPEI RECIBIDO"], "Transferencia SPEI Recibida"),
    (&["SPEI ENVIADO"], "Transferencia SPEI Enviada"),
    (&["CHEQUE PAGADO"], "Cheque Cobrado"),
    (&["DEPOSITO EN EFECTIVO"], "Depósito en Efectivo"),
    (&["DEPOSITO CHEQUE"], "Depósito de Cheque"),
    (&["DEPOSITO DE TERCERO"], "Depósito de Tercero"),
    (&["SERV BANCA INTERNET"], "Comisión Banca Internet"),
    (&["CFE SUMINISTRADOR"], "Pago de Servicio (CFE)"),
    (&["COMPENSACION"], "Compensación Bancaria"),
]);

/// Which rule tier decided a code's direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRule {
    FixedCode,
    ThirdPartyKeywords,
    GenericKeywords,
}

/// Direction for an operation code and upper-cased description
pub fn classify(code: &str, description_upper: &str) -> (Direction, CodeRule) {
    if WITHDRAWAL_CODES.contains(&code) {
        return (Direction::Withdrawal, CodeRule::FixedCode);
    }
    if DEPOSIT_CODES.contains(&code) {
        return (Direction::Deposit, CodeRule::FixedCode);
    }
    if code == THIRD_PARTY_CODE {
        let charge = N06_CHARGE_WORDS.iter().any(|w| description_upper.contains(w));
        let credit = N06_CREDIT_WORDS.iter().any(|w| description_upper.contains(w));
        let direction = match (charge, credit) {
            (false, true) => Direction::Deposit,
            // BNET (online banking) rows and undecided rows count as charges
            _ => Direction::Withdrawal,
        };
        return (direction, CodeRule::ThirdPartyKeywords);
    }
    let direction = GENERIC_RULES
        .keyword_direction(description_upper)
        .or(GENERIC_RULES.default)
        .unwrap_or(Direction::Withdrawal);
    (direction, CodeRule::GenericKeywords)
}

fn categorize(code: &str, description: &str, direction: Direction) -> &'static str {
    if code == THIRD_PARTY_CODE {
        return match direction {
            Direction::Withdrawal if description.to_uppercase().contains("REEMBOLSO") => {
                "Reembolso Enviado (N06)"
            }
            Direction::Withdrawal => "Pago a Terceros (N06)",
            Direction::Deposit => "Cobro de Terceros (N06)",
        };
    }
    CATEGORIES.categorize(description)
}

fn is_institutional(line: &str) -> bool {
    let upper = line.to_uppercase();
    INSTITUTIONAL_PHRASES.iter().any(|p| upper.contains(p))
}

fn is_column_header(line: &str) -> bool {
    let upper = line.to_uppercase();
    HEADER_WORDS.iter().any(|w| upper.contains(w))
}

/// Text before the first monetary token
fn text_before_amounts(line: &str) -> &str {
    match find_amounts(line).first() {
        Some(token) => line[..token.start].trim(),
        None => line.trim(),
    }
}

pub struct BbvaParser;

impl BbvaParser {
    pub fn new() -> Self {
        Self
    }

    /// `None` when the leader line carries no amount
    fn transaction(&self, block: &Block) -> Option<Transaction> {
        let caps = LEADER_RE.captures(block.first_line())?;
        let code = caps.get(3)?.as_str();
        let rest = block.first_line()[caps.get(0)?.end()..].trim();

        let amounts = find_amounts(rest);
        let amount = amounts.first()?.value;

        let mut parts = vec![text_before_amounts(rest)];
        parts.extend(
            block
                .continuation()
                .iter()
                .filter(|l| !is_institutional(l) && !is_column_header(l))
                .map(|l| text_before_amounts(l)),
        );
        parts.retain(|p| !p.is_empty());
        let description = parts.join(" ");

        let (direction, rule) = classify(code, &description.to_uppercase());
        log::debug!("bbva: {} {} -> {:?} ({:?})", block.date, code, direction, rule);

        let balance = match amounts.as_slice() {
            [_, .., last] if last.value != amount => Some(last.value),
            _ => None,
        };
        let (deposit, withdrawal) = direction.split(amount);
        let category = categorize(code, &description, direction);

        Some(
            Transaction::movement(&block.date, description, deposit, withdrawal, balance, category)
                .with_code(code),
        )
    }

    fn transactions(&self, full_text: &str, ctx: &mut ParseContext) -> Vec<Transaction> {
        let Some(start) = full_text.find(MOVEMENTS_START) else {
            ctx.error("transactions", "movements section not found", MOVEMENTS_START);
            return Vec::new();
        };
        let end = full_text[start..]
            .find(MOVEMENTS_END)
            .map(|i| start + i)
            .unwrap_or(full_text.len());

        let blocks = Segmenter::new(&LEADER_RE, &[]).segment(full_text[start..end].lines());
        log::debug!("bbva: {} movement blocks", blocks.len());

        blocks.iter().filter_map(|b| self.transaction(b)).collect()
    }
}

impl Default for BbvaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for BbvaParser {
    fn variant(&self) -> BankVariant {
        BankVariant::Bbva
    }

    fn parse(
        &self,
        text: &StatementText,
        ctx: &mut ParseContext,
    ) -> Result<ParsedStatement, StatementError> {
        let full_text = text.full_text();

        let statement_period = PERIOD_RE
            .captures(&full_text)
            .map(|c| format!("DEL {} AL {}", &c[1], &c[2]));
        if statement_period.is_none() {
            ctx.warn("statement_period", "statement period not found", "");
        }
        let cutoff_date = capture_or_warn(&CUTOFF_RE, &full_text, ctx, "cutoff_date");
        let account_number = account_number_or_sentinel(&ACCOUNT_RE, &full_text, ctx);
        let account_name =
            capture(&ACCOUNT_NAME_RE, &full_text).unwrap_or_else(|| DEFAULT_ACCOUNT_NAME.to_string());
        let summary =
            Summary::capture_or_warn(&SUMMARY_RE, &full_text, ctx, "summary").unwrap_or_default();

        let transactions = self.transactions(&full_text, ctx);

        Ok(ParsedStatement {
            statement_period,
            cutoff_date,
            accounts: vec![summary.into_account(account_name, account_number, CURRENCY, transactions)],
        })
    }
}
