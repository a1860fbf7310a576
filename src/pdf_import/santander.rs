//! Santander statement parser
//!
//! Santander statements are usually image-only, so the text normally comes
//! from OCR. A statement carries the checking account and, optionally, the
//! DineroCreciente savings pocket, which has no summary block of its own.

use super::categorize::CategoryTable;
use super::ocr_text::normalize_ocr_text;
use super::resolve::{
    continuity_among, direction_by_balance, Direction, ManyTokenPolicy, Resolver, TwoTokenRules,
};
use super::{
    account_number_or_sentinel, capture_or_warn, collapse_whitespace, find_amounts, ParseContext, ParsedStatement, StatementParser, StatementText, Summary,
};
use crate::error::StatementError;
use crate::models::{Account, BankVariant, Transaction};
use once_cell::sync::Lazy;
use regex::Regex;

const CURRENCY: &str = "PESOS";
const CHECKING_NAME: &str = "Cuenta de cheques";
const SAVINGS_NAME: &str = "DineroCreciente";

const CHECKING_HEADING: &str = "Detalle de movimientos cuenta de cheques";
const SAVINGS_HEADING: &str = "Detalles de movimientos Dinero Creciente Santander";
const FISCAL_HEADING: &str = "Información fiscal";

static PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PERIODO\s*DEL\s*(\d{2}-[A-Z]{3}-\d{4})\s*AL\s*(\d{2}-[A-Z]{3}-\d{4})").unwrap()
});
static CUTOFF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Fecha de corte\s*:?\s*(\d{2}-[A-Z]{3}-\d{4})").unwrap());
static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)N(?:o\.?|[uú]mero)\s*de\s*cuenta\s*:?\s*(\d[\d-]*\d)").unwrap()
});

/// Checking summary, labels at most three lines apart
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"Saldo inicial\s*(?P<opening>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*\+\s*Dep[oó]sitos\s*(?P<income>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*-\s*Retiros\s*(?P<expense>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*=\s*Saldo final\s*(?P<closing>[\d,]+\.\d{2})",
    ))
    .unwrap()
});

/// Date, folio, then description and amounts
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}-[A-Z]{3}-\d{4})\s+(\d+)\s+(.+)$").unwrap());

/// Two-amount rows the running balance cannot settle
const RULES: TwoTokenRules = TwoTokenRules {
    deposit_keywords: &["DEPOSITO", "ABONO", "INTERES"],
    withdrawal_keywords: &["RETIRO", "CARGO", "COMISION", "PAGO", "IVA", "TRASPASO A"],
    default: Some(Direction::Deposit),
    ignore_spaces: false,
};

/// Rows with stray amounts in the description the running balance cannot settle
const MANY_TOKENS: Resolver = Resolver::new(RULES, ManyTokenPolicy::LastTwo);

const CATEGORIES: CategoryTable = CategoryTable::new(&[
    (&["SPEI", "TRANSFERENCIA"], "Transferencia"),
    (&["TRASPASO"], "Traspaso entre Cuentas"),
    (&["DEPOSITO", "DEPÓSITO"], "Depósito"),
    (&["INTERES"], "Intereses"),
    (&["COMISION", "COMISIÓN"], "Comisión"),
    (&["IVA", "ISR"], "Impuestos"),
    (&["RETIRO"], "Retiro de Efectivo"),
    (&["PAGO"], "Pago"),
]);

/// OCR text with typographic look-alikes replaced
pub fn clean_text(text: &str) -> String {
    normalize_ocr_text(&text.replace('º', "o").replace('\u{2014}', "-"))
}

/// Text between `start` and the first of `ends`, or to the end of `text`
fn section<'t>(text: &'t str, start: &str, ends: &[&str]) -> Option<&'t str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    let end = ends.iter().filter_map(|e| rest.find(e)).min().unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Balance before the first row, recovered from that row
fn implied_opening(transactions: &[Transaction]) -> f64 {
    transactions
        .first()
        .and_then(|t| t.balance.map(|b| b - t.net_amount()))
        .unwrap_or(0.0)
}

pub struct SantanderParser;

impl SantanderParser {
    pub fn new() -> Self {
        Self
    }

    /// `None` for lines that are not movement rows
    fn transaction(&self, line: &str, previous_balance: Option<f64>) -> Option<Transaction> {
        let caps = ROW_RE.captures(line.trim())?;
        let date = &caps[1];
        let folio = &caps[2];
        let rest = caps.get(3)?.as_str();

        let tokens = find_amounts(rest);
        let first = tokens.first()?;
        let description = collapse_whitespace(&rest[..first.start]);
        let values: Vec<f64> = tokens.iter().map(|t| t.value).collect();

        let (deposit, withdrawal, balance) = match values.as_slice() {
            [balance] => (0.0, 0.0, *balance),
            [amount, balance] => {
                let direction = previous_balance
                    .and_then(|prev| direction_by_balance(prev, *amount, *balance))
                    .or_else(|| RULES.keyword_direction(&description.to_uppercase()))
                    .or(RULES.default)
                    .unwrap_or(Direction::Deposit);
                let (deposit, withdrawal) = direction.split(*amount);
                (deposit, withdrawal, *balance)
            }
            [] => return None,
            many => match previous_balance.and_then(|prev| continuity_among(prev, many, None)) {
                Some((direction, amount, balance)) => {
                    let (deposit, withdrawal) = direction.split(many[amount]);
                    (deposit, withdrawal, many[balance])
                }
                None => {
                    let r = MANY_TOKENS.resolve(many, previous_balance, &description.to_uppercase())?;
                    let (deposit, withdrawal) = r.columns();
                    (deposit, withdrawal, r.balance.unwrap_or(first.value))
                }
            },
        };

        let category = CATEGORIES.categorize(&description);
        Some(
            Transaction::movement(date, description, deposit, withdrawal, Some(balance), category)
                .with_reference(folio),
        )
    }

    fn transactions(&self, section: &str, opening: Option<f64>) -> Vec<Transaction> {
        let mut previous = opening;
        let mut transactions = Vec::new();
        for line in section.lines() {
            if let Some(txn) = self.transaction(line, previous) {
                previous = txn.balance;
                transactions.push(txn);
            }
        }
        transactions
    }

    fn checking_account(&self, text: &str, section: &str, ctx: &mut ParseContext) -> Account {
        let summary = Summary::capture_or_warn(&SUMMARY_RE, text, ctx, "summary");
        let account_number = account_number_or_sentinel(&ACCOUNT_RE, text, ctx);

        let transactions = self.transactions(section, summary.map(|s| s.opening));
        let summary = summary.unwrap_or_default();
        log::debug!("santander: {} checking rows", transactions.len());
        summary.into_account(CHECKING_NAME, account_number, CURRENCY, transactions)
    }

    fn savings_account(&self, section: &str, account_number: &str) -> Account {
        let transactions = self.transactions(section, None);
        log::debug!("santander: {} DineroCreciente rows", transactions.len());
        Summary::from_ledger(implied_opening(&transactions), &transactions).into_account(
            SAVINGS_NAME,
            account_number,
            CURRENCY,
            transactions,
        )
    }
}

impl Default for SantanderParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for SantanderParser {
    fn variant(&self) -> BankVariant {
        BankVariant::Santander
    }

    fn parse(
        &self,
        text: &StatementText,
        ctx: &mut ParseContext,
    ) -> Result<ParsedStatement, StatementError> {
        let full_text = clean_text(&text.full_text());

        let statement_period = PERIOD_RE
            .captures(&full_text)
            .map(|c| format!("DEL {} AL {}", &c[1], &c[2]));
        if statement_period.is_none() {
            ctx.warn("statement_period", "statement period not found", "");
        }
        let cutoff_date = capture_or_warn(&CUTOFF_RE, &full_text, ctx, "cutoff_date");

        let mut accounts = Vec::new();
        match section(&full_text, CHECKING_HEADING, &[SAVINGS_HEADING, FISCAL_HEADING]) {
            Some(checking) => accounts.push(self.checking_account(&full_text, checking, ctx)),
            None => ctx.error("transactions", "checking movements section not found", CHECKING_HEADING),
        }
        if let Some(savings) = section(&full_text, SAVINGS_HEADING, &[FISCAL_HEADING]) {
            let number = accounts
                .first()
                .map(|a| a.account_number.clone())
                .unwrap_or_else(|| account_number_or_sentinel(&ACCOUNT_RE, &full_text, ctx));
            accounts.push(self.savings_account(savings, &number));
        }
        if accounts.is_empty() {
            return Err(StatementError::parse(ctx.variant(), "no movements section found"));
        }

        Ok(ParsedStatement {
            statement_period,
            cutoff_date,
            accounts,
        })
    }
}
