//! Banorte (Cuenta Preferente) statement parser
//!
//! Movements are listed per page under `DETALLE DE MOVIMIENTOS`. Rows are
//! dated `DD-MON-YY` and the final ledger is re-sorted chronologically with
//! the opening balance first.

use super::categorize::CategoryTable;
use super::resolve::{
    continuity_among, continuity_for, Direction, ManyTokenPolicy, Resolver, TwoTokenRules,
};
use super::segment::{Block, Segmenter};
use super::{
    amount_values, capture_or_warn, strip_amounts, ParseContext, ParsedStatement, StatementParser,
    StatementText, Summary,
};
use crate::error::StatementError;
use crate::models::{BankVariant, MovementKind, Transaction, NOT_FOUND};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

const ACCOUNT_NAME: &str = "CUENTA PREFERENTE";
const MOVEMENTS_HEADING: &str = "DETALLE DE MOVIMIENTOS";
const TABLE_END: &str = "OTROS";

static PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Periodo\s*Del\s*(\d{2}/\w+/\d{4}\s*al\s*\d{2}/\w+/\d{4})").unwrap()
});
static CUTOFF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Fecha de corte\s*(\d{2}/\w+/\d{4})").unwrap());
static ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CUENTA PREFERENTE\s+(\d{10})").unwrap());
static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Moneda\s*,?\s*(\w+)").unwrap());

/// Summary labels in order, at most three lines apart
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"Saldo inicial del periodo\s*\$\s*(?P<opening>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*Total de dep[oó]sitos\s*\$\s*(?P<income>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*Total de retiros\s*\$\s*(?P<expense>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*Saldo actual\s*\$\s*(?P<closing>[\d,]+\.\d{2})",
    ))
    .unwrap()
});

static LEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}-[A-Za-z]{3}-\d{2})").unwrap());

/// Fallback for rows with three or more amounts and no balance continuity
const MANY_TOKENS: Resolver = Resolver::new(
    TwoTokenRules {
        deposit_keywords: &["DEPOSITO"],
        withdrawal_keywords: &[],
        default: Some(Direction::Withdrawal),
        ignore_spaces: false,
    },
    ManyTokenPolicy::DepositWithdrawalBalance,
);

const CATEGORIES: CategoryTable = CategoryTable::new(&[
    (&["DEPOSITO"], "Depósito"),
    (&["COMPRA"], "Compra"),
    (&["COMISION", "COMISIÓN"], "Comisión"),
    (&["SALDO ANTERIOR"], "Saldo Anterior"),
]);

fn categorize(description: &str) -> &'static str {
    let upper = description.to_uppercase();
    if upper.contains("SPEI") && (upper.contains("COMPRA") || upper.contains("ORDEN DE PAGO")) {
        return "Transferencia SPEI Enviada";
    }
    if upper.contains("DEPOSITO") && upper.contains("TERCEROS") {
        return "Depósito de Terceros";
    }
    CATEGORIES.categorize(&upper)
}

/// `DD-MON-YY` with Spanish month abbreviations, 20YY
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    let mut parts = date.trim().split('-');
    let day: u32 = parts.next()?.parse().ok()?;
    let month = match parts.next()?.to_uppercase().as_str() {
        "ENE" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "ABR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AGO" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DIC" => 12,
        _ => return None,
    };
    let year: i32 = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

/// Opening entries first, then by date. Stable; unparseable dates sort first.
pub fn sort_ledger(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|t| {
        (
            t.movement_kind != MovementKind::OpeningBalance,
            parse_date(&t.date).unwrap_or(NaiveDate::MIN),
        )
    });
}

/// Amount tokens with repeats removed, first occurrence kept
fn distinct_amounts(text: &str) -> Vec<f64> {
    let mut seen: Vec<f64> = Vec::new();
    for value in amount_values(text) {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Amount and balance of a two-token row
fn resolve_pair(direction: Direction, previous: f64, a: f64, b: f64) -> (f64, f64) {
    if let Some(found) = continuity_for(direction, previous, a, b) {
        return found;
    }
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    match direction {
        Direction::Deposit => (low, high),
        Direction::Withdrawal => (high, low),
    }
}

fn is_table_header(line: &str) -> bool {
    let upper = line.to_uppercase();
    upper.contains("FECHA")
        && (upper.contains("DESCRIPCIÓN") || upper.contains("DESCRIPCION"))
        && upper.contains("SALDO")
}

pub struct BanorteParser;

impl BanorteParser {
    pub fn new() -> Self {
        Self
    }

    fn transaction(&self, block: &Block, previous_balance: f64) -> Transaction {
        let text = block.body();

        let amounts = distinct_amounts(&text);
        let description = strip_amounts(&text);
        let upper = description.to_uppercase();

        if upper.contains("SALDO ANTERIOR") {
            let balance = amounts.last().copied().unwrap_or(0.0);
            return Transaction::opening_balance(&block.date, description, balance, "Saldo Anterior");
        }

        let category = categorize(&description);
        let direction = if upper.contains("DEPOSITO") {
            Direction::Deposit
        } else {
            Direction::Withdrawal
        };
        match amounts.as_slice() {
            [] => Transaction::informational(&block.date, description, None),
            [balance] => Transaction::informational(&block.date, description, Some(*balance)),
            [a, b] => {
                let (amount, balance) = resolve_pair(direction, previous_balance, *a, *b);
                let (deposit, withdrawal) = direction.split(amount);
                Transaction::movement(&block.date, description, deposit, withdrawal, Some(balance), category)
            }
            many => {
                let (deposit, withdrawal, balance) =
                    match continuity_among(previous_balance, many, Some(direction)) {
                        Some((direction, i, j)) => {
                            let (deposit, withdrawal) = direction.split(many[i]);
                            (deposit, withdrawal, Some(many[j]))
                        }
                        None => match MANY_TOKENS.resolve(many, Some(previous_balance), &upper) {
                            Some(r) => {
                                let (deposit, withdrawal) = r.columns();
                                (deposit, withdrawal, r.balance)
                            }
                            None => (0.0, 0.0, None),
                        },
                    };
                Transaction::movement(&block.date, description, deposit, withdrawal, balance, category)
            }
        }
    }

    /// Ledger rows of one movements page; `None` when the page has no table header
    fn page_blocks(&self, page: &str) -> Option<Vec<Block>> {
        let mut lines = page.lines().skip_while(|l| !is_table_header(l));
        lines.next()?;
        Some(
            Segmenter::new(&LEADER_RE, &[TABLE_END])
                .end_on_blank_line()
                .segment(lines),
        )
    }

    fn transactions(&self, text: &StatementText, opening: f64, ctx: &mut ParseContext) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = Vec::new();
        let mut previous = opening;

        for (index, page) in text.pages().iter().enumerate() {
            if !page.contains(MOVEMENTS_HEADING) {
                continue;
            }
            let Some(blocks) = self.page_blocks(page) else {
                ctx.info("transactions", "movements table header not found", &format!("page {}", index + 1));
                continue;
            };
            log::debug!("banorte: {} rows on page {}", blocks.len(), index + 1);

            for block in &blocks {
                let txn = self.transaction(block, previous);
                if let Some(balance) = txn.balance {
                    previous = balance;
                }
                transactions.push(txn);
            }
        }

        if transactions.is_empty() {
            ctx.error("transactions", "no movements found", MOVEMENTS_HEADING);
        }
        sort_ledger(&mut transactions);
        transactions
    }

}

impl Default for BanorteParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for BanorteParser {
    fn variant(&self) -> BankVariant {
        BankVariant::Banorte
    }

    fn parse(
        &self,
        text: &StatementText,
        ctx: &mut ParseContext,
    ) -> Result<ParsedStatement, StatementError> {
        let full_text = text.full_text();

        let statement_period = capture_or_warn(&PERIOD_RE, &full_text, ctx, "statement_period")
            .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "));
        let cutoff_date = capture_or_warn(&CUTOFF_RE, &full_text, ctx, "cutoff_date");
        let account_number = capture_or_warn(&ACCOUNT_RE, &full_text, ctx, "account_number")
            .unwrap_or_else(|| NOT_FOUND.to_string());
        let currency = capture_or_warn(&CURRENCY_RE, &full_text, ctx, "currency")
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| NOT_FOUND.to_string());

        let summary =
            Summary::capture_or_warn(&SUMMARY_RE, &full_text, ctx, "summary").unwrap_or_default();
        let transactions = self.transactions(text, summary.opening, ctx);

        Ok(ParsedStatement {
            statement_period,
            cutoff_date,
            accounts: vec![summary.into_account(ACCOUNT_NAME, account_number, currency, transactions)],
        })
    }
}
