//! Scotiabank (PyME / PFAE) statement parser
//!
//! The movements table has separate deposit and withdrawal columns but text
//! extraction loses which one an amount sat in. The direction is recovered
//! from the change in the running balance.

use super::categorize::CategoryTable;
use super::segment::{Block, Segmenter};
use super::{
    capture_or_warn, collapse_whitespace, find_amounts, strip_amounts, ParseContext, ParsedStatement, StatementParser, StatementText, Summary,
};
use crate::error::StatementError;
use crate::models::{BankVariant, Transaction, BALANCE_TOLERANCE, NOT_FOUND};
use once_cell::sync::Lazy;
use regex::Regex;

const ACCOUNT_NAME: &str = "CUENTA UNICA PYME";
const CURRENCY: &str = "PESOS";

static PERIOD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Periodo\s*([\w\-/]+)").unwrap());
static CLABE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"CLABE\s*(\d+)").unwrap());
static CUTOFF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Fecha de corte\s*([\w\-/]+)").unwrap());

/// Summary labels in order, at most three lines apart
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)Saldo\s*inicial\s*=?\s*\$?\s*(?P<opening>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*\(\+\)\s*Dep[oó]sitos\s*\$?\s*(?P<income>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*\(-\)\s*Retiros\s*\$?\s*(?P<expense>[\d,]+\.\d{2})",
        r"\s*(?:[^\n]*\n){0,3}?\s*Saldo\s*final\s*(?:de la cuenta)?\s*=?\s*\$?\s*(?P<closing>[\d,]+\.\d{2})",
    ))
    .unwrap()
});

/// `DD MON` or `MON DD`
static LEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{2}\s+[A-Z]{3}|[A-Z]{3}\s+\d{2})\b").unwrap());

/// Boilerplate that follows the movements table
const STOP_WORDS: &[&str] = &[
    "LAS TASAS DE INTERES ESTAN EXPRESADAS",
    "PARA LOS EFECTOS DEL ART. 100",
    "SCOTIABANK INVERLAT S.A",
    "TOTAL DE COMISIONES COBRADAS",
];

/// Deposit keywords, used only when no previous balance is known.
/// Fee rows land here too.
const DEPOSIT_KEYWORDS: &[&str] = &[
    "DEPOSITO",
    "ABONO",
    "TRANSF INTERBANCARIA",
    "TRASPASO",
    "COMISION",
];

const CATEGORIES: CategoryTable = CategoryTable::new(&[
    (&["TRANSF INTERBANCARIA", "SPEI"], "Transferencia Interbancaria"),
    (&["TRASPASO"], "Traspaso entre Cuentas"),
    (&["DEPOSITO", "DEPÓSITO"], "Depósito"),
    (&["COMISION", "COMISIÓN"], "Comisión"),
    (&["IVA"], "Impuestos"),
    (&["PAGO"], "Pago"),
]);

/// `(deposit, withdrawal)` from the balance change.
///
/// When the printed amount matches the change it is taken as is; otherwise
/// the change itself is recorded.
pub fn sign_by_difference(previous: f64, amount: f64, balance: f64) -> (f64, f64) {
    let difference = balance - previous;
    if (difference - amount).abs() < BALANCE_TOLERANCE {
        (amount, 0.0)
    } else if (difference + amount).abs() < BALANCE_TOLERANCE {
        (0.0, amount)
    } else if difference > 0.0 {
        (difference, 0.0)
    } else {
        (0.0, difference.abs())
    }
}

fn is_table_header(line: &str) -> bool {
    line.contains("Fecha") && line.contains("Concepto") && line.contains("Saldo")
}

fn is_stop_line(line: &str) -> bool {
    let upper = line.to_uppercase();
    STOP_WORDS.iter().any(|w| upper.contains(w))
}

fn is_movements_page(page: &str) -> bool {
    page.contains("Detalle de tus movimientos") || page.contains("Concepto")
}

pub struct ScotiabankParser;

impl ScotiabankParser {
    pub fn new() -> Self {
        Self
    }

    /// `None` when the first line carries no amount
    fn transaction(&self, block: &Block, previous_balance: Option<f64>) -> Option<Transaction> {
        let first_line = block.first_line();
        let tokens = find_amounts(first_line);
        let balance = tokens.last()?.value;
        let amount = match tokens.as_slice() {
            [.., amount, _] => amount.value,
            _ => 0.0,
        };

        let (deposit, withdrawal) = match previous_balance {
            Some(previous) => sign_by_difference(previous, amount, balance),
            None if amount > 0.0 => {
                let upper = first_line.to_uppercase();
                if DEPOSIT_KEYWORDS.iter().any(|k| upper.contains(k)) {
                    (amount, 0.0)
                } else {
                    (0.0, amount)
                }
            }
            None => (0.0, 0.0),
        };

        let mut parts = vec![strip_amounts(block.first_line_rest())];
        parts.extend(block.continuation().iter().map(|line| strip_amounts(line)));
        let description = collapse_whitespace(&parts.join(" "));

        let category = CATEGORIES.categorize(&description);
        Some(Transaction::movement(
            &block.date,
            description,
            deposit,
            withdrawal,
            Some(balance),
            category,
        ))
    }

    fn page_blocks(&self, page: &str) -> Option<Vec<Block>> {
        let mut lines = page.lines().skip_while(|l| !is_table_header(l));
        lines.next()?;
        let table = lines.take_while(|l| !is_stop_line(l));
        Some(Segmenter::new(&LEADER_RE, &[]).segment(table))
    }

    fn transactions(
        &self,
        text: &StatementText,
        opening: Option<f64>,
        ctx: &mut ParseContext,
    ) -> Vec<Transaction> {
        let mut transactions = Vec::new();
        let mut previous = opening;

        for (index, page) in text.pages().iter().enumerate() {
            if !is_movements_page(page) {
                continue;
            }
            let Some(blocks) = self.page_blocks(page) else {
                continue;
            };
            log::debug!("scotiabank: {} rows on page {}", blocks.len(), index + 1);

            for block in &blocks {
                if let Some(txn) = self.transaction(block, previous) {
                    previous = txn.balance;
                    transactions.push(txn);
                }
            }
        }

        if transactions.is_empty() {
            ctx.error("transactions", "no movements table found", "");
        }
        transactions
    }
}

impl Default for ScotiabankParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for ScotiabankParser {
    fn variant(&self) -> BankVariant {
        BankVariant::ScotiabankPyme
    }

    fn parse(
        &self,
        text: &StatementText,
        ctx: &mut ParseContext,
    ) -> Result<ParsedStatement, StatementError> {
        let full_text = text.full_text();

        let statement_period = capture_or_warn(&PERIOD_RE, &full_text, ctx, "statement_period");
        let cutoff_date = capture_or_warn(&CUTOFF_RE, &full_text, ctx, "cutoff_date");
        let account_number = capture_or_warn(&CLABE_RE, &full_text, ctx, "account_number")
            .unwrap_or_else(|| NOT_FOUND.to_string());

        let summary = Summary::capture_or_warn(&SUMMARY_RE, &full_text, ctx, "summary");
        let transactions = self.transactions(text, summary.map(|s| s.opening), ctx);
        let summary = summary.unwrap_or_default();

        Ok(ParsedStatement {
            statement_period,
            cutoff_date,
            accounts: vec![summary.into_account(ACCOUNT_NAME, account_number, CURRENCY, transactions)],
        })
    }
}
