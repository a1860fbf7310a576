//! Banamex personal account (MiCuenta) statement parser

use super::banamex;
use super::categorize::CategoryTable;
use super::resolve::{Direction, ManyTokenPolicy, Resolver, ResolutionRule, TwoTokenRules};
use super::segment::{Block, Segmenter};
use super::{
    amount_values, strip_amounts, ParseContext, ParsedStatement, StatementParser, StatementText,
};
use crate::error::StatementError;
use crate::models::{BankVariant, Transaction, NOT_FOUND};
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_ACCOUNT_NAME: &str = "Cuenta Personal No Identificada";

static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Cuenta de Cheques Moneda Nacional|MiCuenta)\s+(\d+)").unwrap()
});
static PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)RESUMEN DEL\s+(.*?)\s+AL\s+(.*?)\s*$").unwrap());
static LEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}\s[A-Z]{3}\s").unwrap());

/// Entries that carry no movement (fee exemptions and the like)
const INFORMATIONAL_KEYWORDS: &[&str] = &["EXENCION", "EXENTAS", "EXENTAR"];

const RULES: TwoTokenRules = TwoTokenRules {
    deposit_keywords: &["PAGO RECIBIDO", "DEPOSITO", "ABONO"],
    withdrawal_keywords: &[],
    default: Some(Direction::Withdrawal),
    ignore_spaces: false,
};

const CATEGORIES: CategoryTable = CategoryTable::new(&[
    (&["PAGO INTERBANCARIO", "PAGO RECIBIDO", "TRASPASO REF"], "Transferencia"),
    (&["DISPOSICIONES EN CAJERO", "DIS.EFE"], "Retiro de Efectivo"),
    (&["OXXO"], "Compra (Tienda de conveniencia)"),
    (&["EXENCION COBRO COMISION"], "Ajuste Bancario"),
    (&["CFE"], "Pago de Servicios (Luz)"),
    (&["NETFLIX", "SPOTIFY"], "Suscripciones"),
]);

pub struct BanamexPersonalParser {
    resolver: Resolver,
}

impl BanamexPersonalParser {
    pub fn new() -> Self {
        Self {
            resolver: Resolver::new(RULES, ManyTokenPolicy::LastTwo),
        }
    }

    fn account(&self, first_page: &str, ctx: &mut ParseContext) -> (String, String) {
        match ACCOUNT_RE.captures(first_page) {
            Some(c) => (c[1].trim().to_string(), c[2].to_string()),
            None => {
                ctx.warn("account_number", "account name and number not found", "");
                (DEFAULT_ACCOUNT_NAME.to_string(), NOT_FOUND.to_string())
            }
        }
    }

    fn transaction(&self, block: &Block, previous_balance: Option<f64>) -> Transaction {
        let body = block.body();
        let amounts = amount_values(&body);
        let description = strip_amounts(&body);
        let upper = description.to_uppercase();
        let last = amounts.last().copied();

        if upper.contains("SALDO ANTERIOR") {
            return Transaction::opening_balance(
                &block.date,
                description,
                last.unwrap_or(0.0),
                "Saldo Anterior",
            );
        }
        if INFORMATIONAL_KEYWORDS.iter().any(|k| upper.contains(k)) {
            return Transaction::informational(&block.date, description, last);
        }

        match self.resolver.resolve(&amounts, previous_balance, &upper) {
            Some(r) if r.rule != ResolutionRule::BalanceOnly && r.amount > 0.0 => {
                let (deposit, withdrawal) = r.columns();
                let category = CATEGORIES.categorize(&description);
                Transaction::movement(&block.date, description, deposit, withdrawal, r.balance, category)
            }
            Some(r) => Transaction::informational(&block.date, description, r.balance),
            None => Transaction::informational(&block.date, description, None),
        }
    }

    fn transactions(&self, ledger: &str, opening: Option<f64>) -> Vec<Transaction> {
        let blocks = Segmenter::new(&LEADER_RE, &[]).segment(ledger.lines());
        log::debug!("banamex_personal: {} ledger blocks", blocks.len());

        let mut previous = opening;
        blocks
            .iter()
            .map(|block| {
                let txn = self.transaction(block, previous);
                if txn.balance.is_some() {
                    previous = txn.balance;
                }
                txn
            })
            .collect()
    }
}

impl Default for BanamexPersonalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for BanamexPersonalParser {
    fn variant(&self) -> BankVariant {
        BankVariant::BanamexPersonal
    }

    fn parse(
        &self,
        text: &StatementText,
        ctx: &mut ParseContext,
    ) -> Result<ParsedStatement, StatementError> {
        let first_page = text.first_page();

        let (account_name, account_number) = self.account(first_page, ctx);
        let cutoff_date = banamex::cutoff_date(first_page, ctx);
        let statement_period = banamex::period(&PERIOD_RE, first_page, ctx);
        let summary = banamex::summary(first_page, ctx);

        let ledger = banamex::operations_text(text, None);
        if ledger.trim().is_empty() {
            ctx.error("transactions", "no DETALLE DE OPERACIONES pages found", "");
        }
        let transactions = self.transactions(&ledger, summary.map(|s| s.opening));

        Ok(ParsedStatement {
            statement_period,
            cutoff_date,
            accounts: vec![summary.unwrap_or_default().into_account(
                account_name,
                account_number,
                banamex::CURRENCY,
                transactions,
            )],
        })
    }
}
