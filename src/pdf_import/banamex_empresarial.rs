//! Banamex business checking (Cuenta de Cheques Moneda Nacional) statement parser

use super::banamex;
use super::categorize::CategoryTable;
use super::resolve::{direction_by_balance, TwoTokenRules};
use super::segment::{Block, Segmenter};
use super::{
    amount_values, strip_amounts, ParseContext, ParsedStatement, StatementParser, StatementText,
};
use crate::error::StatementError;
use crate::models::{BankVariant, Transaction, NOT_FOUND};
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_ACCOUNT_NAME: &str = "Cuenta Empresarial No Identificada";
const MINIMUM_BALANCE_NOTICE: &str = "SALDO MINIMO REQUERIDO";

static ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Cuenta de Cheques Moneda\s+Nacional)\s+(\d+)").unwrap());
static PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)RESUMEN DEL:\s+(.*?)\s+AL\s+(.*?)\s*$").unwrap());
static LEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}\s[A-Z]{3}\s").unwrap());

/// No default: unmatched movements stay informational
const RULES: TwoTokenRules = TwoTokenRules {
    deposit_keywords: &["PAGO RECIBIDO", "DEPOSITO EFECTIVO"],
    withdrawal_keywords: &["TRASPASO REF"],
    default: None,
    ignore_spaces: false,
};

const CATEGORIES: CategoryTable = CategoryTable::new(&[
    (&["TRASPASO REF"], "Transferencia de Salida"),
    (&["PAGO RECIBIDO"], "Transferencia de Entrada / Cobranza"),
    (&["DEPOSITO EFECTIVO"], "Depósito en Efectivo"),
])
.with_fallback("Operación Bancaria");

pub struct BanamexEmpresarialParser;

impl BanamexEmpresarialParser {
    pub fn new() -> Self {
        Self
    }

    fn account(&self, first_page: &str, ctx: &mut ParseContext) -> (String, String) {
        match ACCOUNT_RE.captures(first_page) {
            Some(c) => (c[1].split_whitespace().collect::<Vec<_>>().join(" "), c[2].to_string()),
            None => {
                ctx.warn("account_number", "account name and number not found", "");
                (DEFAULT_ACCOUNT_NAME.to_string(), NOT_FOUND.to_string())
            }
        }
    }

    /// `SALDO ANTERIOR` printed above the first dated row
    fn leading_opening_balance(&self, ledger: &str) -> Option<Transaction> {
        let first = ledger.lines().map(str::trim).find(|l| !l.is_empty())?;
        if !first.to_uppercase().contains("SALDO ANTERIOR") || LEADER_RE.is_match(first) {
            return None;
        }
        let balance = amount_values(first).first().copied().unwrap_or(0.0);
        Some(Transaction::opening_balance("", "SALDO ANTERIOR", balance, "Saldo Anterior"))
    }

    /// `None` for rows without an amount
    fn transaction(&self, block: &Block, previous_balance: Option<f64>) -> Option<Transaction> {
        let body = block.body();
        let amounts = amount_values(&body);
        let description = strip_amounts(&body);
        let upper = body.to_uppercase();

        if upper.contains("SALDO ANTERIOR") {
            let balance = amounts.first().copied().unwrap_or(0.0);
            return Some(Transaction::opening_balance(
                &block.date,
                description,
                balance,
                "Saldo Anterior",
            ));
        }

        let amount = amounts.first().copied().unwrap_or(0.0);
        if amount == 0.0 {
            return None;
        }
        let balance = if amounts.len() >= 2 { amounts.last().copied() } else { None };

        let direction = previous_balance
            .zip(balance)
            .and_then(|(prev, bal)| direction_by_balance(prev, amount, bal))
            .or_else(|| RULES.keyword_direction(&upper));

        Some(match direction {
            Some(direction) => {
                let (deposit, withdrawal) = direction.split(amount);
                let category = CATEGORIES.categorize(&description);
                Transaction::movement(&block.date, description, deposit, withdrawal, balance, category)
            }
            None => Transaction::informational(&block.date, description, balance),
        })
    }

    fn transactions(&self, ledger: &str, opening: Option<f64>) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> =
            self.leading_opening_balance(ledger).into_iter().collect();

        let blocks = Segmenter::new(&LEADER_RE, &[MINIMUM_BALANCE_NOTICE]).segment(ledger.lines());
        log::debug!("banamex_empresarial: {} ledger blocks", blocks.len());

        let mut previous = transactions
            .first()
            .and_then(|t| t.balance)
            .or(opening);
        for block in &blocks {
            if let Some(txn) = self.transaction(block, previous) {
                if txn.balance.is_some() {
                    previous = txn.balance;
                }
                transactions.push(txn);
            }
        }
        transactions
    }
}

impl Default for BanamexEmpresarialParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for BanamexEmpresarialParser {
    fn variant(&self) -> BankVariant {
        BankVariant::BanamexEmpresarial
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

        let ledger = banamex::operations_text(text, Some(MINIMUM_BALANCE_NOTICE));
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

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::models::MovementKind;
    use crate::pdf_import::analyze_text;

    const PAGE_ONE: &str = r#"RESUMEN POR MEDIOS DE ACCESO
ESTADO DE CUENTA AL 29 DE FEBRERO DE 2024
Cuenta de Cheques Moneda Nacional 7009912345
RESUMEN DEL: 01/FEB/2024 AL 29/FEB/2024
Saldo Anterior $ 120,000.00
2 Depósitos
$ 30,500.00
1 Retiros
$ 15,000.00
SALDO AL 29 DE FEBRERO DE 2024 $ 135,500.00"#;

    const PAGE_TWO: &str = r#"DETALLE DE OPERACIONES
FECHA CONCEPTO RETIROS DEPOSITOS SALDO
SALDO ANTERIOR 120,000.00
05 FEB PAGO RECIBIDO DE CLIENTE ALFA
SPEI 0034 30,000.00 150,000.00
09 FEB TRASPASO REF 77812 A CUENTA 0456
15,000.00 135,000.00
14 FEB DEPOSITO EFECTIVO SUC 120 500.00 135,500.00
20 FEB AVISO SIN IMPORTE
SALDO MINIMO REQUERIDO 10,000.00
COMISION POR SALDO PROMEDIO"#;

    pub(crate) fn statement() -> StatementText {
        StatementText::new(vec![PAGE_ONE.to_string(), PAGE_TWO.to_string()])
    }

    #[test]
    fn test_parse_cuenta_de_cheques() {
        let text = StatementText::new(vec![PAGE_ONE.to_string(), PAGE_TWO.to_string()]);
        let analysis = analyze_text("empresa.pdf", &text).unwrap();
        assert_eq!(analysis.variant, BankVariant::BanamexEmpresarial);
        assert_eq!(analysis.statement_period.as_deref(), Some("01/FEB/2024 AL 29/FEB/2024"));

        let account = &analysis.accounts[0];
        assert_eq!(account.account_name, "Cuenta de Cheques Moneda Nacional");
        assert_eq!(account.account_number, "7009912345");
        assert_eq!(account.total_income, 30_500.0);
        assert!(account.reconciles());

        let txns = &account.transactions;
        assert_eq!(txns.len(), 4);
        assert_eq!(txns[0].movement_kind, MovementKind::OpeningBalance);
        assert_eq!(txns[0].date, "");
        assert_eq!(txns[0].balance, Some(120_000.0));

        assert_eq!(txns[1].deposit, 30_000.0);
        assert_eq!(txns[1].category, "Transferencia de Entrada / Cobranza");
        assert_eq!(txns[2].withdrawal, 15_000.0);
        assert_eq!(txns[2].category, "Transferencia de Salida");
        assert_eq!(txns[3].deposit, 500.0);
        assert_eq!(txns[3].category, "Depósito en Efectivo");
    }

    #[test]
    fn test_unmatched_keyword_is_informational() {
        let parser = BanamexEmpresarialParser::new();
        let block = Block {
            date: "21 FEB".to_string(),
            lines: vec!["21 FEB CARGO DIVERSO 88.00".to_string()],
        };
        let txn = parser.transaction(&block, None).unwrap();
        assert_eq!(txn.movement_kind, MovementKind::Informational);
        assert_eq!(txn.category, "Informativo");
    }
}
