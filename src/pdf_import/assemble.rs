//! Final assembly of a parsed statement into [`StatementAnalysis`]

use super::ParsedStatement;
use crate::models::{BankVariant, ParseWarning, StatementAnalysis, WarningSeverity};
use std::path::Path;

/// Base name of the input path
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn assemble(
    file_name: &str,
    variant: BankVariant,
    parsed: ParsedStatement,
    mut warnings: Vec<ParseWarning>,
) -> StatementAnalysis {
    for account in &parsed.accounts {
        if account.reconciles() {
            continue;
        }
        let gap = account.reconciliation_gap();
        log::debug!(
            "{}: account {} does not reconcile (gap {:.2})",
            variant,
            account.account_number,
            gap
        );
        warnings.push(ParseWarning {
            severity: WarningSeverity::Info,
            field: "summary".to_string(),
            message: format!(
                "opening + income - expense differs from closing by {:.2} for account {}",
                gap, account.account_number
            ),
            raw_value: format!(
                "{:.2} + {:.2} - {:.2} vs {:.2}",
                account.opening_balance_summary,
                account.total_income,
                account.total_expense,
                account.closing_balance_summary
            ),
        });
    }

    StatementAnalysis {
        file_name: Path::new(file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string()),
        bank: variant.bank(),
        variant,
        statement_period: parsed.statement_period,
        cutoff_date: parsed.cutoff_date,
        accounts: parsed.accounts,
        warnings,
    }
}
