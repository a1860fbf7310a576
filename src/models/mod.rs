use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel written into text fields the statement did not declare.
pub const NOT_FOUND: &str = "No encontrado";

/// Tolerance used for every balance comparison (one centavo).
pub const BALANCE_TOLERANCE: f64 = 0.01;

/// Issuing bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankTag {
    Banamex,
    #[serde(rename = "banbajio")]
    BanBajio,
    Bbva,
    Banorte,
    Scotiabank,
    Santander,
}

impl BankTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banamex => "banamex",
            Self::BanBajio => "banbajio",
            Self::Bbva => "bbva",
            Self::Banorte => "banorte",
            Self::Scotiabank => "scotiabank",
            Self::Santander => "santander",
        }
    }
}

impl fmt::Display for BankTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bank plus account layout. Each variant has its own parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankVariant {
    BanamexPersonal,
    BanamexEmpresarial,
    #[serde(rename = "banbajio_empresarial")]
    BanBajioEmpresarial,
    Bbva,
    Banorte,
    ScotiabankPyme,
    Santander,
}

impl BankVariant {
    pub const ALL: [BankVariant; 7] = [
        Self::BanamexPersonal,
        Self::BanamexEmpresarial,
        Self::BanBajioEmpresarial,
        Self::Bbva,
        Self::Banorte,
        Self::ScotiabankPyme,
        Self::Santander,
    ];

    pub fn bank(&self) -> BankTag {
        match self {
            Self::BanamexPersonal | Self::BanamexEmpresarial => BankTag::Banamex,
            Self::BanBajioEmpresarial => BankTag::BanBajio,
            Self::Bbva => BankTag::Bbva,
            Self::Banorte => BankTag::Banorte,
            Self::ScotiabankPyme => BankTag::Scotiabank,
            Self::Santander => BankTag::Santander,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BanamexPersonal => "banamex_personal",
            Self::BanamexEmpresarial => "banamex_empresarial",
            Self::BanBajioEmpresarial => "banbajio_empresarial",
            Self::Bbva => "bbva",
            Self::Banorte => "banorte",
            Self::ScotiabankPyme => "scotiabank_pyme",
            Self::Santander => "santander",
        }
    }
}

impl fmt::Display for BankVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a ledger entry moves the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Income,
    Expense,
    Informational,
    OpeningBalance,
}

/// One ledger entry recovered from the statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Date token exactly as printed (`15 ENE`, `03-FEB-24`, `02/MAR`, ...)
    pub date: String,
    pub description: String,
    pub withdrawal: f64,
    pub deposit: f64,
    pub balance: Option<f64>,
    pub movement_kind: MovementKind,
    pub category: String,
    /// BBVA operation code (`T20`, `N06`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Reference or folio number printed next to the date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Transaction {
    /// Entry whose kind follows from which amount column is filled.
    ///
    /// At most one column is non-zero: when both are given they are netted
    /// into the larger side.
    pub fn movement(
        date: impl Into<String>,
        description: impl Into<String>,
        deposit: f64,
        withdrawal: f64,
        balance: Option<f64>,
        category: impl Into<String>,
    ) -> Self {
        let (deposit, withdrawal) = if deposit > 0.0 && withdrawal > 0.0 {
            log::debug!("netting deposit {:.2} against withdrawal {:.2}", deposit, withdrawal);
            let net = deposit - withdrawal;
            if net >= 0.0 {
                (net, 0.0)
            } else {
                (0.0, -net)
            }
        } else {
            (deposit, withdrawal)
        };
        let movement_kind = if deposit > 0.0 {
            MovementKind::Income
        } else if withdrawal > 0.0 {
            MovementKind::Expense
        } else {
            MovementKind::Informational
        };
        Self {
            date: date.into(),
            description: description.into(),
            withdrawal,
            deposit,
            balance,
            movement_kind,
            category: category.into(),
            code: None,
            reference: None,
        }
    }

    pub fn opening_balance(
        date: impl Into<String>,
        description: impl Into<String>,
        balance: f64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            description: description.into(),
            withdrawal: 0.0,
            deposit: 0.0,
            balance: Some(balance),
            movement_kind: MovementKind::OpeningBalance,
            category: category.into(),
            code: None,
            reference: None,
        }
    }

    pub fn informational(
        date: impl Into<String>,
        description: impl Into<String>,
        balance: Option<f64>,
    ) -> Self {
        Self {
            date: date.into(),
            description: description.into(),
            withdrawal: 0.0,
            deposit: 0.0,
            balance,
            movement_kind: MovementKind::Informational,
            category: "Informativo".to_string(),
            code: None,
            reference: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Signed effect on the balance (deposits positive)
    pub fn net_amount(&self) -> f64 {
        self.deposit - self.withdrawal
    }
}

/// One account's activity within a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_name: String,
    pub account_number: String,
    pub currency: String,
    pub opening_balance_summary: f64,
    pub closing_balance_summary: f64,
    pub total_income: f64,
    pub total_expense: f64,
    pub transactions: Vec<Transaction>,
}

impl Account {
    /// `opening + income - expense - closing`; zero when the summary reconciles.
    pub fn reconciliation_gap(&self) -> f64 {
        self.opening_balance_summary + self.total_income
            - self.total_expense
            - self.closing_balance_summary
    }

    pub fn reconciles(&self) -> bool {
        self.reconciliation_gap().abs() < BALANCE_TOLERANCE
    }

    pub fn ledger_income(&self) -> f64 {
        self.transactions.iter().map(|t| t.deposit).sum()
    }

    pub fn ledger_expense(&self) -> f64 {
        self.transactions.iter().map(|t| t.withdrawal).sum()
    }
}

/// Severity of a parse warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Info,
    Warning,
    Error,
}

/// Partial-extraction note: a field fell back to a sentinel or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub severity: WarningSeverity,
    pub field: String,
    pub message: String,
    pub raw_value: String,
}

/// Top-level result for one processed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementAnalysis {
    pub file_name: String,
    pub bank: BankTag,
    pub variant: BankVariant,
    pub statement_period: Option<String>,
    pub cutoff_date: Option<String>,
    pub accounts: Vec<Account>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
}

impl StatementAnalysis {
    /// True when some field had to be defaulted
    pub fn is_partial(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.severity != WarningSeverity::Info)
    }

    pub fn transaction_count(&self) -> usize {
        self.accounts.iter().map(|a| a.transactions.len()).sum()
    }
}
