pub mod config;
pub mod error;
pub mod models;
pub mod pdf_import;

pub use config::ExtractorConfig;
pub use error::StatementError;
pub use models::{
    Account, BankTag, BankVariant, MovementKind, ParseWarning, StatementAnalysis, Transaction,
    WarningSeverity,
};
pub use pdf_import::identify::{identify_account_variant, identify_bank};
pub use pdf_import::{analyze_pdf, analyze_text, StatementText};
