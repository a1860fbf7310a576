//! Error types for statement extraction
//!
//! Only failures that make the whole document unusable are errors. A field
//! that could not be found is recorded as a [`ParseWarning`](crate::models::ParseWarning)
//! instead.

use crate::models::{BankTag, BankVariant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    /// No anchor phrase matched, or the bank matched but no known layout did
    #[error("{}", unsupported_message(.bank))]
    UnsupportedDocument { bank: Option<BankTag> },

    /// Zero pages or no extractable text
    #[error("document is empty or unreadable: {0}")]
    EmptyOrUnreadableDocument(String),

    /// A structurally required pattern did not match
    #[error("{variant} parse error: {message}")]
    Parse {
        variant: BankVariant,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// OCR tool missing, failed or timed out
    #[error("OCR error: {0}")]
    Ocr(String),
}

fn unsupported_message(bank: &Option<BankTag>) -> String {
    match bank {
        Some(bank) => format!("statement layout for bank '{}' is not supported", bank),
        None => "bank not recognized".to_string(),
    }
}

impl StatementError {
    pub fn parse(variant: BankVariant, message: impl Into<String>) -> Self {
        Self::Parse {
            variant,
            message: message.into(),
        }
    }

    /// Whether the caller should report "not supported" rather than a fault
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedDocument { .. })
    }
}
