use thiserror::Error;

/// Errors raised while addressing or mutating a workbook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    /// The text is not a column-letters + row-digits cell address
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// A named range or raw reference does not follow the reference grammar
    #[error("Invalid named ref or cell: {reference} ({reason})")]
    InvalidReference { reference: String, reason: String },

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
}

impl SheetError {
    pub(crate) fn invalid_reference(reference: &str, reason: impl Into<String>) -> Self {
        SheetError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}
