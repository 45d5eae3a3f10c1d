use super::domain::ApplicationStatus;

/// Failure taxonomy raised by the financial core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinanceError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("debt-to-income ratio is undefined for {context}: total income is zero")]
    UndefinedDti { context: String },
    #[error("status cannot move from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

impl FinanceError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
