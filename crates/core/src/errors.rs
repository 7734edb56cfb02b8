use thiserror::Error;

use crate::domain::quotation::QuotationStatus;

/// Failures raised by the quotation lifecycle, independent of transport.
/// The HTTP layer owns the mapping to status codes; nothing in here knows
/// about HTTP.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Validation(String),
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: QuotationStatus, to: QuotationStatus },
}

impl DomainError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::DomainError;
    use crate::domain::quotation::QuotationStatus;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(DomainError::not_found("quotation").to_string(), "quotation not found");
        let transition = DomainError::InvalidTransition {
            from: QuotationStatus::Accepted,
            to: QuotationStatus::Sent,
        };
        assert!(transition.to_string().contains("Accepted"));
    }
}
