use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::client::ClientId;
use crate::domain::company::CompanyId;
use crate::domain::product::ProductId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Transition table: `sent` is the only state with exits. Accepted,
    /// rejected, and expired quotations are immutable.
    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Sent, Self::Accepted)
                | (Self::Sent, Self::Rejected)
                | (Self::Sent, Self::Expired)
        )
    }
}

/// A sales quotation. `total` and `total_tax` are always the sums of the
/// detail rows' `subtotal`/`line_tax` from the last calculation; they are
/// never edited independently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub client_id: ClientId,
    pub number: String,
    pub total: Decimal,
    pub total_tax: Decimal,
    pub status: QuotationStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Quotation {
    /// Expiration is presentational: there is no timer that flips the
    /// status, callers compare against the clock they carry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == QuotationStatus::Sent
            && self.expires_at.map(|at| at < now).unwrap_or(false)
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidTransition { from: self.status, to: next })
    }
}

/// One product line within a quotation. `unit_price` is snapshotted at
/// creation and not recomputed from the product's current price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationDetail {
    pub id: Uuid,
    pub quotation_id: QuotationId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub line_tax: Decimal,
}

/// Append-only audit record. `previous_status` is `None` only for the
/// creation event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationHistory {
    pub id: Uuid,
    pub quotation_id: QuotationId,
    pub user_id: UserId,
    pub previous_status: Option<QuotationStatus>,
    pub new_status: QuotationStatus,
    pub change_reason: String,
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{Quotation, QuotationId, QuotationStatus};
    use crate::domain::client::ClientId;
    use crate::domain::company::CompanyId;
    use crate::domain::user::UserId;
    use crate::errors::DomainError;

    fn quotation(status: QuotationStatus) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: QuotationId(Uuid::new_v4()),
            company_id: CompanyId(Uuid::new_v4()),
            user_id: UserId(Uuid::new_v4()),
            client_id: ClientId(Uuid::new_v4()),
            number: "COT-2026-0001".to_string(),
            total: Decimal::new(25_000, 2),
            total_tax: Decimal::new(4_750, 2),
            status,
            notes: None,
            rejection_reason: None,
            created_at: now,
            sent_at: now,
            accepted_at: None,
            expires_at: Some(now + Duration::days(7)),
            deleted_at: None,
        }
    }

    #[test]
    fn sent_may_be_accepted_rejected_or_expired() {
        for next in
            [QuotationStatus::Accepted, QuotationStatus::Rejected, QuotationStatus::Expired]
        {
            assert!(QuotationStatus::Sent.can_transition_to(next));
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in
            [QuotationStatus::Accepted, QuotationStatus::Rejected, QuotationStatus::Expired]
        {
            for next in [
                QuotationStatus::Sent,
                QuotationStatus::Accepted,
                QuotationStatus::Rejected,
                QuotationStatus::Expired,
            ] {
                assert!(!from.can_transition_to(next), "{from:?} -> {next:?} should be blocked");
            }
        }
    }

    #[test]
    fn transition_to_rejects_reaccepting_an_accepted_quotation() {
        let mut accepted = quotation(QuotationStatus::Accepted);
        let error = accepted
            .transition_to(QuotationStatus::Rejected)
            .expect_err("accepted -> rejected should fail");
        assert!(matches!(error, DomainError::InvalidTransition { .. }));
        assert_eq!(accepted.status, QuotationStatus::Accepted);
    }

    #[test]
    fn expiry_is_computed_against_the_supplied_clock() {
        let quotation = quotation(QuotationStatus::Sent);
        let now = Utc::now();
        assert!(!quotation.is_expired(now));
        assert!(quotation.is_expired(now + Duration::days(8)));
    }

    #[test]
    fn terminal_quotations_never_read_as_expired() {
        let mut quotation = quotation(QuotationStatus::Sent);
        quotation.transition_to(QuotationStatus::Accepted).expect("sent -> accepted");
        assert!(!quotation.is_expired(Utc::now() + chrono::Duration::days(30)));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            QuotationStatus::Sent,
            QuotationStatus::Accepted,
            QuotationStatus::Rejected,
            QuotationStatus::Expired,
        ] {
            assert_eq!(QuotationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(QuotationStatus::parse("draft"), None);
    }
}
