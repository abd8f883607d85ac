//! Purchase transaction models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment settlement state of a purchase.
///
/// Transitions are one-way: a purchase settles exactly once, to either
/// `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    /// Whether a purchase may move from `self` to `next`
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// A transaction linking a buying company to a material listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    /// Human-readable transaction reference, `REC-YYYY-NNNNNN`
    pub folio: String,
    pub user_id: Uuid,
    pub material_id: Uuid,
    pub company_name: String,
    pub company_rfc: String,
    pub company_address: String,
    pub company_phone: String,
    pub transporter_name: String,
    pub transporter_phone: String,
    pub transporter_info: String,
    pub collection_date: NaiveDate,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    /// Gateway charge reference, set once the charge is created
    pub charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
