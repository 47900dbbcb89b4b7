//! Payment records and the payment status lifecycle.
//!
//! ```text
//! pending ──► approved   (plan activated)
//!    │
//!    └──────► rejected
//! ```
//!
//! Both end states are final. Redelivered notifications that restate the
//! current status are accepted as no-ops.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

/// Outcome of applying a status to a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status changes; the caller must persist it.
    Apply(PaymentStatus),
    /// Payment is already in that status.
    Unchanged,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    /// Decide how to move from `self` to `next`.
    ///
    /// Returns `Err((from, to))` for transitions the lifecycle forbids.
    pub fn transition(self, next: PaymentStatus) -> Result<Transition, (Self, Self)> {
        match (self, next) {
            (a, b) if a == b => Ok(Transition::Unchanged),
            (PaymentStatus::Pending, PaymentStatus::Approved | PaymentStatus::Rejected) => {
                Ok(Transition::Apply(next))
            }
            (from, to) => Err((from, to)),
        }
    }

    /// Map a checkout provider status onto ours.
    ///
    /// Intermediate provider states (`in_process`, `authorized`, ...) keep the
    /// payment pending.
    pub fn from_provider(status: &str) -> PaymentStatus {
        match status {
            "approved" => PaymentStatus::Approved,
            "rejected" | "cancelled" | "refunded" | "charged_back" => PaymentStatus::Rejected,
            _ => PaymentStatus::Pending,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// Row from the `payments` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub business_id: Uuid,

    /// Tier being purchased
    pub tier: String,

    pub amount_cents: i64,
    pub currency: String,
    pub status: String,

    /// Checkout preference created at the provider
    pub preference_id: Option<String>,

    /// Hosted checkout page the buyer is redirected to
    pub checkout_url: Option<String>,

    /// Provider-side payment id, known once a notification arrives
    pub provider_payment_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        self.status.parse().unwrap_or(PaymentStatus::Pending)
    }
}

/// Response of a plan upgrade: the pending payment and where to pay it.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment: Payment,
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    #[test]
    fn pending_can_resolve_either_way() {
        assert_eq!(Pending.transition(Approved), Ok(Transition::Apply(Approved)));
        assert_eq!(Pending.transition(Rejected), Ok(Transition::Apply(Rejected)));
    }

    #[test]
    fn same_status_is_a_no_op() {
        assert_eq!(Pending.transition(Pending), Ok(Transition::Unchanged));
        assert_eq!(Approved.transition(Approved), Ok(Transition::Unchanged));
        assert_eq!(Rejected.transition(Rejected), Ok(Transition::Unchanged));
    }

    #[test]
    fn final_states_cannot_change() {
        assert_eq!(Approved.transition(Rejected), Err((Approved, Rejected)));
        assert_eq!(Rejected.transition(Approved), Err((Rejected, Approved)));
        assert_eq!(Approved.transition(Pending), Err((Approved, Pending)));
    }

    #[test]
    fn provider_status_mapping() {
        assert_eq!(PaymentStatus::from_provider("approved"), Approved);
        assert_eq!(PaymentStatus::from_provider("rejected"), Rejected);
        assert_eq!(PaymentStatus::from_provider("cancelled"), Rejected);
        assert_eq!(PaymentStatus::from_provider("in_process"), Pending);
        assert_eq!(PaymentStatus::from_provider("whatever"), Pending);
    }
}
