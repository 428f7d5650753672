use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;

use crate::models::plan::Plan;

/// Payment reference recorded on grants that did not involve the gateway.
pub const FREE_ACTIVATION_REF: &str = "FREE";

/// Ledger entry. Created once by activation, never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grant {
    pub id: Uuid,
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub payment_ref: String,
    pub order_ref: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `None` is an unbounded grant.
    pub expires_at: Option<DateTime<Utc>>,
    pub idempotency_key: String,
}

/// How the grant was paid for.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Free,
    Paid { order_ref: String, payment_ref: String },
}

/// Terms of a grant that vary per activation.
#[derive(Debug, Clone)]
pub struct GrantTerms {
    pub settlement: Settlement,
    pub amount: Decimal,
    pub currency: String,
    pub coupon_code: Option<String>,
}

impl Grant {
    pub fn new(account_id: Uuid, plan: &Plan, terms: GrantTerms, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let (payment_ref, order_ref, idempotency_key) = match terms.settlement {
            Settlement::Free => (FREE_ACTIVATION_REF.to_string(), None, format!("free:{}", id)),
            Settlement::Paid { order_ref, payment_ref } => {
                let key = Self::payment_key(&payment_ref);
                (payment_ref, Some(order_ref), key)
            }
        };

        Self {
            id,
            account_id,
            plan_id: plan.id,
            plan_name: plan.name.clone(),
            payment_ref,
            order_ref,
            amount: terms.amount,
            currency: terms.currency,
            coupon_code: terms.coupon_code,
            created_at: now,
            expires_at: plan.expiry_from(now),
            idempotency_key,
        }
    }

    /// Key under which a gateway payment may produce at most one grant.
    pub fn payment_key(payment_ref: &str) -> String {
        format!("payment:{}", payment_ref)
    }

    pub fn is_free(&self) -> bool {
        self.payment_ref == FREE_ACTIVATION_REF && self.order_ref.is_none()
    }

    /// Strictly-after comparison: a grant expiring exactly now is inactive.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Result of appending to the ledger.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    Created(Grant),
    /// Another grant already holds the idempotency key; it is returned as is.
    Duplicate(Grant),
}
