use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::grant::Grant;

/// Derived view of an account's access. A cache over the ledger, never a
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntitlementSnapshot {
    pub account_id: Uuid,
    pub is_premium: bool,
    /// `None` with `is_premium` set means the backing grant never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub plan_id: Option<Uuid>,
    pub plan_name: Option<String>,
    pub grant_id: Option<Uuid>,
    pub resolved_at: DateTime<Utc>,
}

impl EntitlementSnapshot {
    pub fn none(account_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            is_premium: false,
            expires_at: None,
            plan_id: None,
            plan_name: None,
            grant_id: None,
            resolved_at: now,
        }
    }

    pub fn from_grant(grant: &Grant, now: DateTime<Utc>) -> Self {
        Self {
            account_id: grant.account_id,
            is_premium: true,
            expires_at: grant.expires_at,
            plan_id: Some(grant.plan_id),
            plan_name: Some(grant.plan_name.clone()),
            grant_id: Some(grant.id),
            resolved_at: now,
        }
    }
}

/// Unbounded expiry sorts after every bounded one.
fn compare_expiry(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

fn precedence(a: &Grant, b: &Grant) -> Ordering {
    compare_expiry(a.expires_at, b.expires_at)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// The single grant backing current access: the active grant with the latest
/// expiry, newest creation on ties. Grants do not stack.
pub fn current_grant(grants: &[Grant], now: DateTime<Utc>) -> Option<&Grant> {
    grants
        .iter()
        .filter(|grant| grant.is_active_at(now))
        .max_by(|a, b| precedence(a, b))
}

/// Pure entitlement resolution over an account's ledger entries.
pub fn resolve_grants(account_id: Uuid, grants: &[Grant], now: DateTime<Utc>) -> EntitlementSnapshot {
    let own: Vec<Grant> = grants
        .iter()
        .filter(|grant| grant.account_id == account_id)
        .cloned()
        .collect();

    match current_grant(&own, now) {
        Some(grant) => EntitlementSnapshot::from_grant(grant, now),
        None => EntitlementSnapshot::none(account_id, now),
    }
}
