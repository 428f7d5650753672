use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CouponError, StoreError};
use crate::models::{
    coupon::{Coupon, Redemption},
    entitlement::EntitlementSnapshot,
    grant::{AppendOutcome, Grant},
    plan::Plan,
};

/// Read side of the catalog plus the out-of-band admin writes.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn get_plan(&self, plan_id: &Uuid) -> Result<Option<Plan>, StoreError>;

    /// Ordered by level, then name.
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError>;

    async fn save_plan(&self, plan: &Plan) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// `code` is expected to be normalized already.
    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    /// Fails with `AlreadyExists` when the code is taken.
    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), CouponError>;

    /// Atomically applies `Coupon::check_redeemable` and records the account.
    /// Concurrent calls for the last use must admit exactly one.
    async fn redeem(&self, code: &str, account_id: Uuid, now: DateTime<Utc>) -> Result<Redemption, CouponError>;
}

/// Append-only grant storage with a unique idempotency key.
#[async_trait]
pub trait GrantLedger: Send + Sync {
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Grant>, StoreError>;

    /// Inserts unless the idempotency key already exists, in which case the
    /// stored grant comes back as `Duplicate`. Must be atomic.
    async fn append(&self, grant: Grant) -> Result<AppendOutcome, StoreError>;

    /// Newest first.
    async fn grants_for_account(&self, account_id: &Uuid) -> Result<Vec<Grant>, StoreError>;
}

/// Denormalized per-account snapshot. Disposable.
#[async_trait]
pub trait EntitlementCache: Send + Sync {
    async fn save_snapshot(&self, snapshot: &EntitlementSnapshot) -> Result<(), StoreError>;

    async fn cached_snapshot(&self, account_id: &Uuid) -> Result<Option<EntitlementSnapshot>, StoreError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Every persistence port, usually all backed by the same store.
#[derive(Clone)]
pub struct Stores {
    pub plans: Arc<dyn PlanCatalog>,
    pub coupons: Arc<dyn CouponStore>,
    pub ledger: Arc<dyn GrantLedger>,
    pub cache: Arc<dyn EntitlementCache>,
    pub health: Arc<dyn HealthCheck>,
}

impl Stores {
    pub fn from_backend<S>(store: Arc<S>) -> Self
    where
        S: PlanCatalog + CouponStore + GrantLedger + EntitlementCache + HealthCheck + 'static,
    {
        Self {
            plans: store.clone(),
            coupons: store.clone(),
            ledger: store.clone(),
            cache: store.clone(),
            health: store,
        }
    }
}
