use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CouponError, StoreError};
use crate::models::{
    coupon::{Coupon, Redemption},
    entitlement::EntitlementSnapshot,
    grant::{AppendOutcome, Grant},
    plan::Plan,
};
use crate::services::store::{CouponStore, EntitlementCache, GrantLedger, HealthCheck, PlanCatalog};

#[derive(Default)]
struct Ledger {
    grants: Vec<Grant>,
    by_key: HashMap<String, usize>,
}

/// In-process store. Each collection sits behind its own lock; every
/// check-then-write happens under a single write guard.
#[derive(Default)]
pub struct MemoryStore {
    plans: RwLock<HashMap<Uuid, Plan>>,
    coupons: RwLock<HashMap<String, Coupon>>,
    ledger: RwLock<Ledger>,
    snapshots: RwLock<HashMap<Uuid, EntitlementSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanCatalog for MemoryStore {
    async fn get_plan(&self, plan_id: &Uuid) -> Result<Option<Plan>, StoreError> {
        Ok(self.plans.read().await.get(plan_id).cloned())
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let mut plans: Vec<Plan> = self.plans.read().await.values().cloned().collect();
        plans.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn save_plan(&self, plan: &Plan) -> Result<(), StoreError> {
        self.plans.write().await.insert(plan.id, plan.clone());
        Ok(())
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self.coupons.read().await.get(code).cloned())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), CouponError> {
        let mut coupons = self.coupons.write().await;
        if coupons.contains_key(&coupon.code) {
            return Err(CouponError::AlreadyExists(coupon.code.clone()));
        }
        coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn redeem(&self, code: &str, account_id: Uuid, now: DateTime<Utc>) -> Result<Redemption, CouponError> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons
            .get_mut(code)
            .ok_or_else(|| CouponError::NotFound(code.to_string()))?;
        coupon.redeem(account_id, now)
    }
}

#[async_trait]
impl GrantLedger for MemoryStore {
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Grant>, StoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.by_key.get(key).map(|&index| ledger.grants[index].clone()))
    }

    async fn append(&self, grant: Grant) -> Result<AppendOutcome, StoreError> {
        let mut ledger = self.ledger.write().await;
        if let Some(&index) = ledger.by_key.get(&grant.idempotency_key) {
            return Ok(AppendOutcome::Duplicate(ledger.grants[index].clone()));
        }

        let index = ledger.grants.len();
        ledger.by_key.insert(grant.idempotency_key.clone(), index);
        ledger.grants.push(grant.clone());
        Ok(AppendOutcome::Created(grant))
    }

    async fn grants_for_account(&self, account_id: &Uuid) -> Result<Vec<Grant>, StoreError> {
        let ledger = self.ledger.read().await;
        let mut grants: Vec<Grant> = ledger
            .grants
            .iter()
            .filter(|grant| grant.account_id == *account_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(grants)
    }
}

#[async_trait]
impl EntitlementCache for MemoryStore {
    async fn save_snapshot(&self, snapshot: &EntitlementSnapshot) -> Result<(), StoreError> {
        self.snapshots.write().await.insert(snapshot.account_id, snapshot.clone());
        Ok(())
    }

    async fn cached_snapshot(&self, account_id: &Uuid) -> Result<Option<EntitlementSnapshot>, StoreError> {
        Ok(self.snapshots.read().await.get(account_id).cloned())
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use crate::models::coupon::CreateCouponRequest;
    use crate::models::grant::{GrantTerms, Settlement};
    use crate::models::plan::CreatePlanRequest;

    fn coupon(code: &str, limit: u32) -> Coupon {
        let now = Utc::now();
        Coupon::new(CreateCouponRequest {
            code: code.to_string(),
            discount_percent: 10,
            valid_from: now - Duration::days(1),
            valid_till: now + Duration::days(1),
            usage_limit: limit,
        })
    }

    fn paid_grant(account_id: Uuid, payment_ref: &str) -> Grant {
        let plan = Plan::new(CreatePlanRequest {
            name: "Pro".to_string(),
            price: Decimal::new(500, 0),
            discounted_price: None,
            validity_days: 30,
            level: 1,
            features: vec![],
        });
        Grant::new(
            account_id,
            &plan,
            GrantTerms {
                settlement: Settlement::Paid {
                    order_ref: "order".to_string(),
                    payment_ref: payment_ref.to_string(),
                },
                amount: plan.price,
                currency: "INR".to_string(),
                coupon_code: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_unknown_coupon() {
        let store = MemoryStore::new();
        let result = store.redeem("NOPE", Uuid::new_v4(), Utc::now()).await;
        assert!(matches!(result, Err(CouponError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_coupon_code_rejected() {
        let store = MemoryStore::new();
        store.insert_coupon(&coupon("DUP", 1)).await.unwrap();
        let result = store.insert_coupon(&coupon("DUP", 5)).await;
        assert!(matches!(result, Err(CouponError::AlreadyExists(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hundred_concurrent_redemptions_against_limit_ten() {
        let store = Arc::new(MemoryStore::new());
        store.insert_coupon(&coupon("TEN", 10)).await.unwrap();
        let now = Utc::now();

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.redeem("TEN", Uuid::new_v4(), now).await })
            })
            .collect();

        let mut successes = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(CouponError::UsageLimitReached(_)) => limited += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 10);
        assert_eq!(limited, 90);
        assert_eq!(store.get_coupon("TEN").await.unwrap().unwrap().redeemed_by.len(), 10);
    }

    #[tokio::test]
    async fn test_append_collapses_duplicate_payment() {
        let store = MemoryStore::new();
        let account = Uuid::new_v4();
        let first = paid_grant(account, "pay_1");
        let retry = paid_grant(account, "pay_1");

        assert!(matches!(store.append(first.clone()).await.unwrap(), AppendOutcome::Created(_)));
        match store.append(retry).await.unwrap() {
            AppendOutcome::Duplicate(existing) => assert_eq!(existing, first),
            AppendOutcome::Created(_) => panic!("duplicate payment created a second grant"),
        }

        assert_eq!(store.grants_for_account(&account).await.unwrap().len(), 1);
        assert_eq!(
            store.find_by_idempotency_key("payment:pay_1").await.unwrap(),
            Some(first)
        );
    }
}
