use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ResolveError, StoreError};
use crate::models::entitlement::{resolve_grants, EntitlementSnapshot};
use crate::services::store::{EntitlementCache, GrantLedger};

/// Derives current access from the ledger and keeps the snapshot cache warm.
#[derive(Clone)]
pub struct EntitlementResolver {
    ledger: Arc<dyn GrantLedger>,
    cache: Arc<dyn EntitlementCache>,
}

impl EntitlementResolver {
    pub fn new(ledger: Arc<dyn GrantLedger>, cache: Arc<dyn EntitlementCache>) -> Self {
        Self { ledger, cache }
    }

    /// Fresh resolution from the ledger. The result overwrites whatever the
    /// cache held; failing to write the cache does not fail the read.
    pub async fn resolve(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<EntitlementSnapshot, ResolveError> {
        let grants = self.ledger.grants_for_account(&account_id).await?;
        let snapshot = resolve_grants(account_id, &grants, now);

        if let Err(e) = self.cache.save_snapshot(&snapshot).await {
            log::warn!("Could not persist entitlement snapshot for {}: {}", account_id, e);
        }

        Ok(snapshot)
    }

    /// Last persisted snapshot. Not authoritative: use `resolve` for any
    /// access decision.
    pub async fn cached(&self, account_id: Uuid) -> Result<Option<EntitlementSnapshot>, StoreError> {
        self.cache.cached_snapshot(&account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use crate::models::grant::{AppendOutcome, Grant, GrantTerms, Settlement};
    use crate::models::plan::{CreatePlanRequest, Plan};
    use crate::services::memory::MemoryStore;

    fn plan(name: &str, validity_days: u32) -> Plan {
        Plan::new(CreatePlanRequest {
            name: name.to_string(),
            price: Decimal::new(100, 0),
            discounted_price: None,
            validity_days,
            level: 1,
            features: vec![],
        })
    }

    fn grant(account: Uuid, plan: &Plan, payment_ref: &str, at: DateTime<Utc>) -> Grant {
        Grant::new(
            account,
            plan,
            GrantTerms {
                settlement: Settlement::Paid {
                    order_ref: format!("order_{}", payment_ref),
                    payment_ref: payment_ref.to_string(),
                },
                amount: plan.price,
                currency: "INR".to_string(),
                coupon_code: None,
            },
            at,
        )
    }

    struct FailingLedger;

    #[async_trait]
    impl GrantLedger for FailingLedger {
        async fn find_by_idempotency_key(&self, _key: &str) -> Result<Option<Grant>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn append(&self, _grant: Grant) -> Result<AppendOutcome, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn grants_for_account(&self, _account_id: &Uuid) -> Result<Vec<Grant>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolution_updates_cache_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let resolver = EntitlementResolver::new(store.clone(), store.clone());
        let account = Uuid::new_v4();
        let now = Utc::now();

        store.append(grant(account, &plan("Monthly", 10), "pay_a", now)).await.unwrap();
        store.append(grant(account, &plan("Quarterly", 30), "pay_b", now)).await.unwrap();

        let first = resolver.resolve(account, now).await.unwrap();
        let second = resolver.resolve(account, now).await.unwrap();

        assert_eq!(first, second);
        assert!(first.is_premium);
        assert_eq!(first.plan_name.as_deref(), Some("Quarterly"));
        assert_eq!(first.expires_at, Some(now + Duration::days(30)));
        assert_eq!(resolver.cached(account).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_fresh_resolution_overrides_stale_cache() {
        let store = Arc::new(MemoryStore::new());
        let resolver = EntitlementResolver::new(store.clone(), store.clone());
        let account = Uuid::new_v4();
        let now = Utc::now();

        // A cache claiming premium with no grant behind it.
        let mut bogus = EntitlementSnapshot::none(account, now);
        bogus.is_premium = true;
        bogus.expires_at = Some(now + Duration::days(365));
        store.save_snapshot(&bogus).await.unwrap();

        let snapshot = resolver.resolve(account, now).await.unwrap();
        assert!(!snapshot.is_premium);
        assert_eq!(resolver.cached(account).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_reported_as_free() {
        let cache = Arc::new(MemoryStore::new());
        let resolver = EntitlementResolver::new(Arc::new(FailingLedger), cache.clone());
        let account = Uuid::new_v4();

        let result = resolver.resolve(account, Utc::now()).await;
        assert!(matches!(result, Err(ResolveError::Store(_))));
        assert!(cache.cached_snapshot(&account).await.unwrap().is_none());
    }
}
