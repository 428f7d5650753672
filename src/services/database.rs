use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use surrealdb::{
    engine::any::{self, Any},
    opt::auth::Root,
    Surreal,
};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{CouponError, StoreError};
use crate::models::{
    coupon::{Coupon, Redemption},
    entitlement::EntitlementSnapshot,
    grant::{AppendOutcome, Grant},
    plan::Plan,
};
use crate::services::store::{CouponStore, EntitlementCache, GrantLedger, HealthCheck, PlanCatalog};

/// Records keep the domain value under `data` so the model's own `id` never
/// collides with SurrealDB's record id.
#[derive(Debug, Serialize, Deserialize)]
struct Row<T> {
    data: T,
}

/// Content for a write. Going through `serde_json` first keeps uuids and
/// timestamps as strings; SurrealDB's own serializer stores uuids as bytes it
/// cannot read back into `Uuid`.
fn content<T: Serialize>(data: &T) -> Result<Row<serde_json::Value>, StoreError> {
    Ok(Row {
        data: serde_json::to_value(data)?,
    })
}

fn first<T>(rows: Vec<Row<T>>) -> Option<T> {
    rows.into_iter().next().map(|row| row.data)
}

/// SurrealDB-backed store. Reached through `engine::any`, so the same code
/// serves `mem://` and remote `http://` endpoints.
#[derive(Clone)]
pub struct DatabaseService {
    db: Surreal<Any>,
}

impl DatabaseService {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let db = any::connect(config.url.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(config.namespace.as_str()).use_db(config.database.as_str()).await?;

        let service = Self { db };
        service.initialize_schema().await?;

        Ok(service)
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        self.db
            .query(
                "
            DEFINE TABLE plans SCHEMALESS;
            DEFINE TABLE coupons SCHEMALESS;
            DEFINE TABLE grants SCHEMALESS;
            DEFINE INDEX grants_account ON grants COLUMNS data.account_id;
            DEFINE INDEX grants_idempotency_key ON grants COLUMNS data.idempotency_key UNIQUE;
            DEFINE TABLE entitlements SCHEMALESS;
        ",
            )
            .await?
            .check()?;

        log::info!("Database schema initialized successfully");
        Ok(())
    }

    async fn select_row<T>(&self, table: &str, id: String) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let row: Option<Row<T>> = self.db.select((table, id)).await?;
        Ok(row.map(|row| row.data))
    }

    async fn upsert_row<T>(&self, table: &str, id: String, data: &T) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let row = content(data)?;
        let _: Option<Row<T>> = self.db.update((table, id)).content(row).await?;
        Ok(())
    }
}

#[async_trait]
impl PlanCatalog for DatabaseService {
    async fn get_plan(&self, plan_id: &Uuid) -> Result<Option<Plan>, StoreError> {
        self.select_row("plans", plan_id.to_string()).await
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let rows: Vec<Row<Plan>> = self.db.select("plans").await?;
        let mut plans: Vec<Plan> = rows.into_iter().map(|row| row.data).collect();
        plans.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn save_plan(&self, plan: &Plan) -> Result<(), StoreError> {
        self.upsert_row("plans", plan.id.to_string(), plan).await
    }
}

#[async_trait]
impl CouponStore for DatabaseService {
    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        self.select_row("coupons", code.to_string()).await
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), CouponError> {
        let row = content(coupon)?;
        let created: Result<Option<Row<Coupon>>, surrealdb::Error> = self
            .db
            .create(("coupons", coupon.code.clone()))
            .content(row)
            .await;

        match created {
            Ok(_) => Ok(()),
            Err(err) => {
                if self.get_coupon(&coupon.code).await?.is_some() {
                    Err(CouponError::AlreadyExists(coupon.code.clone()))
                } else {
                    Err(CouponError::Store(err.into()))
                }
            }
        }
    }

    async fn redeem(&self, code: &str, account_id: Uuid, now: DateTime<Utc>) -> Result<Redemption, CouponError> {
        let coupon = self
            .get_coupon(code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.to_string()))?;
        coupon.check_redeemable(&account_id, now)?;

        // Compare-and-append: the guard re-checks the per-account and global
        // rules inside the same statement that records the redemption.
        let mut response = self
            .db
            .query(
                "UPDATE type::thing('coupons', $code)
                    SET data.redeemed_by += $account
                    WHERE array::len(data.redeemed_by) < data.usage_limit
                        AND data.redeemed_by CONTAINSNOT $account
                    RETURN AFTER",
            )
            .bind(("code", code.to_string()))
            .bind(("account", account_id.to_string()))
            .await
            .map_err(StoreError::from)?;
        let updated: Vec<Row<Coupon>> = response.take(0).map_err(StoreError::from)?;

        if let Some(coupon) = first(updated) {
            log::debug!("Coupon {} redeemed in database by {}", code, account_id);
            return Ok(coupon.redemption());
        }

        // Lost a race between the read and the guarded update.
        let latest = self
            .get_coupon(code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.to_string()))?;
        latest.check_redeemable(&account_id, now)?;

        Err(CouponError::Store(StoreError::Backend(format!(
            "guarded redemption of coupon {} was not applied",
            code
        ))))
    }
}

#[async_trait]
impl GrantLedger for DatabaseService {
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Grant>, StoreError> {
        let mut response = self
            .db
            .query("SELECT * FROM grants WHERE data.idempotency_key = $key LIMIT 1")
            .bind(("key", key.to_string()))
            .await?;
        let rows: Vec<Row<Grant>> = response.take(0)?;
        Ok(first(rows))
    }

    async fn append(&self, grant: Grant) -> Result<AppendOutcome, StoreError> {
        let row = content(&grant)?;
        let created: Result<Option<Row<Grant>>, surrealdb::Error> = self
            .db
            .create(("grants", grant.id.to_string()))
            .content(row)
            .await;

        match created {
            Ok(row) => Ok(AppendOutcome::Created(row.map(|row| row.data).unwrap_or(grant))),
            Err(err) => {
                // The unique index on the idempotency key rejects duplicates;
                // anything else is a genuine storage failure.
                match self.find_by_idempotency_key(&grant.idempotency_key).await? {
                    Some(existing) => Ok(AppendOutcome::Duplicate(existing)),
                    None => Err(err.into()),
                }
            }
        }
    }

    async fn grants_for_account(&self, account_id: &Uuid) -> Result<Vec<Grant>, StoreError> {
        let mut response = self
            .db
            .query("SELECT * FROM grants WHERE data.account_id = $account")
            .bind(("account", account_id.to_string()))
            .await?;
        let rows: Vec<Row<Grant>> = response.take(0)?;

        let mut grants: Vec<Grant> = rows.into_iter().map(|row| row.data).collect();
        grants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(grants)
    }
}

#[async_trait]
impl EntitlementCache for DatabaseService {
    async fn save_snapshot(&self, snapshot: &EntitlementSnapshot) -> Result<(), StoreError> {
        self.upsert_row("entitlements", snapshot.account_id.to_string(), snapshot).await
    }

    async fn cached_snapshot(&self, account_id: &Uuid) -> Result<Option<EntitlementSnapshot>, StoreError> {
        self.select_row("entitlements", account_id.to_string()).await
    }
}

#[async_trait]
impl HealthCheck for DatabaseService {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.db.health().await?;
        Ok(())
    }
}
