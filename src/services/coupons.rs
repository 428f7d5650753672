use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::CouponError;
use crate::models::{
    coupon::{normalize_code, Coupon, CreateCouponRequest, Redemption},
    payment::PriceQuote,
    plan::Plan,
};
use crate::services::store::CouponStore;

#[derive(Clone)]
pub struct CouponService {
    store: Arc<dyn CouponStore>,
}

impl CouponService {
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    pub async fn create_coupon(&self, request: CreateCouponRequest) -> Result<Coupon, CouponError> {
        request
            .validate()
            .map_err(|e| CouponError::Invalid(e.to_string()))?;

        let coupon = Coupon::new(request);
        self.store.insert_coupon(&coupon).await?;
        log::info!(
            "Created coupon {} ({}% off, {} uses)",
            coupon.code,
            coupon.discount_percent,
            coupon.usage_limit
        );
        Ok(coupon)
    }

    /// Consumes one use of `code` for the account. There is no release path:
    /// a consumed use stays consumed whatever happens afterwards.
    pub async fn redeem(&self, code: &str, account_id: Uuid, now: DateTime<Utc>) -> Result<Redemption, CouponError> {
        let code = normalize_code(code);
        match self.store.redeem(&code, account_id, now).await {
            Ok(redemption) => {
                log::info!("Coupon {} redeemed by account {}", code, account_id);
                Ok(redemption)
            }
            Err(e) => {
                log::warn!("Coupon {} rejected for account {}: {}", code, account_id, e);
                Err(e)
            }
        }
    }

    pub async fn get(&self, code: &str) -> Result<Coupon, CouponError> {
        let code = normalize_code(code);
        self.store
            .get_coupon(&code)
            .await?
            .ok_or(CouponError::NotFound(code))
    }

    /// Same checks as `redeem` without consuming anything.
    pub async fn preview(&self, code: &str, account_id: Uuid, now: DateTime<Utc>) -> Result<Coupon, CouponError> {
        let coupon = self.get(code).await?;
        coupon.check_redeemable(&account_id, now)?;
        Ok(coupon)
    }

    pub async fn quote(
        &self,
        code: &str,
        account_id: Uuid,
        plan: Option<&Plan>,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote, CouponError> {
        let coupon = self.preview(code, account_id, now).await?;
        Ok(PriceQuote {
            code: coupon.code.clone(),
            discount_percent: coupon.discount_percent,
            uses_remaining: coupon.uses_remaining(),
            plan_id: plan.map(|p| p.id),
            list_price: plan.map(|p| p.price),
            effective_price: plan.map(|p| p.effective_price(Some(coupon.discount_percent))),
        })
    }
}
