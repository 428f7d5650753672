use actix_web::{post, HttpResponse};
use actix_web::web::{Data, Json};
use chrono::Utc;
use validator::Validate;

use crate::handlers::{ApiError, AppState};
use crate::models::{
    common::ApiResponse,
    payment::{PreviewCouponRequest, RedeemCouponRequest},
};

// POST /coupons/redeem
#[post("/coupons/redeem")]
pub async fn redeem_coupon(
    state: Data<AppState>,
    payload: Json<RedeemCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;
    let redemption = state
        .coupons
        .redeem(&payload.code, payload.account_id, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(redemption)))
}

// POST /coupons/preview
#[post("/coupons/preview")]
pub async fn preview_coupon(
    state: Data<AppState>,
    payload: Json<PreviewCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let plan = match payload.plan_id {
        Some(plan_id) => Some(
            state
                .stores
                .plans
                .get_plan(&plan_id)
                .await?
                .ok_or_else(|| ApiError::not_found("plan_not_found", format!("plan {} not found", plan_id)))?,
        ),
        None => None,
    };

    let quote = state
        .coupons
        .quote(&payload.code, payload.account_id, plan.as_ref(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(quote)))
}
