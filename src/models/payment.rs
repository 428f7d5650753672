use serde::{Deserialize, Serialize};
use uuid::Uuid;
use rust_decimal::Decimal;
use validator::Validate;

use crate::models::{entitlement::EntitlementSnapshot, grant::Grant};

/// What the gateway hands the client after checkout.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PaymentProof {
    #[validate(length(min = 1, max = 128, message = "Order reference is required"))]
    pub order_ref: String,

    #[validate(length(min = 1, max = 128, message = "Payment reference is required"))]
    pub payment_ref: String,

    #[validate(length(min = 1, max = 256, message = "Signature is required"))]
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActivationRequest {
    pub account_id: Uuid,
    pub plan_id: Uuid,

    #[validate]
    pub payment: Option<PaymentProof>,

    #[validate(length(min = 1, max = 64, message = "Coupon code cannot be empty"))]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub grant: Grant,
    pub entitlement: EntitlementSnapshot,
    /// Set when the payment had already been activated and the stored grant was
    /// returned instead of writing a new one.
    pub replayed: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RedeemCouponRequest {
    #[validate(length(min = 1, max = 64, message = "Coupon code cannot be empty"))]
    pub code: String,
    pub account_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PreviewCouponRequest {
    #[validate(length(min = 1, max = 64, message = "Coupon code cannot be empty"))]
    pub code: String,
    pub account_id: Uuid,
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceQuote {
    pub code: String,
    pub discount_percent: u8,
    pub uses_remaining: u32,
    pub plan_id: Option<Uuid>,
    pub list_price: Option<Decimal>,
    pub effective_price: Option<Decimal>,
}
