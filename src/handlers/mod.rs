pub mod activation;
pub mod coupons;
pub mod entitlements;
pub mod health;
pub mod plans;

use actix_web::{http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;
use validator::ValidationErrors;

use crate::error::{ActivationError, CouponError, ResolveError, StoreError};
use crate::models::common::ApiResponse;
use crate::services::{
    activation::ActivationService,
    coupons::CouponService,
    resolver::EntitlementResolver,
    store::Stores,
};

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Everything the handlers share, registered once as `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub activation: ActivationService,
    pub coupons: CouponService,
    pub resolver: EntitlementResolver,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn require_admin(&self, req: &HttpRequest) -> Result<(), ApiError> {
        let presented = req
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());

        match (&self.admin_token, presented) {
            (Some(expected), Some(token)) if expected == token => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("admin token missing or invalid")]
    Unauthorized,

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl ApiError {
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::NotFound {
            code,
            message: message.into(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_failed",
            ApiError::NotFound { code, .. } => *code,
            ApiError::Unauthorized => "unauthorized",
            ApiError::Activation(e) => e.code(),
            ApiError::Coupon(e) => e.code(),
            ApiError::Resolve(_) | ApiError::Store(_) => "storage_unavailable",
        }
    }

    fn retryable(&self) -> bool {
        self.status_code() == StatusCode::SERVICE_UNAVAILABLE
    }
}

fn coupon_status(err: &CouponError) -> StatusCode {
    match err {
        CouponError::NotFound(_) => StatusCode::NOT_FOUND,
        CouponError::Expired(_) | CouponError::NotYetValid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CouponError::AlreadyUsedByAccount(_)
        | CouponError::UsageLimitReached(_)
        | CouponError::AlreadyExists(_) => StatusCode::CONFLICT,
        CouponError::Invalid(_) => StatusCode::BAD_REQUEST,
        CouponError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Coupon(e) => coupon_status(e),
            ApiError::Activation(e) => match e {
                ActivationError::PlanNotFound(_) => StatusCode::NOT_FOUND,
                ActivationError::Coupon(e) => coupon_status(e),
                ActivationError::PaymentProofMissing(_)
                | ActivationError::PaymentVerificationFailed(_) => StatusCode::PAYMENT_REQUIRED,
                ActivationError::PaymentAlreadyClaimed(_) => StatusCode::CONFLICT,
                ActivationError::Verifier(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ActivationError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Resolve(_) | ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(ApiResponse::error(self.code(), self.to_string(), self.retryable()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_status_mapping() {
        let limit = ApiError::from(CouponError::UsageLimitReached("C".to_string()));
        assert_eq!(limit.status_code(), StatusCode::CONFLICT);
        assert_eq!(limit.code(), "coupon_usage_limit_reached");

        let expired = ApiError::from(ActivationError::from(CouponError::Expired("C".to_string())));
        assert_eq!(expired.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let unpaid = ApiError::from(ActivationError::PaymentProofMissing(Decimal::new(800, 0)));
        assert_eq!(unpaid.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert!(!unpaid.retryable());

        let storage = ApiError::from(StoreError::Backend("timeout".to_string()));
        assert_eq!(storage.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(storage.retryable());
    }
}
