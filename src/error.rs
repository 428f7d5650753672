use thiserror::Error;
use uuid::Uuid;

/// Failure talking to the backing store. Always retryable from the caller's
/// point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("could not encode record: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CouponError {
    #[error("coupon {0} not found")]
    NotFound(String),

    #[error("coupon {0} has expired")]
    Expired(String),

    #[error("coupon {0} is not valid yet")]
    NotYetValid(String),

    #[error("coupon {0} was already used by this account")]
    AlreadyUsedByAccount(String),

    #[error("coupon {0} has reached its usage limit")]
    UsageLimitReached(String),

    #[error("coupon {0} already exists")]
    AlreadyExists(String),

    #[error("invalid coupon: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("payment verifier is misconfigured: {0}")]
    Misconfigured(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not determine entitlement: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("plan {0} not found")]
    PlanNotFound(Uuid),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("payment proof is required for a plan costing {0}")]
    PaymentProofMissing(rust_decimal::Decimal),

    #[error("payment verification failed for payment {0}")]
    PaymentVerificationFailed(String),

    #[error("payment {0} already activated a different account")]
    PaymentAlreadyClaimed(String),

    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ResolveError> for ActivationError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Store(e) => ActivationError::Store(e),
        }
    }
}

impl CouponError {
    /// Stable machine-readable code reported to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            CouponError::NotFound(_) => "coupon_not_found",
            CouponError::Expired(_) => "coupon_expired",
            CouponError::NotYetValid(_) => "coupon_not_yet_valid",
            CouponError::AlreadyUsedByAccount(_) => "coupon_already_used_by_account",
            CouponError::UsageLimitReached(_) => "coupon_usage_limit_reached",
            CouponError::AlreadyExists(_) => "coupon_already_exists",
            CouponError::Invalid(_) => "coupon_invalid",
            CouponError::Store(_) => "storage_unavailable",
        }
    }
}

impl ActivationError {
    pub fn code(&self) -> &'static str {
        match self {
            ActivationError::PlanNotFound(_) => "plan_not_found",
            ActivationError::Coupon(e) => e.code(),
            ActivationError::PaymentProofMissing(_) => "payment_proof_missing",
            ActivationError::PaymentVerificationFailed(_) => "payment_verification_failed",
            ActivationError::PaymentAlreadyClaimed(_) => "payment_already_claimed",
            ActivationError::Verifier(_) => "payment_verifier_unavailable",
            ActivationError::Store(_) => "storage_unavailable",
        }
    }
}
