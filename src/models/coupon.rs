use std::collections::BTreeSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use regex::Regex;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::CouponError;

static COUPON_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_-]{3,32}$").expect("coupon code pattern compiles"));

/// Trims and upper-cases a user supplied code so `summer20` and ` SUMMER20 `
/// hit the same record.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    pub code: String,
    pub discount_percent: u8,
    pub valid_from: DateTime<Utc>,
    pub valid_till: DateTime<Utc>,
    pub usage_limit: u32,
    pub redeemed_by: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct CreateCouponRequest {
    #[validate(custom = "validate_code")]
    pub code: String,

    #[validate(range(min = 1, max = 100, message = "Discount must be between 1 and 100 percent"))]
    pub discount_percent: u8,

    pub valid_from: DateTime<Utc>,
    pub valid_till: DateTime<Utc>,

    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: u32,
}

fn validate_code(code: &str) -> Result<(), ValidationError> {
    if COUPON_CODE.is_match(&normalize_code(code)) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_coupon_code"))
    }
}

fn validate_window(request: &CreateCouponRequest) -> Result<(), ValidationError> {
    if request.valid_from > request.valid_till {
        return Err(ValidationError::new("valid_from_after_valid_till"));
    }
    Ok(())
}

/// Outcome of a successful redemption or preview.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Redemption {
    pub code: String,
    pub discount_percent: u8,
}

impl Coupon {
    pub fn new(request: CreateCouponRequest) -> Self {
        Self {
            code: normalize_code(&request.code),
            discount_percent: request.discount_percent,
            valid_from: request.valid_from,
            valid_till: request.valid_till,
            usage_limit: request.usage_limit,
            redeemed_by: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn uses_remaining(&self) -> u32 {
        self.usage_limit.saturating_sub(self.redeemed_by.len() as u32)
    }

    /// Redemption rules in precedence order: window, per-account, global limit.
    /// Existence is the caller's concern. Stores must evaluate this and record
    /// the redemption inside one critical section.
    pub fn check_redeemable(&self, account_id: &Uuid, now: DateTime<Utc>) -> Result<(), CouponError> {
        if now < self.valid_from {
            return Err(CouponError::NotYetValid(self.code.clone()));
        }
        if now > self.valid_till {
            return Err(CouponError::Expired(self.code.clone()));
        }
        if self.redeemed_by.contains(account_id) {
            return Err(CouponError::AlreadyUsedByAccount(self.code.clone()));
        }
        if self.uses_remaining() == 0 {
            return Err(CouponError::UsageLimitReached(self.code.clone()));
        }
        Ok(())
    }

    /// Checks and records the redemption. Only call while holding exclusive
    /// access to this coupon.
    pub fn redeem(&mut self, account_id: Uuid, now: DateTime<Utc>) -> Result<Redemption, CouponError> {
        self.check_redeemable(&account_id, now)?;
        self.redeemed_by.insert(account_id);
        Ok(self.redemption())
    }

    pub fn redemption(&self) -> Redemption {
        Redemption {
            code: self.code.clone(),
            discount_percent: self.discount_percent,
        }
    }
}
