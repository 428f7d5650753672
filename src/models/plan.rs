use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;
use validator::{Validate, ValidationError};

/// Catalog entry. Grants copy the name and the amount actually charged, so
/// editing a plan never rewrites history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub discounted_price: Option<Decimal>,
    /// Zero means the plan never expires.
    pub validity_days: u32,
    pub level: i32,
    pub features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(custom = "validate_amount")]
    pub price: Decimal,

    #[validate(custom = "validate_amount")]
    pub discounted_price: Option<Decimal>,

    #[validate(range(max = 36500, message = "Validity cannot exceed 100 years"))]
    pub validity_days: u32,

    #[serde(default)]
    pub level: i32,

    #[serde(default)]
    pub features: Vec<String>,
}

fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        return Err(ValidationError::new("negative_amount"));
    }
    if amount.scale() > 2 {
        return Err(ValidationError::new("too_many_decimal_places"));
    }
    Ok(())
}

impl Plan {
    pub fn new(request: CreatePlanRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: request.name,
            price: request.price,
            discounted_price: request.discounted_price,
            validity_days: request.validity_days,
            level: request.level,
            features: request.features,
            created_at: now,
            updated_at: now,
        }
    }

    /// Full replacement of the editable fields; id and creation time survive.
    pub fn replace(&mut self, request: CreatePlanRequest) {
        self.name = request.name;
        self.price = request.price;
        self.discounted_price = request.discounted_price;
        self.validity_days = request.validity_days;
        self.level = request.level;
        self.features = request.features;
        self.updated_at = Utc::now();
    }

    pub fn is_unlimited(&self) -> bool {
        self.validity_days == 0
    }

    /// Price the account pays. A coupon discounts the list price; without one
    /// the catalog's discounted price applies when set.
    pub fn effective_price(&self, discount_percent: Option<u8>) -> Decimal {
        match discount_percent {
            Some(percent) => {
                let remaining = Decimal::from(100u8.saturating_sub(percent));
                (self.price * remaining / Decimal::ONE_HUNDRED).round_dp(2)
            }
            None => self.discounted_price.unwrap_or(self.price),
        }
    }

    pub fn expiry_from(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_unlimited() {
            None
        } else {
            Some(start + Duration::days(self.validity_days as i64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(price: i64, discounted: Option<i64>, validity_days: u32) -> Plan {
        Plan::new(CreatePlanRequest {
            name: "Pro".to_string(),
            price: Decimal::new(price, 0),
            discounted_price: discounted.map(|d| Decimal::new(d, 0)),
            validity_days,
            level: 2,
            features: vec!["downloads".to_string()],
        })
    }

    #[test]
    fn test_coupon_discounts_list_price() {
        let plan = plan(1000, Some(900), 30);
        assert_eq!(plan.effective_price(Some(20)), Decimal::new(800, 0));
        assert_eq!(plan.effective_price(Some(100)), Decimal::ZERO);
    }

    #[test]
    fn test_discounted_price_without_coupon() {
        assert_eq!(plan(1000, Some(900), 30).effective_price(None), Decimal::new(900, 0));
        assert_eq!(plan(1000, None, 30).effective_price(None), Decimal::new(1000, 0));
    }

    #[test]
    fn test_fractional_discount_rounds_to_cents() {
        let plan = Plan::new(CreatePlanRequest {
            name: "Odd".to_string(),
            price: Decimal::new(999, 2),
            discounted_price: None,
            validity_days: 30,
            level: 1,
            features: vec![],
        });
        // 9.99 * 0.67 = 6.6933
        assert_eq!(plan.effective_price(Some(33)), Decimal::new(669, 2));
    }

    #[test]
    fn test_expiry() {
        let start = Utc::now();
        assert_eq!(plan(10, None, 30).expiry_from(start), Some(start + Duration::days(30)));
        assert_eq!(plan(10, None, 0).expiry_from(start), None);
    }

    #[test]
    fn test_plan_request_validation() {
        let mut request = CreatePlanRequest {
            name: "Pro".to_string(),
            price: Decimal::new(-1, 0),
            discounted_price: None,
            validity_days: 30,
            level: 1,
            features: vec![],
        };
        assert!(request.validate().is_err());

        request.price = Decimal::new(49999, 2);
        assert!(request.validate().is_ok());

        request.discounted_price = Some(Decimal::new(1, 3));
        assert!(request.validate().is_err());
    }
}
