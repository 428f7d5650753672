pub mod common;
pub mod coupon;
pub mod entitlement;
pub mod grant;
pub mod payment;
pub mod plan;
