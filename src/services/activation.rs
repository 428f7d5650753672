use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{ActivationError, CouponError};
use crate::models::{
    coupon::Coupon,
    grant::{AppendOutcome, Grant, GrantTerms, Settlement},
    payment::{Activation, ActivationRequest, PaymentProof},
};
use crate::services::{
    coupons::CouponService,
    resolver::EntitlementResolver,
    store::{GrantLedger, PlanCatalog},
    verifier::PaymentVerifier,
};

enum HeldUse {
    Unclaimed(Coupon),
    ClaimedBy(Grant),
}

/// Turns a purchase (or free activation) into a ledger grant.
#[derive(Clone)]
pub struct ActivationService {
    plans: Arc<dyn PlanCatalog>,
    coupons: CouponService,
    verifier: Arc<dyn PaymentVerifier>,
    ledger: Arc<dyn GrantLedger>,
    resolver: EntitlementResolver,
    currency: String,
}

impl ActivationService {
    pub fn new(
        plans: Arc<dyn PlanCatalog>,
        coupons: CouponService,
        verifier: Arc<dyn PaymentVerifier>,
        ledger: Arc<dyn GrantLedger>,
        resolver: EntitlementResolver,
        currency: String,
    ) -> Self {
        Self {
            plans,
            coupons,
            verifier,
            ledger,
            resolver,
            currency,
        }
    }

    /// Activates a plan for an account.
    ///
    /// Nothing durable is written before the payment checks out, except a
    /// coupon use. That use is never returned to the pool, but it stays
    /// available to the same account until a grant carries the code.
    /// Replaying the same payment returns the grant it already produced, so
    /// callers may retry any failure.
    pub async fn activate(&self, request: ActivationRequest, now: DateTime<Utc>) -> Result<Activation, ActivationError> {
        let ActivationRequest {
            account_id,
            plan_id,
            payment,
            coupon_code,
        } = request;

        let plan = self
            .plans
            .get_plan(&plan_id)
            .await?
            .ok_or(ActivationError::PlanNotFound(plan_id))?;

        if let Some(existing) = self.find_payment_grant(payment.as_ref()).await? {
            log::info!("Payment {} already activated grant {}", existing.payment_ref, existing.id);
            return self.replay(existing, account_id, now).await;
        }

        let mut applied_coupon = None;
        let price = match &coupon_code {
            Some(code) => {
                // Reject malformed requests before the use is consumed.
                let (coupon, consume) = match self.coupons.preview(code, account_id, now).await {
                    Ok(coupon) => (coupon, true),
                    Err(CouponError::AlreadyUsedByAccount(used)) => {
                        match self.held_use(&used, account_id, payment.as_ref()).await? {
                            HeldUse::Unclaimed(coupon) => (coupon, false),
                            HeldUse::ClaimedBy(existing) => return self.replay(existing, account_id, now).await,
                        }
                    }
                    Err(e) => return Err(e.into()),
                };

                let price = plan.effective_price(Some(coupon.discount_percent));
                if price > Decimal::ZERO {
                    Self::require_proof(payment.as_ref(), price)?;
                }

                if consume {
                    match self.coupons.redeem(code, account_id, now).await {
                        Ok(_) => {}
                        // A concurrent request for this account took the use
                        // between preview and redeem.
                        Err(CouponError::AlreadyUsedByAccount(used)) => {
                            if let HeldUse::ClaimedBy(existing) =
                                self.held_use(&used, account_id, payment.as_ref()).await?
                            {
                                return self.replay(existing, account_id, now).await;
                            }
                        }
                        Err(e) => return Err(e.into()),
                    }
                }

                applied_coupon = Some(coupon.code);
                price
            }
            None => plan.effective_price(None),
        };

        let settlement = if price > Decimal::ZERO {
            let proof = Self::require_proof(payment.as_ref(), price)?;
            if !self.verifier.verify(proof, price).await? {
                log::warn!(
                    "Payment {} failed verification for account {} (amount {})",
                    proof.payment_ref,
                    account_id,
                    price
                );
                return Err(ActivationError::PaymentVerificationFailed(proof.payment_ref.clone()));
            }
            Settlement::Paid {
                order_ref: proof.order_ref.clone(),
                payment_ref: proof.payment_ref.clone(),
            }
        } else {
            Settlement::Free
        };

        let grant = Grant::new(
            account_id,
            &plan,
            GrantTerms {
                settlement,
                amount: price,
                currency: self.currency.clone(),
                coupon_code: applied_coupon,
            },
            now,
        );

        match self.ledger.append(grant).await? {
            AppendOutcome::Created(grant) => {
                log::info!(
                    "Granted plan {} to account {} (grant {}, amount {} {}, expires {:?})",
                    grant.plan_name,
                    account_id,
                    grant.id,
                    grant.amount,
                    grant.currency,
                    grant.expires_at
                );
                let entitlement = self.resolver.resolve(account_id, now).await?;
                Ok(Activation {
                    grant,
                    entitlement,
                    replayed: false,
                })
            }
            AppendOutcome::Duplicate(existing) => {
                log::info!("Concurrent delivery for {} resolved to grant {}", existing.idempotency_key, existing.id);
                self.replay(existing, account_id, now).await
            }
        }
    }

    async fn find_payment_grant(&self, payment: Option<&PaymentProof>) -> Result<Option<Grant>, ActivationError> {
        match payment {
            Some(proof) => Ok(self
                .ledger
                .find_by_idempotency_key(&Grant::payment_key(&proof.payment_ref))
                .await?),
            None => Ok(None),
        }
    }

    /// Resolves a coupon the account has already redeemed. The use is still
    /// available to this activation while no grant carries the code; once one
    /// does, only a replay of that grant's payment gets through.
    async fn held_use(
        &self,
        code: &str,
        account_id: Uuid,
        payment: Option<&PaymentProof>,
    ) -> Result<HeldUse, ActivationError> {
        let grants = self.ledger.grants_for_account(&account_id).await?;
        if !grants.iter().any(|grant| grant.coupon_code.as_deref() == Some(code)) {
            log::info!("Applying coupon {} already redeemed by account {}", code, account_id);
            return Ok(HeldUse::Unclaimed(self.coupons.get(code).await?));
        }

        match self.find_payment_grant(payment).await? {
            Some(existing) => Ok(HeldUse::ClaimedBy(existing)),
            None => Err(CouponError::AlreadyUsedByAccount(code.to_string()).into()),
        }
    }

    fn require_proof(payment: Option<&PaymentProof>, price: Decimal) -> Result<&PaymentProof, ActivationError> {
        payment.ok_or(ActivationError::PaymentProofMissing(price))
    }

    async fn replay(&self, existing: Grant, account_id: Uuid, now: DateTime<Utc>) -> Result<Activation, ActivationError> {
        if existing.account_id != account_id {
            log::warn!(
                "Account {} presented payment {} that belongs to account {}",
                account_id,
                existing.payment_ref,
                existing.account_id
            );
            return Err(ActivationError::PaymentAlreadyClaimed(existing.payment_ref));
        }

        let entitlement = self.resolver.resolve(account_id, now).await?;
        Ok(Activation {
            grant: existing,
            entitlement,
            replayed: true,
        })
    }
}
