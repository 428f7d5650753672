use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;

use crate::config::PaymentConfig;
use crate::error::VerifierError;
use crate::models::payment::PaymentProof;

type HmacSha256 = Hmac<Sha256>;

/// Boundary to the payment gateway: confirms a claimed payment is genuine and
/// was made for the expected amount.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, proof: &PaymentProof, expected_amount: Decimal) -> Result<bool, VerifierError>;
}

/// Checks the gateway's HMAC-SHA256 signature over
/// `order_ref|payment_ref|amount`, hex encoded.
#[derive(Clone)]
pub struct HmacPaymentVerifier {
    key_secret: String,
}

impl HmacPaymentVerifier {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            key_secret: config.key_secret.clone(),
        }
    }

    fn signing_payload(order_ref: &str, payment_ref: &str, amount: Decimal) -> String {
        format!("{}|{}|{:.2}", order_ref, payment_ref, amount)
    }

    fn mac(&self, order_ref: &str, payment_ref: &str, amount: Decimal) -> Result<HmacSha256, VerifierError> {
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .map_err(|e| VerifierError::Misconfigured(e.to_string()))?;
        mac.update(Self::signing_payload(order_ref, payment_ref, amount).as_bytes());
        Ok(mac)
    }

    /// Signature the gateway would produce for this payment.
    pub fn sign(&self, order_ref: &str, payment_ref: &str, amount: Decimal) -> Result<String, VerifierError> {
        let mac = self.mac(order_ref, payment_ref, amount)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentVerifier for HmacPaymentVerifier {
    async fn verify(&self, proof: &PaymentProof, expected_amount: Decimal) -> Result<bool, VerifierError> {
        if self.key_secret.is_empty() {
            return Err(VerifierError::Misconfigured("payment key secret is empty".to_string()));
        }

        let provided = match hex::decode(proof.signature.trim()) {
            Ok(bytes) => bytes,
            Err(_) => {
                log::debug!("Signature for payment {} is not valid hex", proof.payment_ref);
                return Ok(false);
            }
        };

        let mac = self.mac(&proof.order_ref, &proof.payment_ref, expected_amount)?;
        Ok(mac.verify_slice(&provided).is_ok())
    }
}
