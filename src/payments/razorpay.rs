use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{
    config::RazorpayConfig,
    domain::{GatewayOrder, OrderRequest},
    error::{AppError, Result},
    payments::PaymentGateway,
};

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 of `payload` under `secret`.
pub(crate) fn sign_payload(secret: &str, payload: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a checkout callback signature: hex HMAC-SHA256 of
/// `"<order_id>|<payment_id>"` keyed with the account secret. Only the exact
/// lowercase digest is accepted.
pub fn verify_payment_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = sign_payload(secret, &format!("{}|{}", order_id, payment_id));

    if expected.is_empty() || expected.len() != signature.len() {
        return false;
    }
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

pub struct RazorpayClient {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(key_id: String, key_secret: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        }
    }

    /// Builds a client when the gateway is enabled and fully configured.
    pub fn from_config(config: &RazorpayConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        match (config.key_id.clone(), config.key_secret.clone()) {
            (Some(key_id), Some(key_secret)) => Some(Self::new(key_id, key_secret, config.api_base.clone())),
            _ => {
                tracing::warn!("Razorpay enabled but key_id or key_secret missing");
                None
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder> {
        let response = self
            .http
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Razorpay error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Razorpay order creation failed: {} {}", status, body);
            return Err(AppError::External(format!("Razorpay returned {}", status)));
        }

        let order: GatewayOrder = response.json().await?;
        tracing::info!("Created Razorpay order {} for {} {}", order.id, order.amount, order.currency);
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_accepts_matching_hmac() {
        // HMAC-SHA256(key "s", "o1|p1"), lowercase hex
        let expected = "a23a35a9cc17304682813499f610ed21e20e5e98e04bc2fbe9a198a68b058546";
        assert_eq!(sign_payload("s", "o1|p1"), expected);
        assert!(verify_payment_signature("s", "o1", "p1", expected));
    }

    #[test]
    fn test_signature_requires_exact_hex() {
        let expected = "a23a35a9cc17304682813499f610ed21e20e5e98e04bc2fbe9a198a68b058546";
        assert!(!verify_payment_signature("s", "o1", "p1", &expected.to_uppercase()));
        assert!(!verify_payment_signature("s", "o1", "p1", &format!(" {} ", expected)));
        assert!(!verify_payment_signature("s", "o1", "p1", &format!("{}\n", expected)));
        assert!(!verify_payment_signature("s", "p1", "o1", expected));
    }

    #[test]
    fn test_signature_rejects_tampering() {
        let signature = sign_payload("s", "o1|p1");
        assert!(!verify_payment_signature("s", "o1", "p2", &signature));
        assert!(!verify_payment_signature("other", "o1", "p1", &signature));
        assert!(!verify_payment_signature("s", "o1", "p1", &signature[..63]));
        assert!(!verify_payment_signature("s", "o1", "p1", ""));
    }

    #[test]
    fn test_from_config_requires_keys() {
        let mut config = RazorpayConfig {
            enabled: true,
            ..RazorpayConfig::default()
        };
        assert!(RazorpayClient::from_config(&config).is_none());

        config.key_id = Some("rzp_test".to_string());
        config.key_secret = Some("secret".to_string());
        assert!(RazorpayClient::from_config(&config).is_some());

        config.enabled = false;
        assert!(RazorpayClient::from_config(&config).is_none());
    }
}
