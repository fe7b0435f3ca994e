pub mod razorpay;

use async_trait::async_trait;

use crate::domain::{GatewayOrder, OrderRequest};
use crate::error::Result;

pub use razorpay::{verify_payment_signature, RazorpayClient};

/// The slice of a payment gateway the membership flow needs.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key the checkout widget is opened with.
    fn key_id(&self) -> &str;
    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder>;
    /// True when `signature` authenticates `order_id|payment_id`.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;

    use super::*;

    pub const FAKE_SECRET: &str = "test_secret";

    /// Records orders and verifies signatures with a fixed secret.
    #[derive(Default)]
    pub struct FakePaymentGateway {
        pub orders: Mutex<Vec<OrderRequest>>,
    }

    impl FakePaymentGateway {
        pub fn sign(order_id: &str, payment_id: &str) -> String {
            razorpay::sign_payload(FAKE_SECRET, &format!("{}|{}", order_id, payment_id))
        }
    }

    #[async_trait]
    impl PaymentGateway for FakePaymentGateway {
        fn key_id(&self) -> &str {
            "rzp_test_key"
        }

        async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder> {
            let mut orders = self.orders.lock().unwrap();
            let order = GatewayOrder {
                id: format!("order_{}", orders.len() + 1),
                amount: request.amount,
                currency: request.currency.clone(),
                receipt: Some(request.receipt.clone()),
            };
            orders.push(request);
            Ok(order)
        }

        fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
            verify_payment_signature(FAKE_SECRET, order_id, payment_id, signature)
        }
    }
}
