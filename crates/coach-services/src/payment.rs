//! Mock payment gateway for development and testing
//!
//! Simulates a gateway round trip and answers every charge and refund with a
//! generated transaction reference, unless configured to decline charges.

use async_trait::async_trait;
use coach_core::config::PaymentConfig;
use coach_core::traits::{PaymentGateway, PaymentOutcome};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const MOCK_METHOD: &str = "mock_payment";

#[derive(Debug, Clone)]
pub struct MockPaymentGateway {
    latency: Duration,
    decline_all: bool,
}

impl MockPaymentGateway {
    pub fn new(latency: Duration, decline_all: bool) -> Self {
        Self {
            latency,
            decline_all,
        }
    }

    pub fn from_config(config: &PaymentConfig) -> Self {
        Self::new(
            Duration::from_millis(config.simulated_latency_ms),
            config.decline_all,
        )
    }

    fn reference(prefix: &str) -> String {
        let id = Uuid::new_v4().simple().to_string().to_uppercase();
        format!("{}{}", prefix, &id[..16])
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::from_config(&PaymentConfig::default())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn method(&self) -> &str {
        MOCK_METHOD
    }

    async fn charge(&self, amount: Decimal, reference: &str) -> PaymentOutcome {
        self.round_trip().await;

        if self.decline_all {
            warn!(reference, %amount, "Mock charge declined");
            return PaymentOutcome::Failure {
                reason: "card declined".to_string(),
            };
        }

        let transaction_ref = Self::reference("TXN");
        info!(reference, %amount, transaction_ref = %transaction_ref, "Mock charge processed");
        PaymentOutcome::Success { transaction_ref }
    }

    async fn refund(&self, amount: Decimal, reference: &str) -> PaymentOutcome {
        self.round_trip().await;

        let transaction_ref = Self::reference("RFD");
        info!(reference, %amount, transaction_ref = %transaction_ref, "Mock refund processed");
        PaymentOutcome::Success { transaction_ref }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_charge_and_refund_references() {
        let gateway = MockPaymentGateway::new(Duration::ZERO, false);

        match gateway.charge(dec!(800), "CB1").await {
            PaymentOutcome::Success { transaction_ref } => {
                assert!(transaction_ref.starts_with("TXN"));
                assert_eq!(transaction_ref.len(), 19);
            }
            other => panic!("unexpected {:?}", other),
        }

        match gateway.refund(dec!(720), "CB1").await {
            PaymentOutcome::Success { transaction_ref } => assert!(transaction_ref.starts_with("RFD")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decline_all() {
        let gateway = MockPaymentGateway::new(Duration::ZERO, true);
        assert!(!gateway.charge(dec!(400), "CB2").await.is_success());
        // Refunds still go through
        assert!(gateway.refund(dec!(360), "CB2").await.is_success());
    }
}
