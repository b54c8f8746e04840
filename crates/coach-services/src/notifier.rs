//! Outbound notifications
//!
//! `LogNotifier` writes notifications to the log instead of delivering them.
//! `BestEffortNotifier` wraps any notifier so a delivery failure is logged and
//! never reaches the booking or cancellation that triggered it.

use async_trait::async_trait;
use coach_core::models::NotificationKind;
use coach_core::traits::Notifier;
use coach_core::AppError;
use std::sync::Arc;
use tracing::{error, info};

/// Notifier that only logs
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        kind: NotificationKind,
        recipient: &str,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        info!(%kind, recipient, %payload, "Notification (log only)");
        Ok(())
    }
}

#[derive(Clone)]
pub struct BestEffortNotifier {
    inner: Arc<dyn Notifier>,
}

impl BestEffortNotifier {
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self { inner }
    }

    /// Deliver, logging instead of returning a failure. Returns whether it went out.
    pub async fn send(&self, kind: NotificationKind, recipient: &str, payload: serde_json::Value) -> bool {
        match self.inner.notify(kind, recipient, payload).await {
            Ok(()) => true,
            Err(e) => {
                error!(%kind, recipient, error = %e, "Notification delivery failed");
                false
            }
        }
    }
}
