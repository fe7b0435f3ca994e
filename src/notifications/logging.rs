use async_trait::async_trait;

use crate::{
    error::Result,
    notifications::{Notification, NotificationChannel},
};

/// Writes notifications to the log instead of delivering them. Registered
/// when no real provider is configured so development setups still show what
/// would have been sent.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn accepts(&self, _notification: &Notification) -> bool {
        true
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        match notification {
            Notification::WhatsApp(summary) => {
                tracing::info!("Would send WhatsApp to {}: {}", summary.to, summary.message());
            }
            other => {
                tracing::info!("Would send {} email to {}", other.kind(), other.recipient());
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
