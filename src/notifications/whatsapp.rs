use async_trait::async_trait;
use serde_json::json;

use crate::{
    config::WhatsAppConfig,
    error::{AppError, Result},
    notifications::{Notification, NotificationChannel},
};

/// Posts booking summaries to a WhatsApp Business-style messages endpoint.
pub struct WhatsAppChannel {
    http: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppChannel {
    pub fn new(config: Option<WhatsAppConfig>) -> Option<Self> {
        config.and_then(|cfg| {
            if cfg.enabled {
                Some(Self {
                    http: reqwest::Client::new(),
                    config: cfg,
                })
            } else {
                None
            }
        })
    }
}

/// Digits only, as the messages API expects.
fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn accepts(&self, notification: &Notification) -> bool {
        matches!(notification, Notification::WhatsApp(_))
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let Notification::WhatsApp(summary) = notification else {
            return Ok(());
        };

        let to = normalize_phone(&summary.to);
        if to.is_empty() {
            return Err(AppError::Notification(format!("Invalid phone number: {}", summary.to)));
        }

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": summary.message() },
            }))
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("WhatsApp request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "WhatsApp API returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        if self.config.api_token.is_empty() {
            return Err(AppError::Notification("WhatsApp API token not configured".to_string()));
        }
        if reqwest::Url::parse(&self.config.api_url).is_err() {
            return Err(AppError::Notification(format!(
                "Invalid WhatsApp API URL: {}",
                self.config.api_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+91 98765-43210"), "919876543210");
        assert_eq!(normalize_phone("n/a"), "");
    }

    #[test]
    fn test_disabled_config_builds_nothing() {
        let config = WhatsAppConfig {
            enabled: false,
            api_url: "https://graph.example/messages".to_string(),
            api_token: "token".to_string(),
        };
        assert!(WhatsAppChannel::new(Some(config)).is_none());
        assert!(WhatsAppChannel::new(None).is_none());
    }
}
