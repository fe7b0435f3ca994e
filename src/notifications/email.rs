use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::{NotificationConfig, SmtpConfig},
    error::{AppError, Result},
    notifications::{
        render::{render_email, Branding, RenderedEmail},
        Notification, NotificationChannel,
    },
};

/// Sends every email notification over SMTP (STARTTLS).
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    branding: Branding,
}

impl EmailChannel {
    pub fn new(config: &NotificationConfig) -> Result<Option<Self>> {
        let smtp = match &config.email {
            Some(smtp) if smtp.enabled => smtp,
            _ => return Ok(None),
        };

        Ok(Some(Self {
            transport: build_transport(smtp)?,
            from: smtp.from_address.parse().map_err(|e| {
                AppError::BadRequest(format!("Invalid from address {}: {}", smtp.from_address, e))
            })?,
            branding: Branding {
                brand_name: config.brand_name.clone(),
                site_url: config.site_url.trim_end_matches('/').to_string(),
            },
        }))
    }

    /// `None` when the recipient is not a valid address; resending cannot fix that.
    fn build_message(&self, email: RenderedEmail) -> Result<Option<Message>> {
        let to: Mailbox = match email.to.parse() {
            Ok(to) => to,
            Err(e) => {
                tracing::warn!("Dropping email \"{}\": invalid recipient {}: {}", email.subject, email.to, e);
                return Ok(None);
            }
        };

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map(Some)
            .map_err(|e| AppError::Notification(format!("Failed to build email: {}", e)))
    }
}

fn build_transport(smtp: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let credentials = Credentials::new(smtp.username.clone(), smtp.password.clone());

    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        .map_err(|e| AppError::Notification(format!("Invalid SMTP host {}: {}", smtp.host, e)))?
        .port(smtp.port)
        .credentials(credentials)
        .build();

    Ok(transport)
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn accepts(&self, notification: &Notification) -> bool {
        notification.is_email()
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let Some(rendered) = render_email(&self.branding, notification)? else {
            return Ok(());
        };
        let Some(message) = self.build_message(rendered)? else {
            return Ok(());
        };

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Notification(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::Notification("SMTP server refused connection".to_string())),
            Err(e) => Err(AppError::Notification(format!("SMTP connection failed: {}", e))),
        }
    }
}
