use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub razorpay: RazorpayConfig,
    #[serde(default)]
    pub tickets: TicketConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub sweeps: SweepConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RazorpayConfig {
    #[serde(default)]
    pub enabled: bool,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    #[serde(default = "default_razorpay_api_base")]
    pub api_base: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for RazorpayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key_id: None,
            key_secret: None,
            api_base: default_razorpay_api_base(),
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TicketConfig {
    #[serde(default = "default_ticket_prefix")]
    pub number_prefix: String,
    #[serde(default = "default_qr_base_url")]
    pub qr_base_url: String,
    /// How long after its scheduled start an event counts as over.
    #[serde(default = "default_event_duration_hours")]
    pub event_duration_hours: i64,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            number_prefix: default_ticket_prefix(),
            qr_base_url: default_qr_base_url(),
            event_duration_hours: default_event_duration_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_brand_name")]
    pub brand_name: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    pub email: Option<SmtpConfig>,
    pub whatsapp: Option<WhatsAppConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            brand_name: default_brand_name(),
            site_url: default_site_url(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            queue_capacity: default_queue_capacity(),
            email: None,
            whatsapp: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweepConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_membership_interval")]
    pub membership_interval_secs: u64,
    #[serde(default = "default_attendance_interval")]
    pub attendance_interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            membership_interval_secs: default_membership_interval(),
            attendance_interval_secs: default_attendance_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    pub api_token: Option<String>,
}

fn default_razorpay_api_base() -> String {
    "https://api.razorpay.com/v1".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_ticket_prefix() -> String {
    "EP".to_string()
}

fn default_qr_base_url() -> String {
    "https://api.qrserver.com/v1/create-qr-code/?size=150x150&data=".to_string()
}

fn default_event_duration_hours() -> i64 {
    4
}

fn default_brand_name() -> String {
    "EventPass".to_string()
}

fn default_site_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    256
}

fn default_smtp_port() -> u16 {
    587
}

// Reminders are edge-triggered on the 3-day boundary, so this must stay
// well under a day or reminders get skipped.
fn default_membership_interval() -> u64 {
    3600
}

fn default_attendance_interval() -> u64 {
    900
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://eventpass.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("razorpay.enabled", false)?
            .set_default("sweeps.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with EVENTPASS__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("EVENTPASS").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://eventpass.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            razorpay: RazorpayConfig::default(),
            tickets: TicketConfig::default(),
            notifications: NotificationConfig::default(),
            sweeps: SweepConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}
