#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use eventpass::{
    config::Settings,
    domain::{CreateEventRequest, CreatePlanRequest, CreateUserRequest, Event, GatewayOrder, MembershipPlan, OrderRequest, User},
    error::Result,
    notifications::{Notification, NotificationChannel, Notifier, RetryPolicy},
    payments::{verify_payment_signature, PaymentGateway},
    repository::{
        EventRepository, PlanRepository, SqliteEventRepository, SqlitePlanRepository,
        SqliteUserRepository, UserRepository,
    },
    service::ServiceContext,
};

pub const GATEWAY_SECRET: &str = "integration_secret";
pub const ADMIN_TOKEN: &str = "admin-secret";

/// A single-connection in-memory database; every connection to
/// `sqlite::memory:` would otherwise get its own empty database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    pool
}

pub async fn create_user(pool: &SqlitePool, name: &str, email: &str) -> User {
    SqliteUserRepository::new(pool.clone())
        .create(CreateUserRequest {
            email: email.to_string(),
            full_name: Some(name.to_string()),
            phone: Some("9876543210".to_string()),
            city: Some("Pune".to_string()),
        })
        .await
        .expect("user")
}

pub async fn create_plan(pool: &SqlitePool, name: &str, price: i64, duration_days: i32) -> MembershipPlan {
    SqlitePlanRepository::new(pool.clone())
        .create(CreatePlanRequest {
            name: name.to_string(),
            description: String::new(),
            price,
            duration_days,
        })
        .await
        .expect("plan")
}

pub async fn create_event(pool: &SqlitePool, date: NaiveDate, time: Option<NaiveTime>) -> Event {
    SqliteEventRepository::new(pool.clone())
        .create(CreateEventRequest {
            title: "Open Mic".to_string(),
            venue: "The Loft".to_string(),
            city: "Pune".to_string(),
            event_date: date,
            event_time: time,
        })
        .await
        .expect("event")
}

/// Gateway double: orders are numbered locally and signatures are checked
/// with the real verification routine under a fixed secret.
#[derive(Default)]
pub struct StubGateway {
    pub orders: Mutex<Vec<OrderRequest>>,
}

impl StubGateway {
    pub fn sign(order_id: &str, payment_id: &str) -> String {
        use hmac::{Hmac, Mac};
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(GATEWAY_SECRET.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn key_id(&self) -> &str {
        "rzp_test_integration"
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
        verify_payment_signature(GATEWAY_SECRET, order_id, payment_id, signature)
    }
}

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct Inbox {
    pub received: Mutex<Vec<Notification>>,
}

impl Inbox {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.received.lock().unwrap().iter().map(|n| n.kind()).collect()
    }
}

#[async_trait]
impl NotificationChannel for Inbox {
    fn name(&self) -> &str {
        "inbox"
    }

    fn accepts(&self, _notification: &Notification) -> bool {
        true
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.received.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub pool: SqlitePool,
    pub settings: Settings,
    pub context: Arc<ServiceContext>,
    pub inbox: Arc<Inbox>,
}

pub async fn test_app() -> TestApp {
    let pool = test_pool().await;

    let mut settings = Settings::default();
    settings.admin.api_token = Some(ADMIN_TOKEN.to_string());
    settings.razorpay.enabled = true;

    let notifier = Arc::new(Notifier::new(
        RetryPolicy {
            max_attempts: 1,
            base_backoff: std::time::Duration::from_millis(1),
        },
        64,
    ));
    let inbox = Arc::new(Inbox::default());
    notifier.register(inbox.clone()).await;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(StubGateway::default());
    let context = Arc::new(ServiceContext::new(pool.clone(), Some(gateway), notifier, &settings));

    TestApp {
        pool,
        settings,
        context,
        inbox,
    }
}
