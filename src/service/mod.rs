pub mod attendance_service;
pub mod booking_service;
pub mod membership_service;

use std::sync::Arc;
use sqlx::SqlitePool;

use crate::changes::ChangeFeed;
use crate::config::Settings;
use crate::domain::TicketIssuer;
use crate::notifications::Notifier;
use crate::payments::PaymentGateway;
use crate::repository::*;

pub use attendance_service::{AttendanceService, AttendanceStats, CompletedEventsReport, EventAttendanceResult};
pub use booking_service::BookingService;
pub use membership_service::MembershipService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub event_repo: Arc<dyn EventRepository>,
    pub plan_repo: Arc<dyn PlanRepository>,
    pub membership_service: Arc<MembershipService>,
    pub booking_service: Arc<BookingService>,
    pub attendance_service: Arc<AttendanceService>,
    pub notifier: Arc<Notifier>,
    pub changes: ChangeFeed,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifier: Arc<Notifier>,
        settings: &Settings,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let event_repo: Arc<dyn EventRepository> = Arc::new(SqliteEventRepository::new(db_pool.clone()));
        let plan_repo: Arc<dyn PlanRepository> = Arc::new(SqlitePlanRepository::new(db_pool.clone()));
        let membership_repo: Arc<dyn MembershipRepository> =
            Arc::new(SqliteMembershipRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> = Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let ticket_repo: Arc<dyn TicketRepository> = Arc::new(SqliteTicketRepository::new(db_pool));

        let changes = ChangeFeed::default();

        let attendance_service = Arc::new(AttendanceService::new(
            event_repo.clone(),
            ticket_repo.clone(),
            changes.clone(),
            settings.tickets.event_duration_hours,
        ));

        let membership_service = Arc::new(MembershipService::new(
            plan_repo.clone(),
            membership_repo,
            user_repo.clone(),
            gateway,
            notifier.clone(),
            changes.clone(),
            settings.razorpay.currency.clone(),
        ));

        let booking_service = Arc::new(BookingService::new(
            booking_repo,
            ticket_repo,
            event_repo.clone(),
            attendance_service.clone(),
            TicketIssuer::new(&settings.tickets),
            notifier.clone(),
            changes.clone(),
        ));

        Self {
            user_repo,
            event_repo,
            plan_repo,
            membership_service,
            booking_service,
            attendance_service,
            notifier,
            changes,
        }
    }
}
