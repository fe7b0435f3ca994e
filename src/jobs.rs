//! Periodic sweeps run alongside the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SweepConfig;
use crate::service::ServiceContext;

/// Spawns the membership and attendance sweeps. A failed run is logged and
/// the next tick tries again.
pub fn spawn_sweeps(context: Arc<ServiceContext>, config: &SweepConfig) -> Vec<JoinHandle<()>> {
    let memberships = {
        let context = context.clone();
        let period = Duration::from_secs(config.membership_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match context.membership_service.sweep_expirations().await {
                    Ok(report) => tracing::debug!(
                        "Membership sweep finished: {} reminders, {} expired",
                        report.reminders_sent,
                        report.expired
                    ),
                    Err(e) => tracing::error!("Membership sweep failed: {}", e),
                }
            }
        })
    };

    let attendance = {
        let period = Duration::from_secs(config.attendance_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let report = context.attendance_service.process_completed_events().await;
                if !report.success {
                    tracing::error!("Attendance sweep could not list completed events");
                }
            }
        })
    };

    tracing::info!(
        "Background sweeps started (memberships every {}s, attendance every {}s)",
        config.membership_interval_secs,
        config.attendance_interval_secs
    );

    vec![memberships, attendance]
}
