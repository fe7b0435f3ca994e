use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    changes::{ChangeEvent, ChangeFeed, ChangeKind},
    domain::*,
    error::{AppError, Result},
    notifications::{MembershipEmail, MembershipEmailKind, Notification, Notifier},
    payments::PaymentGateway,
    repository::{MembershipRepository, PlanRepository, UserRepository},
};

pub struct MembershipService {
    plan_repo: Arc<dyn PlanRepository>,
    membership_repo: Arc<dyn MembershipRepository>,
    user_repo: Arc<dyn UserRepository>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    notifier: Arc<Notifier>,
    changes: ChangeFeed,
    currency: String,
}

impl MembershipService {
    pub fn new(
        plan_repo: Arc<dyn PlanRepository>,
        membership_repo: Arc<dyn MembershipRepository>,
        user_repo: Arc<dyn UserRepository>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifier: Arc<Notifier>,
        changes: ChangeFeed,
        currency: String,
    ) -> Self {
        Self {
            plan_repo,
            membership_repo,
            user_repo,
            gateway,
            notifier,
            changes,
            currency,
        }
    }

    /// Whether a payment gateway is wired in.
    pub fn payments_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Payments are not configured".to_string()))
    }

    async fn load_plan(&self, plan_id: Uuid) -> Result<MembershipPlan> {
        self.plan_repo
            .find_by_id(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))
    }

    /// A plan that can still be sold.
    async fn find_plan(&self, plan_id: Uuid) -> Result<MembershipPlan> {
        let plan = self.load_plan(plan_id).await?;
        if !plan.is_active {
            return Err(AppError::BadRequest("Plan is no longer available".to_string()));
        }
        Ok(plan)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<User> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn list_plans(&self) -> Result<Vec<MembershipPlan>> {
        self.plan_repo.list(false).await
    }

    pub async fn current_membership(&self, user_id: Uuid) -> Result<Option<MembershipView>> {
        self.current_membership_at(user_id, Utc::now()).await
    }

    pub async fn current_membership_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Option<MembershipView>> {
        let Some(membership) = self.membership_repo.find_active_for_user(user_id).await? else {
            return Ok(None);
        };
        let plan = self.plan_repo.find_by_id(membership.plan_id).await?;
        Ok(Some(MembershipView::new(membership, plan, now)))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserMembership>> {
        self.membership_repo.list_for_user(user_id).await
    }

    /// Opens a gateway order for the plan. Nothing is stored locally until
    /// the payment is verified.
    pub async fn create_order(&self, plan_id: Uuid, user_id: Uuid) -> Result<MembershipOrder> {
        let gateway = self.gateway()?;
        let plan = self.find_plan(plan_id).await?;
        let user = self.find_user(user_id).await?;

        let mut notes = HashMap::new();
        notes.insert("plan_id".to_string(), plan.id.to_string());
        notes.insert("user_id".to_string(), user.id.to_string());
        notes.insert("plan_name".to_string(), plan.name.clone());

        let order = gateway
            .create_order(OrderRequest {
                amount: plan.price_minor_units(),
                currency: self.currency.clone(),
                receipt: membership_receipt(plan.id, user.id, Utc::now().timestamp_millis()),
                notes,
            })
            .await?;

        Ok(MembershipOrder {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: gateway.key_id().to_string(),
            user: UserDetails::from(&user),
            plan,
        })
    }

    pub async fn purchase(&self, user_id: Uuid, plan_id: Uuid, payment_reference: Option<String>) -> Result<UserMembership> {
        self.purchase_at(user_id, plan_id, payment_reference, Utc::now()).await
    }

    /// Activates a new term of `plan` for the user. A term bought while the
    /// current one is still running starts when it ends.
    pub async fn purchase_at(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<UserMembership> {
        let plan = self.find_plan(plan_id).await?;
        self.activate_plan(user_id, plan, payment_reference, now).await
    }

    async fn activate_plan(
        &self,
        user_id: Uuid,
        plan: MembershipPlan,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<UserMembership> {
        let user = self.find_user(user_id).await?;

        let current = self.membership_repo.find_active_for_user(user_id).await?;
        let term = MembershipTerm::for_purchase(current.as_ref().map(|m| m.end_date), now, plan.duration_days);

        let membership = self
            .membership_repo
            .activate(
                NewMembership {
                    user_id,
                    plan_id: plan.id,
                    start_date: term.start,
                    end_date: term.end,
                    amount_paid: plan.price,
                    payment_reference,
                },
                current.as_ref().map(|m| m.id),
            )
            .await?;

        tracing::info!(
            "Activated {} membership {} for user {} until {}",
            plan.name,
            membership.id,
            user_id,
            membership.end_date
        );

        if let Some(prior) = &current {
            self.changes
                .publish(ChangeEvent::membership(ChangeKind::Updated, prior.id, user_id));
        }
        self.changes
            .publish(ChangeEvent::membership(ChangeKind::Inserted, membership.id, user_id));

        self.notifier
            .dispatch(Notification::Membership(MembershipEmail {
                kind: MembershipEmailKind::Purchase,
                to: user.email.clone(),
                user_name: user.display_name().to_string(),
                plan_name: plan.name.clone(),
                end_date: membership.end_date,
                days_remaining: None,
            }))
            .await;

        Ok(membership)
    }

    pub async fn verify_and_activate(
        &self,
        callback: PaymentCallback,
        plan_id: Uuid,
        user_id: Uuid,
    ) -> Result<UserMembership> {
        self.verify_and_activate_at(callback, plan_id, user_id, Utc::now()).await
    }

    /// Checks the checkout signature before touching anything; a mismatch
    /// fails with `InvalidSignature` and writes nothing. A payment already
    /// applied to a membership is a `Conflict`. The plan only has to exist:
    /// a customer who paid before it was retired still gets the term.
    pub async fn verify_and_activate_at(
        &self,
        callback: PaymentCallback,
        plan_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<UserMembership> {
        let gateway = self.gateway()?;

        if !gateway.verify_signature(&callback.order_id, &callback.payment_id, &callback.signature) {
            tracing::warn!(
                "Rejected payment {} for order {}: signature mismatch",
                callback.payment_id,
                callback.order_id
            );
            return Err(AppError::InvalidSignature);
        }

        if self
            .membership_repo
            .find_by_payment_reference(&callback.payment_id)
            .await?
            .is_some()
        {
            tracing::warn!("Payment {} was already applied", callback.payment_id);
            return Err(AppError::Conflict("Payment has already been applied".to_string()));
        }

        let plan = self.load_plan(plan_id).await?;
        if !plan.is_active {
            tracing::info!(
                "Honouring payment {} for retired plan {}",
                callback.payment_id,
                plan.name
            );
        }

        self.activate_plan(user_id, plan, Some(callback.payment_id), now).await
    }

    pub async fn sweep_expirations(&self) -> Result<SweepReport> {
        self.sweep_expirations_at(Utc::now()).await
    }

    /// Sends reminders for memberships exactly `REMINDER_DAYS_BEFORE` days
    /// from their end and expires the ones that have ended. Safe to rerun.
    pub async fn sweep_expirations_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let ending = self
            .membership_repo
            .list_active_ending_between(now, now + Duration::days(REMINDER_DAYS_BEFORE))
            .await?;

        for membership in ending.iter().filter(|m| reminder_due(m.end_date, now)) {
            let days = days_remaining(membership.end_date, now);
            if let Some(email) = self
                .membership_email(membership, MembershipEmailKind::Reminder, Some(days))
                .await
            {
                self.notifier.dispatch(Notification::Membership(email)).await;
                report.reminders_sent += 1;
            }
        }

        let ended = self.membership_repo.list_active_ended_before(now).await?;

        for membership in ended {
            match self.membership_repo.mark_expired(membership.id).await {
                Ok(true) => {
                    report.expired += 1;
                    tracing::info!("Expired membership {} for user {}", membership.id, membership.user_id);
                    self.changes.publish(ChangeEvent::membership(
                        ChangeKind::Updated,
                        membership.id,
                        membership.user_id,
                    ));
                    if let Some(email) = self
                        .membership_email(&membership, MembershipEmailKind::Expired, None)
                        .await
                    {
                        self.notifier.dispatch(Notification::Membership(email)).await;
                    }
                }
                Ok(false) => {
                    tracing::debug!("Membership {} was already expired", membership.id);
                }
                Err(e) => {
                    tracing::warn!("Failed to expire membership {}: {}", membership.id, e);
                }
            }
        }

        if report.reminders_sent > 0 || report.expired > 0 {
            tracing::info!(
                "Membership sweep: {} reminders, {} expired",
                report.reminders_sent,
                report.expired
            );
        }

        Ok(report)
    }

    async fn membership_email(
        &self,
        membership: &UserMembership,
        kind: MembershipEmailKind,
        days_remaining: Option<i64>,
    ) -> Option<MembershipEmail> {
        let user = match self.user_repo.find_by_id(membership.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!("No user {} for membership {}", membership.user_id, membership.id);
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to load user {}: {}", membership.user_id, e);
                return None;
            }
        };

        let plan_name = match self.plan_repo.find_by_id(membership.plan_id).await {
            Ok(Some(plan)) => plan.name,
            _ => "Membership".to_string(),
        };

        Some(MembershipEmail {
            kind,
            to: user.email.clone(),
            user_name: user.display_name().to_string(),
            plan_name,
            end_date: membership.end_date,
            days_remaining,
        })
    }
}
