mod common;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use eventpass::{
    domain::{Booking, BookingStatus, MembershipStatus, NewMembership, Ticket},
    error::AppError,
    repository::{
        BookingRepository, EventRepository, MembershipRepository, PlanRepository,
        SqliteBookingRepository, SqliteEventRepository, SqliteMembershipRepository,
        SqlitePlanRepository, SqliteTicketRepository, TicketRepository,
    },
};

fn new_membership(user_id: Uuid, plan_id: Uuid, days: i64) -> NewMembership {
    let start = Utc::now();
    NewMembership {
        user_id,
        plan_id,
        start_date: start,
        end_date: start + Duration::days(days),
        amount_paid: 299,
        payment_reference: Some(format!("pay_{}", Uuid::new_v4().simple())),
    }
}

fn booking_for(event_id: Uuid, seats: i32) -> Booking {
    Booking {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        event_id,
        name: "Riya".to_string(),
        email: "riya@example.com".to_string(),
        phone: "9876543210".to_string(),
        ticket_count: seats,
        amount: 500,
        status: BookingStatus::Confirmed,
        ticket_names: Some(vec!["Riya".to_string(), "Dev".to_string()]),
        booked_at: Utc::now(),
    }
}

fn ticket(booking_id: Uuid, number: &str, seat: i32) -> Ticket {
    Ticket {
        id: Uuid::new_v4(),
        booking_id,
        ticket_number: number.to_string(),
        qr_code: format!("https://qr.example/{}", number),
        holder_name: format!("Seat {}", seat),
        seat_index: seat,
        attended: false,
        attended_at: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_plans_seed_once_and_sort_by_price() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let repo = SqlitePlanRepository::new(pool.clone());

    let first = repo.seed_defaults().await?;
    assert!(!first.is_empty());
    assert!(repo.seed_defaults().await?.is_empty());

    let plans = repo.list(false).await?;
    assert_eq!(plans.len(), first.len());
    assert!(plans.windows(2).all(|w| w[0].price <= w[1].price));

    Ok(())
}

#[tokio::test]
async fn test_activate_enforces_single_active_membership() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let user = common::create_user(&pool, "Riya", "riya@example.com").await;
    let plan = common::create_plan(&pool, "Monthly", 299, 30).await;
    let repo = SqliteMembershipRepository::new(pool.clone());

    let first = repo.activate(new_membership(user.id, plan.id, 30), None).await?;
    assert_eq!(first.status, MembershipStatus::Active);

    // A second activation that does not supersede the first loses.
    let clash = repo.activate(new_membership(user.id, plan.id, 30), None).await;
    assert!(matches!(clash, Err(AppError::Conflict(_))));

    let renewal = repo.activate(new_membership(user.id, plan.id, 60), Some(first.id)).await?;
    let prior = repo.find_by_id(first.id).await?.unwrap();
    assert_eq!(prior.status, MembershipStatus::Expired);
    assert_eq!(repo.find_active_for_user(user.id).await?.map(|m| m.id), Some(renewal.id));

    // Superseding a row that is no longer active is a lost race: nothing is written.
    let stale = repo.activate(new_membership(user.id, plan.id, 90), Some(first.id)).await;
    assert!(matches!(stale, Err(AppError::Conflict(_))));
    assert_eq!(repo.list_for_user(user.id).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_payment_reference_applies_once() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let riya = common::create_user(&pool, "Riya", "riya@example.com").await;
    let dev = common::create_user(&pool, "Dev", "dev@example.com").await;
    let plan = common::create_plan(&pool, "Monthly", 299, 30).await;
    let repo = SqliteMembershipRepository::new(pool.clone());

    let mut paid = new_membership(riya.id, plan.id, 30);
    paid.payment_reference = Some("pay_shared".to_string());
    let first = repo.activate(paid.clone(), None).await?;

    let renewal = repo.activate(paid.clone(), Some(first.id)).await;
    match renewal {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Payment has already been applied"),
        other => panic!("expected conflict, got {:?}", other.map(|m| m.id)),
    }
    // The rolled-back supersede leaves the original term running.
    assert_eq!(repo.find_active_for_user(riya.id).await?.map(|m| m.id), Some(first.id));

    paid.user_id = dev.id;
    assert!(matches!(repo.activate(paid, None).await, Err(AppError::Conflict(_))));
    assert!(repo.find_active_for_user(dev.id).await?.is_none());

    let found = repo.find_by_payment_reference("pay_shared").await?.map(|m| m.id);
    assert_eq!(found, Some(first.id));
    assert!(repo.find_by_payment_reference("pay_other").await?.is_none());

    // Unpaid terms carry no reference and never collide.
    let mut free = new_membership(dev.id, plan.id, 30);
    free.payment_reference = None;
    repo.activate(free.clone(), None).await?;
    let active = repo.find_active_for_user(dev.id).await?.unwrap();
    free.payment_reference = None;
    repo.activate(free, Some(active.id)).await?;

    Ok(())
}

#[tokio::test]
async fn test_mark_expired_only_transitions_active_rows() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let user = common::create_user(&pool, "Riya", "riya@example.com").await;
    let plan = common::create_plan(&pool, "Monthly", 299, 30).await;
    let repo = SqliteMembershipRepository::new(pool.clone());

    let mut ended = new_membership(user.id, plan.id, 30);
    ended.start_date = Utc::now() - Duration::days(31);
    ended.end_date = Utc::now() - Duration::days(1);
    let membership = repo.activate(ended, None).await?;

    let due = repo.list_active_ended_before(Utc::now()).await?;
    assert_eq!(due.len(), 1);

    assert!(repo.mark_expired(membership.id).await?);
    assert!(!repo.mark_expired(membership.id).await?);
    assert!(repo.list_active_ended_before(Utc::now()).await?.is_empty());
    assert!(repo.find_active_for_user(user.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_booking_rolls_back_when_a_ticket_fails() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let event = common::create_event(&pool, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), None).await;
    let bookings = SqliteBookingRepository::new(pool.clone());
    let tickets = SqliteTicketRepository::new(pool.clone());

    let booking = booking_for(event.id, 2);
    let duplicate = vec![
        ticket(booking.id, "EP-1-1", 1),
        ticket(booking.id, "EP-1-1", 2),
    ];

    let result = bookings.create_with_tickets(booking.clone(), duplicate).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(bookings.find_by_id(booking.id).await?.is_none());
    assert!(tickets.list_for_booking(booking.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_booking_round_trips_with_tickets_in_seat_order() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let event = common::create_event(&pool, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), None).await;
    let bookings = SqliteBookingRepository::new(pool.clone());
    let tickets = SqliteTicketRepository::new(pool.clone());

    let booking = booking_for(event.id, 2);
    let issued = vec![
        ticket(booking.id, "EP-2-2", 2),
        ticket(booking.id, "EP-2-1", 1),
    ];
    let (stored, _) = bookings.create_with_tickets(booking.clone(), issued).await?;

    assert_eq!(stored.ticket_names, booking.ticket_names);
    assert_eq!(bookings.list_for_user(booking.user_id).await?.len(), 1);

    let seats: Vec<_> = tickets
        .list_for_booking(booking.id)
        .await?
        .into_iter()
        .map(|t| t.seat_index)
        .collect();
    assert_eq!(seats, vec![1, 2]);

    Ok(())
}

#[tokio::test]
async fn test_completed_events_use_start_plus_duration() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let early = common::create_event(&pool, day, NaiveTime::from_hms_opt(18, 0, 0)).await;
    let late = common::create_event(&pool, day, NaiveTime::from_hms_opt(21, 0, 0)).await;
    let untimed = common::create_event(&pool, day, None).await;
    let repo = SqliteEventRepository::new(pool.clone());

    let now = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
    let ids: Vec<_> = repo.list_completed(now, 4).await?.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![early.id]);

    let next_morning = Utc.with_ymd_and_hms(2026, 3, 2, 5, 0, 0).unwrap();
    let ids = repo.list_completed(next_morning, 4).await?;
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().any(|e| e.id == late.id));
    assert!(ids.iter().any(|e| e.id == untimed.id));

    let before = repo.list_dated_before(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()).await?;
    assert_eq!(before.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_mark_attended_is_idempotent() -> anyhow::Result<()> {
    let pool = common::test_pool().await;
    let event = common::create_event(&pool, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), None).await;
    let other = common::create_event(&pool, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), None).await;
    let bookings = SqliteBookingRepository::new(pool.clone());
    let tickets = SqliteTicketRepository::new(pool.clone());

    let booking = booking_for(event.id, 2);
    bookings
        .create_with_tickets(booking.clone(), vec![ticket(booking.id, "EP-3-1", 1), ticket(booking.id, "EP-3-2", 2)])
        .await?;
    let elsewhere = booking_for(other.id, 1);
    bookings
        .create_with_tickets(elsewhere.clone(), vec![ticket(elsewhere.id, "EP-4-1", 1)])
        .await?;

    let at = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap();
    assert_eq!(tickets.mark_attended_for_event(event.id, at).await?, 2);
    assert_eq!(tickets.mark_attended_for_event(event.id, at + Duration::hours(1)).await?, 0);

    assert_eq!(tickets.attendance_counts(event.id).await?, (2, 2));
    assert_eq!(tickets.attendance_counts(other.id).await?, (1, 0));

    let marked = tickets.list_for_booking(booking.id).await?;
    assert!(marked.iter().all(|t| t.attended && t.attended_at == Some(at)));

    Ok(())
}
