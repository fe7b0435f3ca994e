use chrono::{Duration, NaiveTime, Utc};
use clap::Parser;
use eventpass::{
    domain::{CreateEventRequest, CreateUserRequest, MembershipTerm, NewMembership},
    repository::{
        EventRepository, SqliteEventRepository,
        MembershipRepository, SqliteMembershipRepository,
        PlanRepository, SqlitePlanRepository,
        SqliteUserRepository, UserRepository,
    },
};
use fake::faker::address::en::CityName;
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Words;
use fake::faker::name::en::Name;
use fake::Fake;
use sqlx::sqlite::SqlitePoolOptions;

/// Seeds membership plans and, optionally, fake users and upcoming events.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "sqlite:eventpass.db?mode=rwc")]
    database_url: String,

    /// Fake users to create
    #[arg(long, default_value_t = 0)]
    users: usize,

    /// Fake events to create, one per day starting tomorrow
    #[arg(long, default_value_t = 0)]
    events: usize,

    /// Give every fake user an active membership on the cheapest plan
    #[arg(long)]
    with_memberships: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let event_repo = SqliteEventRepository::new(db_pool.clone());
    let plan_repo = SqlitePlanRepository::new(db_pool.clone());
    let membership_repo = SqliteMembershipRepository::new(db_pool.clone());

    println!("💳 Creating membership plans...");
    let created = plan_repo.seed_defaults().await?;
    println!("  ✅ {} new plans", created.len());

    let cheapest = plan_repo.list(false).await?.into_iter().next();

    if args.users > 0 {
        println!("👥 Creating {} users...", args.users);
    }
    for _ in 0..args.users {
        let user = user_repo.create(CreateUserRequest {
            email: SafeEmail().fake(),
            full_name: Some(Name().fake()),
            phone: Some(format!("98{:08}", (0..100_000_000u32).fake::<u32>())),
            city: Some(CityName().fake()),
        }).await?;

        if let (true, Some(plan)) = (args.with_memberships, cheapest.as_ref()) {
            let term = MembershipTerm::for_purchase(None, Utc::now(), plan.duration_days);
            membership_repo.activate(NewMembership {
                user_id: user.id,
                plan_id: plan.id,
                start_date: term.start,
                end_date: term.end,
                amount_paid: plan.price,
                payment_reference: None,
            }, None).await?;
        }
        println!("  ✅ {}", user.email);
    }

    if args.events > 0 {
        println!("🎟️  Creating {} events...", args.events);
    }
    let today = Utc::now().date_naive();
    for day in 1..=args.events {
        let words: Vec<String> = Words(2..4).fake();
        let event = event_repo.create(CreateEventRequest {
            title: words.join(" "),
            venue: CompanyName().fake(),
            city: CityName().fake(),
            event_date: today + Duration::days(day as i64),
            event_time: NaiveTime::from_hms_opt(19, 0, 0),
        }).await?;
        println!("  ✅ {} on {}", event.title, event.date_label());
    }

    println!("\n✨ Database seeding complete!");
    Ok(())
}
