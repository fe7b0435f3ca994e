use askama::Template;

use crate::error::{AppError, Result};
use crate::notifications::{
    BookingConfirmation, MembershipEmail, MembershipEmailKind, Notification, TicketEmail,
};

/// A fully rendered email, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Brand details shared by every email.
#[derive(Debug, Clone)]
pub struct Branding {
    pub brand_name: String,
    pub site_url: String,
}

#[derive(Template)]
#[template(path = "email/membership.html")]
struct MembershipHtml<'a> {
    brand: &'a Branding,
    kind: &'a str,
    user_name: &'a str,
    plan_name: &'a str,
    end_date: String,
    days_remaining: i64,
}

#[derive(Template)]
#[template(path = "email/membership.txt")]
struct MembershipText<'a> {
    brand: &'a Branding,
    kind: &'a str,
    user_name: &'a str,
    plan_name: &'a str,
    end_date: String,
    days_remaining: i64,
}

pub struct TicketLine<'a> {
    pub number: &'a str,
    pub qr_code: &'a str,
    pub holder: &'a str,
}

#[derive(Template)]
#[template(path = "email/tickets.html")]
struct TicketsHtml<'a> {
    brand: &'a Branding,
    email: &'a TicketEmail,
    tickets: Vec<TicketLine<'a>>,
}

#[derive(Template)]
#[template(path = "email/tickets.txt")]
struct TicketsText<'a> {
    brand: &'a Branding,
    email: &'a TicketEmail,
    tickets: Vec<TicketLine<'a>>,
}

#[derive(Template)]
#[template(path = "email/booking_confirmation.html")]
struct ConfirmationHtml<'a> {
    brand: &'a Branding,
    booking: &'a BookingConfirmation,
}

#[derive(Template)]
#[template(path = "email/booking_confirmation.txt")]
struct ConfirmationText<'a> {
    brand: &'a Branding,
    booking: &'a BookingConfirmation,
}

fn render_err(e: askama::Error) -> AppError {
    AppError::Internal(format!("Failed to render email: {}", e))
}

fn membership_subject(brand: &Branding, email: &MembershipEmail) -> String {
    match email.kind {
        MembershipEmailKind::Purchase => {
            format!("Welcome to {} {}!", brand.brand_name, email.plan_name)
        }
        MembershipEmailKind::Reminder => format!(
            "Your {} membership expires in {} days",
            brand.brand_name,
            email.days_remaining.unwrap_or_default()
        ),
        MembershipEmailKind::Expired => format!("Your {} membership has expired", brand.brand_name),
    }
}

fn render_membership(brand: &Branding, email: &MembershipEmail) -> Result<RenderedEmail> {
    let end_date = email.end_date.format("%B %-d, %Y").to_string();
    let days_remaining = email.days_remaining.unwrap_or_default();

    let html = MembershipHtml {
        brand,
        kind: email.kind.as_str(),
        user_name: &email.user_name,
        plan_name: &email.plan_name,
        end_date: end_date.clone(),
        days_remaining,
    }
    .render()
    .map_err(render_err)?;

    let text = MembershipText {
        brand,
        kind: email.kind.as_str(),
        user_name: &email.user_name,
        plan_name: &email.plan_name,
        end_date,
        days_remaining,
    }
    .render()
    .map_err(render_err)?;

    Ok(RenderedEmail {
        to: email.to.clone(),
        subject: membership_subject(brand, email),
        html,
        text,
    })
}

fn ticket_lines(email: &TicketEmail) -> Vec<TicketLine<'_>> {
    email
        .ticket_numbers
        .iter()
        .zip(&email.qr_codes)
        .zip(&email.holder_names)
        .map(|((number, qr_code), holder)| TicketLine {
            number: number.as_str(),
            qr_code: qr_code.as_str(),
            holder: holder.as_str(),
        })
        .collect()
}

fn render_tickets(brand: &Branding, email: &TicketEmail) -> Result<RenderedEmail> {
    let html = TicketsHtml { brand, email, tickets: ticket_lines(email) }
        .render()
        .map_err(render_err)?;
    let text = TicketsText { brand, email, tickets: ticket_lines(email) }
        .render()
        .map_err(render_err)?;

    Ok(RenderedEmail {
        to: email.to.clone(),
        subject: format!("Your tickets for {}", email.event_title),
        html,
        text,
    })
}

fn render_confirmation(brand: &Branding, booking: &BookingConfirmation) -> Result<RenderedEmail> {
    let html = ConfirmationHtml { brand, booking }.render().map_err(render_err)?;
    let text = ConfirmationText { brand, booking }.render().map_err(render_err)?;

    Ok(RenderedEmail {
        to: booking.to.clone(),
        subject: format!("Your Booking Confirmation for {}", booking.event_title),
        html,
        text,
    })
}

/// Renders the email form of a notification. `None` for non-email
/// notifications.
pub fn render_email(brand: &Branding, notification: &Notification) -> Result<Option<RenderedEmail>> {
    match notification {
        Notification::Membership(email) => render_membership(brand, email).map(Some),
        Notification::Tickets(email) => render_tickets(brand, email).map(Some),
        Notification::BookingConfirmation(booking) => render_confirmation(brand, booking).map(Some),
        Notification::WhatsApp(_) => Ok(None),
    }
}
