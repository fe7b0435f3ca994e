pub mod admin;
pub mod attendance;
pub mod bookings;
pub mod memberships;
pub mod plans;
pub mod root;
