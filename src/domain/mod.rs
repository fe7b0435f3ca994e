pub mod user;
pub mod event;
pub mod plan;
pub mod membership;
pub mod booking;
pub mod ticket;
pub mod payment;

pub use user::*;
pub use event::*;
pub use plan::*;
pub use membership::*;
pub use booking::*;
pub use ticket::*;
pub use payment::*;
