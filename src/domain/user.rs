use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local projection of an account owned by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name used in greetings when the profile has none.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("User")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

/// Contact block returned alongside a payment order so the checkout widget
/// can prefill the payer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDetails {
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&User> for UserDetails {
    fn from(user: &User) -> Self {
        Self {
            name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}
