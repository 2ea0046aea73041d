use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A registered account as stored in the `users` table.
///
/// Never serialized to clients: it carries the password hash and the
/// current refresh token.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    /// The single refresh token currently honoured for this user, if any.
    /// Issuing a new one overwrites it.
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether `token` is exactly the refresh token currently stored for this user.
    pub fn holds_refresh_token(&self, token: &str) -> bool {
        self.refresh_token.as_deref() == Some(token)
    }
}
