pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::non_blank;

pub use extractors::AuthenticatedUserId;
pub use middleware::{admit, AccessGuard, Admission, REFRESH_TOKEN_COOKIE};
pub use password::{hash_password, verify_password};
pub use token::{Claims, Refreshed, TokenError, TokenService};

lazy_static! {
    // Letters, digits, underscores, dots and hyphens.
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_.-]+$").unwrap();
}

/// Payload for `POST /register`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(max = 64),
        regex(
            path = "USERNAME_REGEX",
            message = "Username may only contain letters, digits, underscores, dots or hyphens"
        )
    )]
    pub username: String,
    #[validate(length(max = 128), custom = "non_blank")]
    pub password: String,
}

/// Payload for `POST /login`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom = "non_blank")]
    pub username: String,
    #[validate(custom = "non_blank")]
    pub password: String,
}

/// Payload for `POST /refresh-token`. When absent, the refresh cookie is used.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Issued on a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Short-lived access token for the `Authorization: Bearer` header.
    pub token: String,
    /// Long-lived token to exchange for new access tokens.
    pub refresh_token: String,
}

/// Issued on a successful refresh-token exchange.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}
