use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::store::UserStore;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
/// Lifetime of a refresh token.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Claims carried by both access and refresh tokens. The two kinds are told apart
/// by the secret they are signed with.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    pub iss: String,
    /// Unique per issuance.
    pub jti: String,
}

/// Why a token failed verification. Expiry is kept apart from every other failure
/// because an expired access token can still be healed with a refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token expired"),
            TokenError::Invalid => write!(f, "token invalid"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn ttl(self) -> Duration {
        match self {
            TokenKind::Access => Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            TokenKind::Refresh => Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Result of redeeming a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refreshed {
    pub user_id: i32,
    pub access_token: String,
}

/// Issues and verifies access and refresh tokens (HS256).
#[derive(Clone)]
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.refresh_token_secret,
            config.jwt_issuer.clone(),
        )
    }

    /// Issues a 15-minute access token for `user_id`.
    pub fn issue_access_token(&self, user_id: i32) -> Result<String, AppError> {
        self.issue_access_token_at(user_id, Utc::now())
    }

    /// Issues an access token as if it had been minted at `issued_at`.
    pub fn issue_access_token_at(
        &self,
        user_id: i32,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.sign(TokenKind::Access, user_id, issued_at)
    }

    /// Issues a 7-day refresh token for `user_id`.
    ///
    /// The caller must persist it with [`UserStore::set_refresh_token`] before handing
    /// it to the client; an unpersisted refresh token can never be redeemed.
    pub fn issue_refresh_token(&self, user_id: i32) -> Result<String, AppError> {
        self.sign(TokenKind::Refresh, user_id, Utc::now())
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Access, token)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Refresh, token)
    }

    /// Exchanges a stored refresh token for a fresh access token.
    ///
    /// The token must be the value currently stored for some user, verify against the
    /// refresh secret, and name that same user. The refresh token itself is left in
    /// place: redemption does not rotate it.
    pub async fn redeem_refresh_token(
        &self,
        users: &dyn UserStore,
        token: &str,
    ) -> Result<Refreshed, AppError> {
        let invalid = || AppError::Forbidden("Invalid refresh token".into());

        let user = users.find_by_refresh_token(token).await?.ok_or_else(|| {
            log::warn!("refresh token does not match any stored token");
            invalid()
        })?;

        let claims = self.verify_refresh_token(token).map_err(|e| {
            log::warn!("stored refresh token for user {} rejected: {}", user.id, e);
            invalid()
        })?;

        if claims.user_id != user.id {
            log::warn!(
                "refresh token subject {} does not match owning user {}",
                claims.user_id,
                user.id
            );
            return Err(invalid());
        }

        let access_token = self.issue_access_token(claims.user_id)?;
        Ok(Refreshed {
            user_id: claims.user_id,
            access_token,
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign(&self, kind: TokenKind, user_id: i32, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            user_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + kind.ttl()).timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let decoding = &self.keys(kind).decoding;
        let rejected = |e: jsonwebtoken::errors::Error| {
            log::debug!("{:?} token rejected: {}", kind, e);
            TokenError::Invalid
        };

        match decode::<Claims>(token, decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                // `exp` is checked before `iss`: only an otherwise valid token counts as expired.
                let mut ignoring_expiry = validation;
                ignoring_expiry.validate_exp = false;
                match decode::<Claims>(token, decoding, &ignoring_expiry) {
                    Ok(_) => Err(TokenError::Expired),
                    Err(e) => Err(rejected(e)),
                }
            }
            Err(e) => Err(rejected(e)),
        }
    }
}
