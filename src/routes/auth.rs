use crate::{
    auth::{
        hash_password, token::REFRESH_TOKEN_TTL_DAYS, verify_password, AuthResponse,
        AuthenticatedUserId, LoginRequest, RefreshResponse, RefreshTokenRequest, RegisterRequest,
        REFRESH_TOKEN_COOKIE,
    },
    error::AppError,
    state::AppState,
};
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

fn authentication_failed() -> AppError {
    AppError::Unauthorized("Authentication failed".into())
}

/// Register a new user
///
/// Creates the account; the client logs in separately to obtain tokens.
///
/// ## Responses:
/// - `201 Created`: `{"message": ...}`
/// - `400 Bad Request`: blank or malformed username/password.
/// - `409 Conflict`: the username is taken.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    if state
        .users
        .find_by_username(&register_data.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(&register_data.password, state.bcrypt_cost).await?;
    let user = state
        .users
        .create_user(&register_data.username, &password_hash)
        .await?;
    log::info!("registered user {} ({})", user.id, user.username);

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully"
    })))
}

/// Login user
///
/// Verifies the credentials, then issues an access token and a refresh token.
/// The refresh token replaces any previously stored one, is returned in the body,
/// and is also set as an HttpOnly cookie for the access guard's refresh path.
///
/// ## Responses:
/// - `200 OK`: `{"token": ..., "refresh_token": ...}`
/// - `401 Unauthorized`: unknown user or wrong password.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let user = state
        .users
        .find_by_username(&login_data.username)
        .await?
        .ok_or_else(authentication_failed)?;

    if !verify_password(&login_data.password, &user.password_hash).await? {
        log::info!("failed login for user {}", user.id);
        return Err(authentication_failed());
    }

    let token = state.tokens.issue_access_token(user.id)?;
    let refresh = state.tokens.issue_refresh_token(user.id)?;
    // Persist before responding: an unstored refresh token can never be redeemed.
    state
        .users
        .set_refresh_token(user.id, &refresh)
        .await?;

    let cookie = Cookie::build(REFRESH_TOKEN_COOKIE, refresh.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::days(REFRESH_TOKEN_TTL_DAYS))
        .finish();

    Ok(HttpResponse::Ok().cookie(cookie).json(AuthResponse {
        token,
        refresh_token: refresh,
    }))
}

/// Exchange a refresh token for a new access token
///
/// Reads `refresh_token` from the JSON body, falling back to the refresh cookie.
/// The refresh token itself is not rotated.
///
/// ## Responses:
/// - `200 OK`: `{"token": ...}`
/// - `401 Unauthorized`: no refresh token supplied.
/// - `403 Forbidden`: the refresh token is not the stored one, or fails verification.
#[post("/refresh-token")]
pub async fn refresh_token(
    state: web::Data<AppState>,
    body: Option<web::Json<RefreshTokenRequest>>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let present = |token: &String| !token.trim().is_empty();
    let token = body
        .and_then(|body| body.into_inner().refresh_token)
        .filter(present)
        .or_else(|| {
            req.cookie(REFRESH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_owned())
                .filter(present)
        })
        .ok_or_else(|| AppError::Unauthorized("No refresh token provided".into()))?;

    let refreshed = state
        .tokens
        .redeem_refresh_token(state.users.as_ref(), &token)
        .await?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        token: refreshed.access_token,
    }))
}

/// Identity probe for clients: returns the id of the admitted user.
#[get("/protected", wrap = "crate::auth::AccessGuard")]
pub async fn protected(user: AuthenticatedUserId) -> impl Responder {
    HttpResponse::Ok().json(json!({ "userId": user.0 }))
}
