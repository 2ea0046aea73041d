use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderMap, HeaderValue},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::extractors::AuthenticatedUserId;
use crate::auth::token::{Refreshed, TokenError, TokenService};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::UserStore;

/// Cookie carrying the refresh token. Never read from the `Authorization` header.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// How a request got through the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The access token verified.
    Verified { user_id: i32 },
    /// The access token had expired and was replaced using the refresh token.
    Refreshed(Refreshed),
}

impl Admission {
    pub fn user_id(&self) -> i32 {
        match self {
            Admission::Verified { user_id } => *user_id,
            Admission::Refreshed(refreshed) => refreshed.user_id,
        }
    }

    /// The access token minted during this request, if any.
    pub fn new_access_token(&self) -> Option<&str> {
        match self {
            Admission::Verified { .. } => None,
            Admission::Refreshed(refreshed) => Some(&refreshed.access_token),
        }
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Decides whether a request is admitted.
///
/// - no bearer token: `Unauthorized`
/// - bearer token invalid: `Forbidden`
/// - bearer token expired: the refresh token is redeemed instead; missing is
///   `Unauthorized`, rejected is `Forbidden`
pub async fn admit(
    tokens: &TokenService,
    users: &dyn UserStore,
    bearer: Option<&str>,
    refresh_token: Option<&str>,
) -> Result<Admission, AppError> {
    let token = bearer.ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;

    match tokens.verify_access_token(token) {
        Ok(claims) => Ok(Admission::Verified {
            user_id: claims.user_id,
        }),
        Err(TokenError::Invalid) => {
            log::warn!("rejected invalid access token");
            Err(AppError::Forbidden("Invalid token".into()))
        }
        Err(TokenError::Expired) => {
            let refresh_token = refresh_token
                .filter(|token| !token.is_empty())
                .ok_or_else(|| AppError::Unauthorized("Token expired".into()))?;
            let refreshed = tokens.redeem_refresh_token(users, refresh_token).await?;
            log::debug!("healed expired access token for user {}", refreshed.user_id);
            Ok(Admission::Refreshed(refreshed))
        }
    }
}

/// Guards a scope: only admitted requests reach the wrapped handlers, with the
/// caller available through [`AuthenticatedUserId`].
///
/// When the request was admitted by refreshing an expired access token, the new
/// token is returned in the response's `Authorization: Bearer` header.
pub struct AccessGuard;

impl<S, B> Transform<S, ServiceRequest> for AccessGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AccessGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessGuardService {
            service: Rc::new(service),
        }))
    }
}

pub struct AccessGuardService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AccessGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .cloned()
                .ok_or_else(|| AppError::InternalServerError("AppState is not registered".into()))?;

            let bearer = bearer_token(req.headers()).map(str::to_owned);
            let refresh_token = req
                .cookie(REFRESH_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_owned());

            let admission = admit(
                &state.tokens,
                state.users.as_ref(),
                bearer.as_deref(),
                refresh_token.as_deref(),
            )
            .await?;

            req.extensions_mut()
                .insert(AuthenticatedUserId(admission.user_id()));
            let mut res = service.call(req).await?;

            if let Some(access_token) = admission.new_access_token() {
                let value = HeaderValue::from_str(&format!("Bearer {}", access_token))
                    .map_err(|e| AppError::InternalServerError(e.to_string()))?;
                res.headers_mut().insert(header::AUTHORIZATION, value);
            }
            Ok::<_, Error>(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use actix_web::test::TestRequest;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// A store with no users at all.
    struct NoUsers;

    #[async_trait]
    impl UserStore for NoUsers {
        async fn create_user(&self, _: &str, _: &str) -> Result<User, AppError> {
            unimplemented!()
        }

        async fn find_by_username(&self, _: &str) -> Result<Option<User>, AppError> {
            Ok(None)
        }

        async fn find_by_refresh_token(&self, _: &str) -> Result<Option<User>, AppError> {
            Ok(None)
        }

        async fn set_refresh_token(&self, _: i32, _: &str) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn tokens() -> TokenService {
        TokenService::new("access", "refresh", "tasklane")
    }

    #[test]
    fn test_bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(req.headers()), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwdw=="))
            .to_http_request();
        assert_eq!(bearer_token(req.headers()), None);

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert_eq!(bearer_token(req.headers()), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(req.headers()), None);
    }

    #[actix_rt::test]
    async fn test_missing_token_is_unauthorized() {
        let err = admit(&tokens(), &NoUsers, None, Some("ignored")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[actix_rt::test]
    async fn test_valid_token_is_admitted() {
        let tokens = tokens();
        let token = tokens.issue_access_token(4).unwrap();
        let admission = admit(&tokens, &NoUsers, Some(&token), None).await.unwrap();
        assert_eq!(admission, Admission::Verified { user_id: 4 });
        assert_eq!(admission.new_access_token(), None);
    }

    #[actix_rt::test]
    async fn test_invalid_token_is_forbidden() {
        let err = admit(&tokens(), &NoUsers, Some("garbage"), None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[actix_rt::test]
    async fn test_expired_token_without_refresh_is_unauthorized() {
        let tokens = tokens();
        let expired = tokens
            .issue_access_token_at(4, Utc::now() - Duration::hours(1))
            .unwrap();
        let err = admit(&tokens, &NoUsers, Some(&expired), None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = admit(&tokens, &NoUsers, Some(&expired), Some("")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[actix_rt::test]
    async fn test_expired_token_from_another_issuer_is_forbidden() {
        let foreign = TokenService::new("access", "refresh", "someone-else");
        let expired = foreign
            .issue_access_token_at(4, Utc::now() - Duration::hours(1))
            .unwrap();
        let err = admit(&tokens(), &NoUsers, Some(&expired), Some("anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[actix_rt::test]
    async fn test_expired_token_with_unknown_refresh_is_forbidden() {
        let tokens = tokens();
        let expired = tokens
            .issue_access_token_at(4, Utc::now() - Duration::hours(1))
            .unwrap();
        let refresh = tokens.issue_refresh_token(4).unwrap();
        let err = admit(&tokens, &NoUsers, Some(&expired), Some(&refresh))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
