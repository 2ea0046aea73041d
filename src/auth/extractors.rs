use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

/// The user admitted by [`AccessGuard`](super::AccessGuard) for this request.
///
/// Only available on routes wrapped by the guard, which inserts it into the request
/// extensions after verifying (or refreshing) the caller's access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUserId(pub i32);

impl FromRequest for AuthenticatedUserId {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedUserId>().copied() {
            Some(user_id) => ready(Ok(user_id)),
            None => {
                log::error!("{} reached without an admitted user; is AccessGuard applied?", req.path());
                let err = AppError::Unauthorized("No token provided".to_string());
                ready(Err(err.into()))
            }
        }
    }
}
