pub mod auth;
pub mod health;
pub mod tasks;

use actix_web::web;

use crate::auth::AccessGuard;
use crate::error::AppError;

/// Registers the `/auth` and `/task` scopes. Mount under `/api`.
///
/// Extractor failures (malformed JSON, query strings or path ids) are reported
/// through `AppError::BadRequest` so every error shares one JSON shape.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::login)
            .service(auth::refresh_token)
            .service(auth::protected),
    )
    .service(
        web::scope("/task")
            .wrap(AccessGuard)
            .service(tasks::create_task)
            .service(tasks::get_all_tasks)
            .service(tasks::get_task)
            .service(tasks::update_task_status)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    );
}
