#![doc = "The `tasklane` library crate."]
#![doc = ""]
#![doc = "Accounts with JWT access/refresh tokens, an access guard that heals expired access"]
#![doc = "tokens within the same request, and owner-scoped task storage with a paginated,"]
#![doc = "filterable listing engine. The binary (`main.rs`) wires these into an Actix server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod routes;
pub mod state;
pub mod store;

pub use crate::error::AppError;
pub use crate::state::AppState;
