//! Persistence seams. Handlers, the access guard and the query engine only see these
//! traits; `PgStore` is the production implementation.
//!
//! Every task method takes the owner id and must filter on it together with the
//! task id: a task owned by someone else behaves exactly like a missing one.

pub mod postgres;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Task, User};
use crate::query::TaskQueryPlan;

pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user. A taken username yields `AppError::Conflict`.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// The user whose stored refresh token is exactly `token`, if any.
    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, AppError>;

    /// Replaces the user's current refresh token.
    async fn set_refresh_token(&self, user_id: i32, token: &str) -> Result<(), AppError>;
}

/// Fields written by a full task update.
#[derive(Debug, Clone)]
pub struct TaskChanges {
    pub title: String,
    pub description: String,
    /// `None` keeps the stored value.
    pub completed: Option<bool>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts an incomplete task for `owner_id`.
    async fn create_task(&self, owner_id: i32, title: &str, description: &str) -> Result<Task, AppError>;

    async fn find_task(&self, owner_id: i32, task_id: i32) -> Result<Option<Task>, AppError>;

    async fn update_task(
        &self,
        owner_id: i32,
        task_id: i32,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, AppError>;

    async fn set_task_completed(
        &self,
        owner_id: i32,
        task_id: i32,
        completed: bool,
    ) -> Result<Option<Task>, AppError>;

    /// Returns whether a row was deleted.
    async fn delete_task(&self, owner_id: i32, task_id: i32) -> Result<bool, AppError>;

    /// One page of the plan's rows, in plan order, starting at `offset`.
    async fn fetch_tasks(&self, plan: &TaskQueryPlan, offset: u64) -> Result<Vec<Task>, AppError>;

    /// Number of rows matching the plan's filters.
    async fn count_tasks(&self, plan: &TaskQueryPlan) -> Result<u64, AppError>;
}
