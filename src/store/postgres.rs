use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{TaskChanges, TaskStore, UserStore};
use crate::config::Config;
use crate::error::AppError;
use crate::models::task::completed_flag;
use crate::models::{Task, TaskRow, User};
use crate::query::{SqlParam, TaskQueryPlan};

const USER_COLUMNS: &str = "id, username, password_hash, refresh_token, created_at";
const TASK_RETURNING: &str =
    "RETURNING id, user_id, title, description, completed, created_at, updated_at";

/// Binds plan parameters, in order, onto a `query`/`query_as`/`query_scalar` builder.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                SqlParam::Int(value) => query.bind(value),
                SqlParam::SmallInt(value) => query.bind(value),
                SqlParam::BigInt(value) => query.bind(value),
                SqlParam::Text(value) => query.bind(value),
                SqlParam::Date(value) => query.bind(value),
            };
        }
        query
    }};
}

/// PostgreSQL-backed user and task store. Connections are taken from the pool per
/// statement and returned when the statement's future completes or is dropped.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AppError::Conflict("Username already exists".into())
                }
                other => other.into(),
            })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE refresh_token = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_refresh_token(&self, user_id: i32, token: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, owner_id: i32, title: &str, description: &str) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks (user_id, title, description, completed) VALUES ($1, $2, $3, 0) {}",
            TASK_RETURNING
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(owner_id)
            .bind(title)
            .bind(description)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_task(&self, owner_id: i32, task_id: i32) -> Result<Option<Task>, AppError> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT id, user_id, title, description, completed, created_at, updated_at \
             FROM tasks WHERE id = $1 AND user_id = $2",
        )
        .bind(task_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Task::from))
    }

    async fn update_task(
        &self,
        owner_id: i32,
        task_id: i32,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET title = $1, description = $2, completed = COALESCE($3, completed), \
             updated_at = NOW() WHERE id = $4 AND user_id = $5 {}",
            TASK_RETURNING
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(changes.completed.map(completed_flag))
            .bind(task_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Task::from))
    }

    async fn set_task_completed(
        &self,
        owner_id: i32,
        task_id: i32,
        completed: bool,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET completed = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3 {}",
            TASK_RETURNING
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(completed_flag(completed))
            .bind(task_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Task::from))
    }

    async fn delete_task(&self, owner_id: i32, task_id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_tasks(&self, plan: &TaskQueryPlan, offset: u64) -> Result<Vec<Task>, AppError> {
        let (sql, params) = plan.select_sql(offset);
        let rows = bind_params!(sqlx::query_as::<_, TaskRow>(&sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn count_tasks(&self, plan: &TaskQueryPlan) -> Result<u64, AppError> {
        let (sql, params) = plan.count_sql();
        let count: i64 = bind_params!(sqlx::query_scalar::<_, i64>(&sql), params)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
