#![allow(dead_code)]

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    test, web, App,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use tasklane::auth::TokenService;
use tasklane::error::AppError;
use tasklane::models::{Task, User};
use tasklane::query::{OrderKey, SortColumn, SortDirection, TaskFilter, TaskQueryPlan};
use tasklane::routes::{self, health};
use tasklane::store::{TaskChanges, TaskStore, UserStore};
use tasklane::AppState;

pub const ACCESS_SECRET: &str = "test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret";
pub const ISSUER: &str = "tasklane";

pub fn tokens() -> TokenService {
    TokenService::new(ACCESS_SECRET, REFRESH_SECRET, ISSUER)
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tasks: Vec<Task>,
    /// Advances on every write so timestamps are strictly increasing.
    clock: i64,
}

impl Tables {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(self.clock)
    }

    fn owned_task(&mut self, owner_id: i32, task_id: i32) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id && t.user_id == owner_id)
    }
}

/// In-memory stand-in for `PgStore`, interpreting query plans the way the SQL does.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stored_refresh_token(&self, username: &str) -> Option<String> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|u| u.username == username)
            .and_then(|u| u.refresh_token.clone())
    }

    fn matching(&self, plan: &TaskQueryPlan) -> Vec<Task> {
        let tables = self.tables.lock().unwrap();
        let mut tasks: Vec<Task> = tables
            .tasks
            .iter()
            .filter(|task| plan.filters().iter().all(|f| matches_filter(task, f)))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| compare(a, b, plan.order()));
        tasks
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches_filter(task: &Task, filter: &TaskFilter) -> bool {
    match filter {
        TaskFilter::Owner(id) => task.user_id == *id,
        TaskFilter::Search(needle) => {
            contains_ci(&task.title, needle) || contains_ci(&task.description, needle)
        }
        TaskFilter::Title(needle) => contains_ci(&task.title, needle),
        TaskFilter::Completed(completed) => task.completed == *completed,
        TaskFilter::CreatedOn(date) => task.created_at.date_naive() == *date,
    }
}

fn compare(a: &Task, b: &Task, order: &[OrderKey]) -> Ordering {
    for key in order {
        let ordering = match key.column {
            SortColumn::Id => a.id.cmp(&b.id),
            SortColumn::Title => a.title.cmp(&b.title),
            SortColumn::Description => a.description.cmp(&b.description),
            SortColumn::Completed => a.completed.cmp(&b.completed),
            SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
            SortColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict("Username already exists".into()));
        }
        let user = User {
            id: tables.users.len() as i32 + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            refresh_token: None,
            created_at: tables.tick(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|u| u.holds_refresh_token(token))
            .cloned())
    }

    async fn set_refresh_token(&self, user_id: i32, token: &str) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        match tables.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.refresh_token = Some(token.to_string());
                Ok(())
            }
            None => Err(AppError::NotFound("User not found".into())),
        }
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, owner_id: i32, title: &str, description: &str) -> Result<Task, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        let task = Task {
            id: tables.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1,
            user_id: owner_id,
            title: title.to_string(),
            description: description.to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, owner_id: i32, task_id: i32) -> Result<Option<Task>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.owned_task(owner_id, task_id).map(|t| t.clone()))
    }

    async fn update_task(
        &self,
        owner_id: i32,
        task_id: i32,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        Ok(tables.owned_task(owner_id, task_id).map(|task| {
            task.title = changes.title.clone();
            task.description = changes.description.clone();
            if let Some(completed) = changes.completed {
                task.completed = completed;
            }
            task.updated_at = now;
            task.clone()
        }))
    }

    async fn set_task_completed(
        &self,
        owner_id: i32,
        task_id: i32,
        completed: bool,
    ) -> Result<Option<Task>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let now = tables.tick();
        Ok(tables.owned_task(owner_id, task_id).map(|task| {
            task.completed = completed;
            task.updated_at = now;
            task.clone()
        }))
    }

    async fn delete_task(&self, owner_id: i32, task_id: i32) -> Result<bool, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|t| !(t.id == task_id && t.user_id == owner_id));
        Ok(tables.tasks.len() != before)
    }

    async fn fetch_tasks(&self, plan: &TaskQueryPlan, offset: u64) -> Result<Vec<Task>, AppError> {
        Ok(self
            .matching(plan)
            .into_iter()
            .skip(offset as usize)
            .take(plan.limit() as usize)
            .collect())
    }

    async fn count_tasks(&self, plan: &TaskQueryPlan) -> Result<u64, AppError> {
        Ok(self.matching(plan).len() as u64)
    }
}

pub fn app_state(store: Arc<MemoryStore>) -> web::Data<AppState> {
    web::Data::new(AppState::new(store.clone(), store, tokens(), 4))
}

/// The production route tree over `store`.
pub async fn init_app(
    store: Arc<MemoryStore>,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .app_data(app_state(store))
            .service(health::health)
            .service(web::scope("/api").configure(routes::config)),
    )
    .await
}

/// Credentials issued by a successful login.
pub struct Session {
    pub user_id: i32,
    pub token: String,
    pub refresh_token: String,
}

impl Session {
    pub fn bearer(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token))
    }
}

pub async fn register(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    username: &str,
    password: &str,
) -> ServiceResponse<impl MessageBody> {
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    test::call_service(app, req).await
}

pub async fn login(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    username: &str,
    password: &str,
) -> ServiceResponse<impl MessageBody> {
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    test::call_service(app, req).await
}

pub async fn register_and_login(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    username: &str,
    password: &str,
) -> Session {
    let resp = register(app, username, password).await;
    assert_eq!(resp.status(), 201, "register {} failed", username);

    let resp = login(app, username, password).await;
    assert_eq!(resp.status(), 200, "login {} failed", username);
    let body: Value = test::read_body_json(resp).await;

    let token = body["token"].as_str().unwrap().to_string();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();
    let user_id = tokens().verify_access_token(&token).unwrap().user_id;
    Session {
        user_id,
        token,
        refresh_token,
    }
}

/// Status of a response, including one rejected by middleware before reaching a handler.
pub fn status_of<B>(result: &Result<ServiceResponse<B>, actix_web::Error>) -> u16 {
    match result {
        Ok(resp) => resp.status().as_u16(),
        Err(err) => err.as_response_error().status_code().as_u16(),
    }
}
