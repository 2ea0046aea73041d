use crate::{
    auth::AuthenticatedUserId,
    error::AppError,
    models::{CreateTaskInput, TaskListParams, UpdateStatusInput, UpdateTaskInput},
    query::{list_tasks, TaskQueryPlan},
    state::AppState,
    store::TaskChanges,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

/// Creates a new task owned by the authenticated user.
///
/// ## Request Body:
/// - `title`: non-empty, at most 255 characters.
/// - `description`: non-empty, at most 2000 characters.
///
/// ## Responses:
/// - `201 Created`: the new task, with `completed` set to `false`.
/// - `400 Bad Request`: missing or blank fields.
/// - `401 Unauthorized` / `403 Forbidden`: see `AccessGuard`.
#[post("/create")]
pub async fn create_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    task_data: web::Json<CreateTaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = state
        .tasks
        .create_task(user.0, &task_data.title, &task_data.description)
        .await?;

    Ok(HttpResponse::Created().json(task))
}

/// Lists the authenticated user's tasks, one page at a time.
///
/// ## Query Parameters:
/// - `page` (default 1), `limit` (default 10, at most 100).
/// - `search`: substring of title or description.
/// - `title`: substring of title.
/// - `completed`: `true` or `false`. When present, incomplete tasks sort first.
/// - `created_at`: creation date, `YYYY-MM-DD`.
/// - `order_by` (default `created_at`), `sort_by`: `ASC` or `DESC` (default).
///
/// A page past the end of a non-empty result is served as the last page.
///
/// ## Responses:
/// - `200 OK`: `{"tasks": [...], "pagination": {...}}`
/// - `400 Bad Request`: out-of-range window or unknown sort column/direction.
#[get("/get/all")]
pub async fn get_all_tasks(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    query_params: web::Query<TaskListParams>,
) -> Result<impl Responder, AppError> {
    let plan = TaskQueryPlan::build(user.0, &query_params)?;
    let page = list_tasks(state.tasks.as_ref(), &plan).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Retrieves one task. A task owned by another user is reported as not found.
#[get("/get/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .find_task(user.0, task_id.into_inner())
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Replaces a task's title and description, and its completion flag when given.
///
/// ## Responses:
/// - `200 OK`: the updated task.
/// - `400 Bad Request`: missing or blank fields.
/// - `404 Not Found`: no such task for this user.
#[put("/update/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
    task_data: web::Json<UpdateTaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let input = task_data.into_inner();
    let changes = TaskChanges {
        title: input.title,
        description: input.description,
        completed: input.completed,
    };

    let task = state
        .tasks
        .update_task(user.0, task_id.into_inner(), &changes)
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Sets only the completion flag of a task.
///
/// ## Responses:
/// - `200 OK`: `{"message": ..., "task": {...}}`
/// - `404 Not Found`: no such task for this user.
#[put("/update/status/{id}")]
pub async fn update_task_status(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
    status: web::Json<UpdateStatusInput>,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .set_task_completed(user.0, task_id.into_inner(), status.completed)
        .await?
        .ok_or_else(task_not_found)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task status updated successfully",
        "task": task
    })))
}

/// Deletes a task owned by the authenticated user.
///
/// ## Responses:
/// - `204 No Content`: deleted.
/// - `404 Not Found`: no such task for this user.
#[delete("/delete/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let id = task_id.into_inner();
    if !state.tasks.delete_task(user.0, id).await? {
        return Err(task_not_found());
    }
    log::debug!("user {} deleted task {}", user.0, id);
    Ok(HttpResponse::NoContent().finish())
}
