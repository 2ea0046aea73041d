use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::non_blank;

/// Default page size for `get/all`.
pub const DEFAULT_LIMIT: u32 = 10;
/// Upper bound on page size; larger requests are rejected.
pub const MAX_LIMIT: u32 = 100;

/// A task row exactly as the store returns it. `completed` is encoded as 0/1.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub completed: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i32,
    /// Owner of the task.
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            completed: row.completed != 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Encodes a completion flag the way the `tasks.completed` column stores it.
pub fn completed_flag(completed: bool) -> i16 {
    i16::from(completed)
}

/// Payload for `POST /create`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateTaskInput {
    #[validate(length(max = 255), custom = "non_blank")]
    pub title: String,
    #[validate(length(max = 2000), custom = "non_blank")]
    pub description: String,
}

/// Payload for `PUT /update/{id}`. An absent `completed` keeps the stored value.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateTaskInput {
    #[validate(length(max = 255), custom = "non_blank")]
    pub title: String,
    #[validate(length(max = 2000), custom = "non_blank")]
    pub description: String,
    pub completed: Option<bool>,
}

/// Payload for `PUT /update/status/{id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusInput {
    pub completed: bool,
}

/// Query string accepted by `GET /get/all`. Every field is optional.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct TaskListParams {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    /// Substring matched against title or description.
    pub search: Option<String>,
    /// Substring matched against title only.
    pub title: Option<String>,
    pub completed: Option<bool>,
    /// Calendar date (`YYYY-MM-DD`) the task was created on.
    #[serde(alias = "createdAt")]
    pub created_at: Option<NaiveDate>,
    #[serde(alias = "orderBy")]
    pub order_by: Option<String>,
    /// Sort direction, `ASC` or `DESC`.
    #[serde(alias = "sortDirection")]
    pub sort_by: Option<String>,
}

/// Pagination metadata attached to a task listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
}

/// One page of tasks plus its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(completed: i16) -> TaskRow {
        let now = Utc::now();
        TaskRow {
            id: 7,
            user_id: 3,
            title: "Write report".into(),
            description: "Quarterly numbers".into(),
            completed,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_completed_becomes_boolean() {
        assert!(!Task::from(row(0)).completed);
        assert!(Task::from(row(1)).completed);

        let json = serde_json::to_value(Task::from(row(1))).unwrap();
        assert_eq!(json["completed"], serde_json::Value::Bool(true));
        assert_eq!(json["user_id"], 3);
    }

    #[test]
    fn test_completed_flag_encoding() {
        assert_eq!(completed_flag(true), 1);
        assert_eq!(completed_flag(false), 0);
    }

    #[test]
    fn test_create_input_validation() {
        let valid = CreateTaskInput {
            title: "t".into(),
            description: "d".into(),
        };
        assert!(valid.validate().is_ok());

        let blank_title = CreateTaskInput {
            title: "   ".into(),
            description: "d".into(),
        };
        assert!(blank_title.validate().is_err());

        let empty_description = CreateTaskInput {
            title: "t".into(),
            description: "".into(),
        };
        assert!(empty_description.validate().is_err());

        let long_title = CreateTaskInput {
            title: "a".repeat(256),
            description: "d".into(),
        };
        assert!(long_title.validate().is_err());
    }

    #[test]
    fn test_list_params_bounds() {
        let params = TaskListParams {
            page: Some(0),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = TaskListParams {
            limit: Some(MAX_LIMIT + 1),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        assert!(TaskListParams::default().validate().is_ok());
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let pagination = Pagination {
            current_page: 1,
            total_pages: 2,
            total_items: 11,
            items_per_page: DEFAULT_LIMIT,
        };
        let json = serde_json::to_value(&pagination).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "currentPage": 1,
                "totalPages": 2,
                "totalItems": 11,
                "itemsPerPage": 10
            })
        );
    }
}
