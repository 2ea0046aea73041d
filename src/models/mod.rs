pub mod task;
pub mod user;

pub use task::{
    CreateTaskInput, Pagination, Task, TaskListParams, TaskPage, TaskRow, UpdateStatusInput,
    UpdateTaskInput,
};
pub use user::User;

use validator::ValidationError;

/// Rejects strings that are empty or consist only of whitespace.
pub fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("must not be empty".into());
        return Err(error);
    }
    Ok(())
}
