//! Task listing: plan construction, execution and page reconciliation.

pub mod pagination;
pub mod plan;

pub use pagination::{offset_for, PageWindow};
pub use plan::{like_pattern, OrderKey, SortColumn, SortDirection, SqlParam, TaskFilter, TaskQueryPlan};

use crate::error::AppError;
use crate::models::TaskPage;
use crate::store::TaskStore;

/// Runs `plan` against `store` and returns a page whose number is always in range.
///
/// A request for a page past the end of a non-empty result set is served the last
/// page instead of an empty one.
pub async fn list_tasks(store: &dyn TaskStore, plan: &TaskQueryPlan) -> Result<TaskPage, AppError> {
    let mut tasks = store
        .fetch_tasks(plan, offset_for(plan.page(), plan.limit()))
        .await?;
    let total = store.count_tasks(plan).await?;

    let window = PageWindow::resolve(plan.page(), plan.limit(), total);
    if window.needs_refetch() {
        log::debug!(
            "page {} out of range for user {} ({} items), serving page {}",
            plan.page(),
            plan.owner_id(),
            total,
            window.current_page
        );
        tasks = store.fetch_tasks(plan, window.offset()).await?;
    }

    Ok(TaskPage {
        tasks,
        pagination: window.pagination(),
    })
}
