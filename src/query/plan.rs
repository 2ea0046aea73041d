//! Compiles `get/all` query-string parameters into an owner-scoped, parameterized
//! query plan. User input only ever reaches the database as bound parameters; column
//! names and sort directions come from closed enums.

use chrono::NaiveDate;
use std::fmt::Write as _;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;
use crate::models::task::{completed_flag, DEFAULT_LIMIT};
use crate::models::TaskListParams;

const TASK_COLUMNS: &str = "id, user_id, title, description, completed, created_at, updated_at";

/// A single predicate of the `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFilter {
    /// `user_id = ?`. Always the first filter of a plan.
    Owner(i32),
    /// Case-insensitive substring of title or description.
    Search(String),
    /// Case-insensitive substring of title.
    Title(String),
    Completed(bool),
    /// Created on the given calendar date.
    CreatedOn(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Title,
    Description,
    Completed,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Title => "title",
            SortColumn::Description => "description",
            SortColumn::Completed => "completed",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortColumn {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "id" => Ok(SortColumn::Id),
            "title" => Ok(SortColumn::Title),
            "description" => Ok(SortColumn::Description),
            "completed" => Ok(SortColumn::Completed),
            "created_at" | "createdAt" => Ok(SortColumn::CreatedAt),
            "updated_at" | "updatedAt" => Ok(SortColumn::UpdatedAt),
            other => Err(AppError::BadRequest(format!(
                "Cannot order by '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(AppError::BadRequest(format!(
                "Sort direction must be ASC or DESC, got '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl OrderKey {
    fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i32),
    SmallInt(i16),
    BigInt(i64),
    Text(String),
    Date(NaiveDate),
}

/// Owner-scoped listing plan: filters, ordering and the requested page window.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQueryPlan {
    owner_id: i32,
    filters: Vec<TaskFilter>,
    order: Vec<OrderKey>,
    page: u32,
    limit: u32,
}

impl TaskQueryPlan {
    /// Validates `params` and compiles them into a plan for `owner_id`.
    pub fn build(owner_id: i32, params: &TaskListParams) -> Result<Self, AppError> {
        params.validate()?;

        let mut filters = vec![TaskFilter::Owner(owner_id)];
        if let Some(search) = present(&params.search) {
            filters.push(TaskFilter::Search(search));
        }
        if let Some(title) = present(&params.title) {
            filters.push(TaskFilter::Title(title));
        }
        if let Some(completed) = params.completed {
            filters.push(TaskFilter::Completed(completed));
        }
        if let Some(date) = params.created_at {
            filters.push(TaskFilter::CreatedOn(date));
        }

        let column = match present(&params.order_by) {
            Some(raw) => raw.parse()?,
            None => SortColumn::CreatedAt,
        };
        let direction = match present(&params.sort_by) {
            Some(raw) => raw.parse()?,
            None => SortDirection::Desc,
        };

        // Incomplete tasks surface first whenever the caller filters on completion.
        let mut order = Vec::with_capacity(3);
        if params.completed.is_some() {
            order.push(OrderKey::new(SortColumn::Completed, SortDirection::Asc));
        }
        order.push(OrderKey::new(column, direction));
        if column != SortColumn::Id {
            order.push(OrderKey::new(SortColumn::Id, direction));
        }

        Ok(Self {
            owner_id,
            filters,
            order,
            page: params.page.unwrap_or(1),
            limit: params.limit.unwrap_or(DEFAULT_LIMIT),
        })
    }

    pub fn owner_id(&self) -> i32 {
        self.owner_id
    }

    pub fn filters(&self) -> &[TaskFilter] {
        &self.filters
    }

    pub fn order(&self) -> &[OrderKey] {
        &self.order
    }

    /// Page number as requested (before clamping).
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Renders the `WHERE` predicates with `$n` placeholders, and the values to bind.
    pub fn where_clause(&self) -> (String, Vec<SqlParam>) {
        let mut params = Vec::with_capacity(self.filters.len());
        let predicates: Vec<String> = self
            .filters
            .iter()
            .map(|filter| {
                let n = params.len() + 1;
                match filter {
                    TaskFilter::Owner(id) => {
                        params.push(SqlParam::Int(*id));
                        format!("user_id = ${}", n)
                    }
                    TaskFilter::Search(needle) => {
                        params.push(SqlParam::Text(like_pattern(needle)));
                        format!("(title ILIKE ${n} OR description ILIKE ${n})", n = n)
                    }
                    TaskFilter::Title(needle) => {
                        params.push(SqlParam::Text(like_pattern(needle)));
                        format!("title ILIKE ${}", n)
                    }
                    TaskFilter::Completed(completed) => {
                        params.push(SqlParam::SmallInt(completed_flag(*completed)));
                        format!("completed = ${}", n)
                    }
                    TaskFilter::CreatedOn(date) => {
                        params.push(SqlParam::Date(*date));
                        format!("created_at::date = ${}", n)
                    }
                }
            })
            .collect();
        (predicates.join(" AND "), params)
    }

    pub fn order_clause(&self) -> String {
        self.order
            .iter()
            .map(|key| format!("{} {}", key.column.as_sql(), key.direction.as_sql()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `SELECT` for one page at `offset`.
    pub fn select_sql(&self, offset: u64) -> (String, Vec<SqlParam>) {
        let (predicates, mut params) = self.where_clause();
        let mut sql = format!(
            "SELECT {} FROM tasks WHERE {} ORDER BY {}",
            TASK_COLUMNS,
            predicates,
            self.order_clause()
        );
        let n = params.len();
        let _ = write!(sql, " LIMIT ${} OFFSET ${}", n + 1, n + 2);
        params.push(SqlParam::BigInt(i64::from(self.limit)));
        params.push(SqlParam::BigInt(i64::try_from(offset).unwrap_or(i64::MAX)));
        (sql, params)
    }

    /// `SELECT COUNT(*)` under the same predicates, ignoring order and window.
    pub fn count_sql(&self) -> (String, Vec<SqlParam>) {
        let (predicates, params) = self.where_clause();
        (
            format!("SELECT COUNT(*) FROM tasks WHERE {}", predicates),
            params,
        )
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Wraps `needle` for a literal substring `ILIKE` match, escaping `\`, `%` and `_`.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
