/*
 *     Copyright (C) 2024  the taskdesk authors
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Task persistence. Every state-changing writer issues a single conditional
//! `UPDATE ... WHERE <precondition> RETURN AFTER` so concurrent attempts on
//! the same row are resolved by the database: the loser matches zero rows
//! and the failure is classified through the lifecycle engine afterwards.

use crate::database::definitions::user::Role;
use crate::lifecycle::{self, TaskView};
use crate::prelude::*;
use chrono::{DateTime, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

/// Priority levels in ascending significance. The declaration order is the
/// sort order, mirrored by [`PRIORITY_ORDER`] for the database side.
#[derive(
    Deserialize,
    Serialize,
    JsonSchema,
    strum::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    Low,
    Medium,
    High,
    Urgent,
}

pub const PRIORITY_ORDER: [&str; 4] = ["low", "medium", "high", "urgent"];

/// The selectable orderings of the task listing.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TaskOrdering {
    #[default]
    CreatedAt,
    DueDate,
    Priority,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Getters)]
#[get = "pub"]
pub struct Task {
    id: Id,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due: Option<DateTime<Utc>>,
    priority: TaskPriority,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    completed: bool,
    is_canceled: bool,
    created_by: Id,
    #[serde(default)]
    claimed_by: Option<Id>,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Task {
    pub async fn fetch(id: &Id, connection: &DatabaseConnection) -> Result<Option<Task>> {
        Ok(sql_span!(connection.select(id).await?))
    }
}

/// Re-reads the task after a conditional update matched zero rows and lets
/// the lifecycle engine name the reason.
async fn transition_error<F>(
    target: &Id,
    connection: &DatabaseConnection,
    authorize: F,
) -> ApplicationError
where
    F: FnOnce(&Task) -> Result<()>,
{
    match Task::fetch(target, connection).await {
        Ok(Some(task)) => match authorize(&task) {
            // the precondition held on re-read: we lost the race itself
            Ok(()) => ApplicationError::Conflict("task changed concurrently".to_owned()),
            Err(error) => error,
        },
        Ok(None) => ApplicationError::NotFound("unknown task".to_owned()),
        Err(error) => error,
    }
}

/// Creates a new task in the `Waiting` state. Task ids are small integers
/// drawn from the `counter:task` record.
#[derive(Clone, Debug, Setters)]
#[set = "pub"]
pub struct WriteTask<'a> {
    title: Option<String>,
    description: Option<String>,
    due: Option<DateTime<Utc>>,
    priority: Option<TaskPriority>,
    department: Option<String>,
    customer: Option<String>,
    created_by: Option<&'a Id>,
    #[getset(skip)]
    connection: &'a DatabaseConnection,
}

impl<'a> From<&'a DatabaseConnection> for WriteTask<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            title: None,
            description: None,
            due: None,
            priority: None,
            department: None,
            customer: None,
            created_by: None,
            connection,
        }
    }
}

impl<'a> IntoFuture for WriteTask<'a> {
    type Output = Result<Task>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let title = self.title.unwrap_or_default();
            lifecycle::validate_title(title.as_str())?;
            let created_by = self
                .created_by
                .ok_or(ApplicationError::BadRequest("missing creator".to_owned()))?;

            let task: Option<Task> = sql_span!(
                self.connection
                    .query(
                        "LET $seq = (UPDATE counter:task SET value = (value ?? 0) + 1 RETURN AFTER)[0].value;
                         CREATE type::thing('task', $seq) CONTENT {
                             title: $title,
                             description: $description,
                             due: IF $due THEN <datetime> $due ELSE NONE END,
                             priority: $priority,
                             department: $department,
                             customer: $customer,
                             completed: false,
                             is_canceled: false,
                             created_by: $created_by,
                             claimed_by: NONE,
                             updated_at: time::now(),
                             created_at: time::now()
                         };",
                    )
                    .bind(("title", title.trim()))
                    .bind(("description", self.description))
                    .bind(("due", self.due))
                    .bind(("priority", self.priority.unwrap_or_default()))
                    .bind(("department", self.department))
                    .bind(("customer", self.customer))
                    .bind(("created_by", created_by))
                    .await?
                    .check()?
                    .take::<Option<Task>>(1)?
            );

            task.ok_or(ApplicationError::InternalServerError)
        })
    }
}

/// Partial field update, "apply if present". Only the current claimer may
/// edit, and only while the task is neither completed nor canceled.
#[derive(Deserialize, JsonSchema, Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub priority: Option<TaskPriority>,
    pub department: Option<String>,
    pub customer: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due.is_none()
            && self.priority.is_none()
            && self.department.is_none()
            && self.customer.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct EditTask<'a> {
    target: &'a Id,
    acting: &'a ActingUser,
    patch: TaskPatch,
    connection: &'a DatabaseConnection,
}

impl<'a> EditTask<'a> {
    pub fn new(
        target: &'a Id,
        acting: &'a ActingUser,
        patch: TaskPatch,
        connection: &'a DatabaseConnection,
    ) -> Self {
        Self {
            target,
            acting,
            patch,
            connection,
        }
    }
}

impl<'a> IntoFuture for EditTask<'a> {
    type Output = Result<Task>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            if let Some(title) = self.patch.title.as_deref() {
                lifecycle::validate_title(title)?;
            }

            // assemble the SET clause from the supplied fields only
            let mut assignments = vec!["updated_at = time::now()"];
            if self.patch.title.is_some() {
                assignments.push("title = $title");
            }
            if self.patch.description.is_some() {
                assignments.push("description = $description");
            }
            if self.patch.due.is_some() {
                assignments.push("due = <datetime> $due");
            }
            if self.patch.priority.is_some() {
                assignments.push("priority = $priority");
            }
            if self.patch.department.is_some() {
                assignments.push("department = $department");
            }
            if self.patch.customer.is_some() {
                assignments.push("customer = $customer");
            }

            let query = format!(
                "UPDATE $target SET {} \
                 WHERE claimed_by = $acting AND completed = false AND is_canceled = false \
                 RETURN AFTER;",
                assignments.join(", ")
            );

            let task: Option<Task> = sql_span!(
                self.connection
                    .query(query)
                    .bind(("target", self.target.to_thing()))
                    .bind(("acting", &self.acting.id))
                    .bind(("title", self.patch.title.as_ref().map(|title| title.trim())))
                    .bind(("description", &self.patch.description))
                    .bind(("due", &self.patch.due))
                    .bind(("priority", &self.patch.priority))
                    .bind(("department", &self.patch.department))
                    .bind(("customer", &self.patch.customer))
                    .await?
                    .check()?
                    .take::<Option<Task>>(0)?
            );

            match task {
                Some(task) => Ok(task),
                None => Err(transition_error(self.target, self.connection, |task| {
                    lifecycle::authorize_edit(task, self.acting)
                })
                .await),
            }
        })
    }
}

/// The claim transition. The `WHERE` clause restates the claim guard so at
/// most one of any number of concurrent claimants wins.
#[derive(Clone, Debug)]
pub struct ClaimTask<'a> {
    target: &'a Id,
    acting: &'a ActingUser,
    connection: &'a DatabaseConnection,
}

impl<'a> ClaimTask<'a> {
    pub fn new(target: &'a Id, acting: &'a ActingUser, connection: &'a DatabaseConnection) -> Self {
        Self {
            target,
            acting,
            connection,
        }
    }
}

impl<'a> IntoFuture for ClaimTask<'a> {
    type Output = Result<Task>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let task: Option<Task> = sql_span!(
                self.connection
                    .query(
                        "UPDATE $target SET claimed_by = $acting, updated_at = time::now() \
                         WHERE claimed_by = NONE AND created_by != $acting \
                           AND completed = false AND is_canceled = false \
                         RETURN AFTER;",
                    )
                    .bind(("target", self.target.to_thing()))
                    .bind(("acting", &self.acting.id))
                    .await?
                    .check()?
                    .take::<Option<Task>>(0)?
            );

            match task {
                Some(task) => Ok(task),
                None => Err(transition_error(self.target, self.connection, |task| {
                    lifecycle::authorize_claim(task, self.acting)
                })
                .await),
            }
        })
    }
}

/// The complete transition. Completing an already completed task returns the
/// unchanged row instead of an error.
#[derive(Clone, Debug)]
pub struct CompleteTask<'a> {
    target: &'a Id,
    acting: &'a ActingUser,
    connection: &'a DatabaseConnection,
}

impl<'a> CompleteTask<'a> {
    pub fn new(target: &'a Id, acting: &'a ActingUser, connection: &'a DatabaseConnection) -> Self {
        Self {
            target,
            acting,
            connection,
        }
    }
}

impl<'a> IntoFuture for CompleteTask<'a> {
    type Output = Result<Task>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let task: Option<Task> = sql_span!(
                self.connection
                    .query(
                        "UPDATE $target SET completed = true, updated_at = time::now() \
                         WHERE claimed_by = $acting AND completed = false AND is_canceled = false \
                         RETURN AFTER;",
                    )
                    .bind(("target", self.target.to_thing()))
                    .bind(("acting", &self.acting.id))
                    .await?
                    .check()?
                    .take::<Option<Task>>(0)?
            );

            match task {
                Some(task) => Ok(task),
                None => {
                    // idempotency: a repeated completion is a no-op
                    match Task::fetch(self.target, self.connection).await? {
                        Some(task)
                            if *task.completed()
                                && lifecycle::authorize_complete(&task, self.acting).is_ok() =>
                        {
                            Ok(task)
                        }
                        Some(task) => {
                            lifecycle::authorize_complete(&task, self.acting)?;
                            Err(ApplicationError::Conflict(
                                "task changed concurrently".to_owned(),
                            ))
                        }
                        None => Err(ApplicationError::NotFound("unknown task".to_owned())),
                    }
                }
            }
        })
    }
}

/// The cancel transition.
#[derive(Clone, Debug)]
pub struct CancelTask<'a> {
    target: &'a Id,
    acting: &'a ActingUser,
    connection: &'a DatabaseConnection,
}

impl<'a> CancelTask<'a> {
    pub fn new(target: &'a Id, acting: &'a ActingUser, connection: &'a DatabaseConnection) -> Self {
        Self {
            target,
            acting,
            connection,
        }
    }
}

impl<'a> IntoFuture for CancelTask<'a> {
    type Output = Result<Task>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let task: Option<Task> = sql_span!(
                self.connection
                    .query(
                        "UPDATE $target SET is_canceled = true, updated_at = time::now() \
                         WHERE claimed_by = $acting AND completed = false AND is_canceled = false \
                         RETURN AFTER;",
                    )
                    .bind(("target", self.target.to_thing()))
                    .bind(("acting", &self.acting.id))
                    .await?
                    .check()?
                    .take::<Option<Task>>(0)?
            );

            match task {
                Some(task) => Ok(task),
                None => Err(transition_error(self.target, self.connection, |task| {
                    lifecycle::authorize_cancel(task, self.acting)
                })
                .await),
            }
        })
    }
}

/// Removes a task and its file rows. The file rows are deleted first, so a
/// partial failure can never leave orphaned files behind.
#[derive(Clone, Debug)]
pub struct DeleteTask<'a> {
    target: &'a Id,
    acting: &'a ActingUser,
    connection: &'a DatabaseConnection,
}

impl<'a> DeleteTask<'a> {
    pub fn new(target: &'a Id, acting: &'a ActingUser, connection: &'a DatabaseConnection) -> Self {
        Self {
            target,
            acting,
            connection,
        }
    }
}

impl<'a> IntoFuture for DeleteTask<'a> {
    type Output = Result<(Task, Vec<super::file::File>)>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let task = Task::fetch(self.target, self.connection)
                .await?
                .ok_or(ApplicationError::NotFound("unknown task".to_owned()))?;
            lifecycle::authorize_delete(&task, self.acting)?;

            let files = super::file::File::of_task(self.target, self.connection).await?;

            let deleted: Vec<Task> = sql_span!(
                self.connection
                    .query("DELETE file WHERE task = $target_id;")
                    .query("DELETE $target WHERE claimed_by = $acting RETURN BEFORE;")
                    .bind(("target_id", self.target))
                    .bind(("target", self.target.to_thing()))
                    .bind(("acting", &self.acting.id))
                    .await?
                    .check()?
                    .take::<Vec<Task>>(1)?
            );
            if deleted.is_empty() {
                return Err(transition_error(self.target, self.connection, |task| {
                    lifecycle::authorize_delete(task, self.acting)
                })
                .await);
            }

            Ok((task, files))
        })
    }
}

/// Paged task listing, filtered by the acting user's visibility and ordered
/// by the requested policy.
#[derive(Debug)]
pub struct ListTasks<'a> {
    acting: &'a ActingUser,
    view: TaskView,
    ordering: TaskOrdering,
    paging: PagingOptions,
    connection: &'a DatabaseConnection,
}

impl<'a> ListTasks<'a> {
    pub fn new(
        acting: &'a ActingUser,
        view: TaskView,
        ordering: TaskOrdering,
        paging: PagingOptions,
        connection: &'a DatabaseConnection,
    ) -> Self {
        Self {
            acting,
            view,
            ordering,
            paging,
            connection,
        }
    }
}

impl<'a> IntoFuture for ListTasks<'a> {
    type Output = Result<Page<Task>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut conditions = vec![match self.view {
                TaskView::Active => "is_canceled = false",
                TaskView::Canceled => "is_canceled = true",
            }];
            // admins see everything; see lifecycle::visible
            if !self.acting.role.eq(&Role::Admin) {
                conditions.push(match self.view {
                    TaskView::Active => {
                        "(created_by = $acting OR claimed_by = $acting OR claimed_by = NONE)"
                    }
                    TaskView::Canceled => "(created_by = $acting OR claimed_by = $acting)",
                });
            }

            // priority is ranked by the declared enum order, not lexically
            let (projection, order) = match self.ordering {
                TaskOrdering::CreatedAt => ("*".to_owned(), "created_at DESC"),
                TaskOrdering::DueDate => ("*".to_owned(), "due ASC"),
                TaskOrdering::Priority => (
                    format!(
                        "*, array::find_index([{}], priority) AS priority_rank",
                        PRIORITY_ORDER.map(|level| format!("'{level}'")).join(", ")
                    ),
                    "priority_rank DESC",
                ),
            };

            let query = format!(
                "SELECT {projection} FROM task WHERE {} ORDER BY {order} %%%",
                conditions.join(" AND ")
            );

            self.paging
                .execute::<Task>(query, vec![("acting", json!(self.acting.id))], self.connection)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_matches_ranking_array() {
        // the SQL ranking array has to follow the enum declaration order
        let levels = [
            TaskPriority::Low,
            TaskPriority::Medium,
            TaskPriority::High,
            TaskPriority::Urgent,
        ];
        for (rank, level) in levels.iter().enumerate() {
            assert_eq!(PRIORITY_ORDER[rank], level.to_string());
        }
        assert!(TaskPriority::Low < TaskPriority::Medium);
        assert!(TaskPriority::High < TaskPriority::Urgent);
    }
}
