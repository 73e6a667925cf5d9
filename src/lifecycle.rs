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

//! The task lifecycle engine: pure decision logic over `(task, acting user)`.
//!
//! Every mutation path in the application funnels through these rules. The
//! database writers consult them to classify a failed conditional update and
//! restate the same precondition inside the update's `WHERE` clause, so a
//! losing concurrent request observes zero affected rows instead of silently
//! overwriting another writer (see [`crate::database::definitions::task`]).

use crate::database::definitions::task::Task;
use crate::database::definitions::user::Role;
use crate::prelude::*;

/// The state of a task, derived from its persisted row. `Completed` and
/// `Canceled` are terminal.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Waiting,
    InProgress,
    Completed,
    Canceled,
}

/// The listing views offered by the task collection.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskView {
    #[default]
    Active,
    Canceled,
}

impl Task {
    pub fn state(&self) -> TaskState {
        if *self.is_canceled() {
            TaskState::Canceled
        } else if *self.completed() {
            TaskState::Completed
        } else if self.claimed_by().is_some() {
            TaskState::InProgress
        } else {
            TaskState::Waiting
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state(), TaskState::Completed | TaskState::Canceled)
    }

    fn is_claimed_by(&self, acting: &ActingUser) -> bool {
        self.claimed_by()
            .as_ref()
            .is_some_and(|claimer| claimer.eq(&acting.id))
    }
}

/// Create guard: the title may not be blank.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(ApplicationError::BadRequest(
            "title may not be blank".to_owned(),
        ));
    }

    Ok(())
}

/// Claim guard: the task has to be unclaimed, non-terminal and not created
/// by the acting user.
pub fn authorize_claim(task: &Task, acting: &ActingUser) -> Result<()> {
    if task.is_terminal() {
        return Err(ApplicationError::Conflict(
            "task is already completed or canceled".to_owned(),
        ));
    }

    if task.claimed_by().is_some() {
        return Err(ApplicationError::Conflict(
            "task is already claimed".to_owned(),
        ));
    }

    if task.created_by().eq(&acting.id) {
        return Err(ApplicationError::Conflict(
            "a task cannot be claimed by its creator".to_owned(),
        ));
    }

    Ok(())
}

/// Edit guard: only the current claimer may mutate the task fields, and only
/// while the task is not terminal. There is no admin bypass.
pub fn authorize_edit(task: &Task, acting: &ActingUser) -> Result<()> {
    if !task.is_claimed_by(acting) {
        return Err(ApplicationError::Forbidden(
            "only the current claimer may edit a task".to_owned(),
        ));
    }

    if task.is_terminal() {
        return Err(ApplicationError::Conflict(
            "task is already completed or canceled".to_owned(),
        ));
    }

    Ok(())
}

/// Complete guard. Completing an already completed task is a no-op, so a
/// repeated request stays safe.
pub fn authorize_complete(task: &Task, acting: &ActingUser) -> Result<()> {
    if !task.is_claimed_by(acting) {
        return Err(ApplicationError::Forbidden(
            "only the current claimer may complete a task".to_owned(),
        ));
    }

    if *task.is_canceled() {
        return Err(ApplicationError::Conflict(
            "task has been canceled".to_owned(),
        ));
    }

    Ok(())
}

/// Cancel guard: claimer only, and never after completion.
pub fn authorize_cancel(task: &Task, acting: &ActingUser) -> Result<()> {
    if !task.is_claimed_by(acting) {
        return Err(ApplicationError::Forbidden(
            "only the current claimer may cancel a task".to_owned(),
        ));
    }

    if *task.completed() {
        return Err(ApplicationError::Conflict(
            "task is already completed".to_owned(),
        ));
    }

    if *task.is_canceled() {
        return Err(ApplicationError::Conflict(
            "task is already canceled".to_owned(),
        ));
    }

    Ok(())
}

/// Delete guard: the current claimer is the only party allowed to remove a
/// task (and with it its attached files).
pub fn authorize_delete(task: &Task, acting: &ActingUser) -> Result<()> {
    if !task.is_claimed_by(acting) {
        return Err(ApplicationError::Forbidden(
            "only the current claimer may delete a task".to_owned(),
        ));
    }

    Ok(())
}

/// Listing filter. Admins see every task. A regular user sees unclaimed
/// tasks plus the ones they created or claimed in the active view, while the
/// canceled view is restricted to tasks they created or claimed.
pub fn visible(task: &Task, acting: &ActingUser, view: TaskView) -> bool {
    let matches_view = match view {
        TaskView::Active => !*task.is_canceled(),
        TaskView::Canceled => *task.is_canceled(),
    };
    if !matches_view {
        return false;
    }

    if acting.role.eq(&Role::Admin) {
        return true;
    }

    let involved = task.created_by().eq(&acting.id) || task.is_claimed_by(acting);
    match view {
        TaskView::Active => involved || task.claimed_by().is_none(),
        TaskView::Canceled => involved,
    }
}
