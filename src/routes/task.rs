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

use crate::database::definitions::file::{File, WriteFile};
use crate::database::definitions::task::{
    CancelTask, ClaimTask, CompleteTask, DeleteTask, EditTask, ListTasks, Task, TaskOrdering,
    TaskPatch, TaskPriority, WriteTask,
};
use crate::lifecycle::{self, TaskView};
use crate::prelude::*;
use aide::axum::routing::{delete_with, get_with, post_with, put_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Extension;
use base64::Engine;
use chrono::{DateTime, Utc};

pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/",
            post_with(create_task, create_task_docs).layer(require_session!(state)),
        )
        .api_route(
            "/",
            get_with(get_task_page, get_task_page_docs).layer(require_session!(state)),
        )
        .api_route(
            "/",
            put_with(put_task, put_task_docs).layer(require_session!(state)),
        )
        .api_route(
            "/",
            delete_with(delete_task, delete_task_docs).layer(require_session!(state)),
        )
        .api_route(
            "/:id",
            get_with(get_task, get_task_docs).layer(require_session!(state)),
        )
        .api_route(
            "/:id/claim",
            post_with(claim_task, claim_task_docs).layer(require_session!(state)),
        )
        .api_route(
            "/:id/cancel",
            post_with(cancel_task, cancel_task_docs).layer(require_session!(state)),
        )
        .with_state(state)
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct AttachmentUpload {
    name: String,
    #[serde(rename = "type")]
    mime: String,
    /// base64 encoded content
    data: String,
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    title: String,
    description: Option<String>,
    due: Option<DateTime<Utc>>,
    priority: Option<TaskPriority>,
    department: Option<String>,
    customer: Option<String>,
    #[serde(default)]
    attachments: Vec<AttachmentUpload>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Getters)]
#[get = "pub"]
pub struct TaskWithFiles {
    task: Task,
    files: Vec<File>,
}

/// Keeps attachment names safe as path segments.
fn sanitize_name(name: &str) -> String {
    let name = name
        .chars()
        .map(|character| match character {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => character,
            _ => '_',
        })
        .collect::<String>();

    if name.trim_matches(['.', '_'].as_slice()).is_empty() {
        "attachment".to_owned()
    } else {
        name
    }
}

/// Persists the uploaded attachments for a freshly created task. A failing
/// attachment is logged and skipped without rolling the task back.
async fn store_attachments(
    task: &Task,
    attachments: Vec<AttachmentUpload>,
    connection: &DatabaseConnection,
) -> Vec<File> {
    let mut files = Vec::with_capacity(attachments.len());
    let directory =
        std::path::Path::new(CONFIGURATION.upload_dir.as_str()).join(task.id().id.as_str());

    for attachment in attachments {
        let bytes = match base64::engine::general_purpose::STANDARD.decode(attachment.data) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!("Skipping undecodable attachment {}: {}", attachment.name, error);
                continue;
            }
        };

        let name = sanitize_name(attachment.name.as_str());
        // colliding names must not overwrite each other's bytes
        let stored = format!("{}_{}", nanoid::nanoid!(8), name);
        if let Err(error) = tokio::fs::create_dir_all(&directory).await {
            warn!("Unable to create upload directory {:?}: {}", directory, error);
            continue;
        }
        if let Err(error) = tokio::fs::write(directory.join(stored.as_str()), &bytes).await {
            warn!("Unable to store attachment {}: {}", stored, error);
            continue;
        }

        let url = format!(
            "{}/uploads/{}/{}",
            &CONFIGURATION.public_url,
            task.id().id,
            stored
        );
        match WriteFile::from(connection)
            .set_name(Some(name))
            .set_url(Some(url))
            .set_size(Some(bytes.len() as u64))
            .set_mime(Some(attachment.mime))
            .set_task(Some(task.id()))
            .to_owned()
            .await
        {
            Ok(file) => files.push(file),
            Err(error) => warn!("Unable to persist attachment record: {}", error),
        }
    }

    files
}

async fn create_task(
    Extension(acting): Extension<ActingUser>,
    State(state): State<ApplicationState>,
    Json(data): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskWithFiles>)> {
    let task = WriteTask::from(state.connection())
        .set_title(Some(data.title))
        .set_description(data.description)
        .set_due(data.due)
        .set_priority(data.priority)
        .set_department(data.department)
        .set_customer(data.customer)
        .set_created_by(Some(&acting.id))
        .to_owned()
        .await?;

    let files = store_attachments(&task, data.attachments, state.connection()).await;

    Ok((StatusCode::CREATED, Json(TaskWithFiles { task, files })))
}

fn create_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Create a new task in the waiting state, optionally with attachments")
        .summary("Create a new task")
        .response::<201, Json<TaskWithFiles>>()
        .response_with::<400, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The title is blank")
        })
}

#[derive(Deserialize, JsonSchema, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    #[serde(default)]
    sort: TaskOrdering,
    #[serde(default)]
    show: TaskView,
    page: Option<u64>,
    page_size: Option<u64>,
}

async fn get_task_page(
    Extension(acting): Extension<ActingUser>,
    State(state): State<ApplicationState>,
    Query(data): Query<ListTasksQuery>,
) -> Result<Json<Page<Task>>> {
    let mut paging = PagingOptions::default();
    if let Some(page) = data.page {
        paging.page = page;
    }
    if let Some(page_size) = data.page_size {
        paging.page_size = page_size;
    }

    let page = ListTasks::new(&acting, data.show, data.sort, paging, state.connection()).await?;

    Ok(Json(page))
}

fn get_task_page_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description(
            "Obtain a page of tasks visible to the signed-in user, \
             filtered by view and ordered by the requested policy",
        )
        .summary("List tasks")
        .response::<200, Json<Page<Task>>>()
}

async fn get_task(
    Extension(acting): Extension<ActingUser>,
    State(state): State<ApplicationState>,
    Path(id): Path<String>,
) -> Result<Json<TaskWithFiles>> {
    let id = Id::try_from(("task", id.as_str()))?;

    // an invisible task is indistinguishable from a missing one
    let task = Task::fetch(&id, state.connection())
        .await?
        .filter(|task| {
            lifecycle::visible(task, &acting, TaskView::Active)
                || lifecycle::visible(task, &acting, TaskView::Canceled)
        })
        .ok_or(ApplicationError::NotFound("unknown task".to_owned()))?;
    let files = File::of_task(&id, state.connection()).await?;

    Ok(Json(TaskWithFiles { task, files }))
}

fn get_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Obtain a single task together with its attachments")
        .summary("Get a task")
        .response::<200, Json<TaskWithFiles>>()
        .response_with::<404, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The task does not exist or is not visible")
        })
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct UpdateTaskRequest {
    id: String,
    completed: Option<bool>,
    #[serde(flatten)]
    patch: TaskPatch,
}

async fn put_task(
    Extension(acting): Extension<ActingUser>,
    State(state): State<ApplicationState>,
    Json(data): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    let id = Id::try_from(("task", data.id.as_str()))?;

    if data.patch.is_empty() && data.completed.is_none() {
        return Err(ApplicationError::BadRequest("nothing to update".to_owned()));
    }
    if let Some(false) = data.completed {
        return Err(ApplicationError::BadRequest(
            "a completed task cannot be reopened".to_owned(),
        ));
    }

    let mut task = None;
    if !data.patch.is_empty() {
        task = Some(EditTask::new(&id, &acting, data.patch, state.connection()).await?);
    }
    if data.completed.is_some() {
        task = Some(CompleteTask::new(&id, &acting, state.connection()).await?);
    }

    task.map(Json).ok_or(ApplicationError::InternalServerError)
}

fn put_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description(
            "Update the fields of a claimed task and/or mark it as completed. \
             Only the current claimer may do either.",
        )
        .summary("Update a task")
        .response::<200, Json<Task>>()
        .response_with::<403, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The signed-in user is not the current claimer")
        })
        .response_with::<409, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The task is in a terminal state")
        })
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct DeleteTaskRequest {
    id: String,
}

async fn delete_task(
    Extension(acting): Extension<ActingUser>,
    State(state): State<ApplicationState>,
    Json(data): Json<DeleteTaskRequest>,
) -> Result<StatusCode> {
    let id = Id::try_from(("task", data.id.as_str()))?;
    let (task, _files) = DeleteTask::new(&id, &acting, state.connection()).await?;

    // the rows are gone, the bytes on disk are best-effort cleanup
    let directory =
        std::path::Path::new(CONFIGURATION.upload_dir.as_str()).join(task.id().id.as_str());
    if let Err(error) = tokio::fs::remove_dir_all(&directory).await {
        if error.kind() != std::io::ErrorKind::NotFound {
            warn!("Unable to remove upload directory {:?}: {}", directory, error);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

fn delete_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Remove a claimed task together with its attachments")
        .summary("Delete a task")
        .response_with::<204, (), _>(|transform| transform.description("The task is gone"))
        .response_with::<403, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The signed-in user is not the current claimer")
        })
}

async fn claim_task(
    Extension(acting): Extension<ActingUser>,
    State(state): State<ApplicationState>,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    let id = Id::try_from(("task", id.as_str()))?;
    let task = ClaimTask::new(&id, &acting, state.connection()).await?;

    Ok(Json(task))
}

fn claim_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description(
            "Claim an unclaimed task. Of any number of concurrent claimants \
             at most one wins, the others receive a conflict.",
        )
        .summary("Claim a task")
        .response::<200, Json<Task>>()
        .response_with::<409, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The task is already claimed, terminal or self-created")
        })
}

async fn cancel_task(
    Extension(acting): Extension<ActingUser>,
    State(state): State<ApplicationState>,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    let id = Id::try_from(("task", id.as_str()))?;
    let task = CancelTask::new(&id, &acting, state.connection()).await?;

    Ok(Json(task))
}

fn cancel_task_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Cancel a claimed task. Canceling is terminal and claimer-only.")
        .summary("Cancel a task")
        .response::<200, Json<Task>>()
        .response_with::<409, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The task is already completed or canceled")
        })
}

#[cfg(test)]
mod tests {
    use super::TaskWithFiles;
    use crate::database::definitions::task::Task;
    use crate::prelude::Page;
    use crate::tests::TestSuite;
    use axum::http::StatusCode;
    use axum::BoxError;

    #[tokio::test]
    async fn test_create() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let login = suite.login("alice").await;

        let response = suite
            .client()
            .post("/tasks")
            .header("Cookie", suite.cookie(&login))
            .json(&json!({
                "title": "Replace toner",
                "description": "Printer on the second floor",
                "priority": "high",
                "department": "IT",
            }))
            .send()
            .await;
        assert_eq!(StatusCode::CREATED, response.status());

        let created = response.json::<TaskWithFiles>().await;
        assert_eq!("Replace toner", created.task().title());
        assert_eq!(login.user().id(), created.task().created_by());
        assert!(created.task().claimed_by().is_none());

        let fetched: Option<Task> = suite.connection().select(created.task().id()).await?;
        assert_eq!(Some(created.task()), fetched.as_ref());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let login = suite.login("alice").await;

        let response = suite
            .client()
            .post("/tasks")
            .header("Cookie", suite.cookie(&login))
            .json(&json!({ "title": "   " }))
            .send()
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_with_attachments() -> Result<(), BoxError> {
        use base64::Engine;

        let suite = TestSuite::init().await?;
        let login = suite.login("alice").await;

        let data = base64::engine::general_purpose::STANDARD.encode(b"hello attachment");
        let response = suite
            .client()
            .post("/tasks")
            .header("Cookie", suite.cookie(&login))
            .json(&json!({
                "title": "Review contract",
                "attachments": [
                    { "name": "contract.pdf", "type": "application/pdf", "data": data },
                    { "name": "not base64", "type": "text/plain", "data": "%%%" },
                ],
            }))
            .send()
            .await;
        assert_eq!(StatusCode::CREATED, response.status());

        // the broken upload is skipped, the good one persisted
        let created = response.json::<TaskWithFiles>().await;
        assert_eq!(1, created.files().len());
        let file = created.files().first().unwrap();
        assert_eq!("contract.pdf", file.name());
        assert_eq!("application/pdf", file.mime());
        assert_eq!(16, *file.size());

        Ok(())
    }

    #[tokio::test]
    async fn test_attachments_with_colliding_names_stay_distinct() -> Result<(), BoxError> {
        use base64::Engine;

        let suite = TestSuite::init().await?;
        let login = suite.login("alice").await;

        // both names sanitize to "a_b.txt"
        let first = base64::engine::general_purpose::STANDARD.encode(b"first");
        let second = base64::engine::general_purpose::STANDARD.encode(b"second bytes");
        let response = suite
            .client()
            .post("/tasks")
            .header("Cookie", suite.cookie(&login))
            .json(&json!({
                "title": "Compare drafts",
                "attachments": [
                    { "name": "a b.txt", "type": "text/plain", "data": first },
                    { "name": "a?b.txt", "type": "text/plain", "data": second },
                ],
            }))
            .send()
            .await;
        assert_eq!(StatusCode::CREATED, response.status());

        let created = response.json::<TaskWithFiles>().await;
        assert_eq!(2, created.files().len());
        // each row keeps its own bytes under a distinct stored name
        assert_ne!(created.files()[0].url(), created.files()[1].url());
        assert_eq!(5, *created.files()[0].size());
        assert_eq!(12, *created.files()[1].size());

        Ok(())
    }

    #[tokio::test]
    async fn test_claim() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let creator = suite.login("alice").await;
        let claimer = suite.login("bob").await;

        let task = suite.create_task(&creator, "Fix printer").await;

        // the creator may not claim their own task
        let response = suite
            .client()
            .post(format!("/tasks/{}/claim", task.id().id).as_str())
            .header("Cookie", suite.cookie(&creator))
            .send()
            .await;
        assert_eq!(StatusCode::CONFLICT, response.status());

        let response = suite
            .client()
            .post(format!("/tasks/{}/claim", task.id().id).as_str())
            .header("Cookie", suite.cookie(&claimer))
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());
        let claimed = response.json::<Task>().await;
        assert_eq!(Some(claimer.user().id()), claimed.claimed_by().as_ref());

        // a second claimant loses
        let loser = suite.login("carol").await;
        let response = suite
            .client()
            .post(format!("/tasks/{}/claim", task.id().id).as_str())
            .header("Cookie", suite.cookie(&loser))
            .send()
            .await;
        assert_eq!(StatusCode::CONFLICT, response.status());

        Ok(())
    }

    #[tokio::test]
    async fn test_edit_is_claimer_only() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let creator = suite.login("alice").await;
        let claimer = suite.login("bob").await;

        let task = suite.create_task(&creator, "Fix printer").await;
        suite.claim_task(&claimer, &task).await;

        // the creator lost edit rights with the claim
        let response = suite
            .client()
            .put("/tasks")
            .header("Cookie", suite.cookie(&creator))
            .json(&json!({ "id": task.id().id, "title": "Hijacked" }))
            .send()
            .await;
        assert_eq!(StatusCode::FORBIDDEN, response.status());

        let response = suite
            .client()
            .put("/tasks")
            .header("Cookie", suite.cookie(&claimer))
            .json(&json!({ "id": task.id().id, "title": "Fix printer (2nd floor)", "priority": "urgent" }))
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());
        let edited = response.json::<Task>().await;
        assert_eq!("Fix printer (2nd floor)", edited.title());

        // an empty update is rejected outright
        let response = suite
            .client()
            .put("/tasks")
            .header("Cookie", suite.cookie(&claimer))
            .json(&json!({ "id": task.id().id }))
            .send()
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let creator = suite.login("alice").await;
        let claimer = suite.login("bob").await;

        let task = suite.create_task(&creator, "Fix printer").await;
        suite.claim_task(&claimer, &task).await;

        let complete = json!({ "id": task.id().id, "completed": true });
        let response = suite
            .client()
            .put("/tasks")
            .header("Cookie", suite.cookie(&claimer))
            .json(&complete)
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());
        assert!(*response.json::<Task>().await.completed());

        // completing twice is a safe no-op
        let response = suite
            .client()
            .put("/tasks")
            .header("Cookie", suite.cookie(&claimer))
            .json(&complete)
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());

        // reopening is not a thing
        let response = suite
            .client()
            .put("/tasks")
            .header("Cookie", suite.cookie(&claimer))
            .json(&json!({ "id": task.id().id, "completed": false }))
            .send()
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());

        // and neither is canceling afterwards
        let response = suite
            .client()
            .post(format!("/tasks/{}/cancel", task.id().id).as_str())
            .header("Cookie", suite.cookie(&claimer))
            .send()
            .await;
        assert_eq!(StatusCode::CONFLICT, response.status());

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let creator = suite.login("alice").await;
        let claimer = suite.login("bob").await;

        let task = suite.create_task(&creator, "Fix printer").await;
        suite.claim_task(&claimer, &task).await;

        // cancel is claimer-only
        let response = suite
            .client()
            .post(format!("/tasks/{}/cancel", task.id().id).as_str())
            .header("Cookie", suite.cookie(&creator))
            .send()
            .await;
        assert_eq!(StatusCode::FORBIDDEN, response.status());

        let response = suite
            .client()
            .post(format!("/tasks/{}/cancel", task.id().id).as_str())
            .header("Cookie", suite.cookie(&claimer))
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());
        assert!(*response.json::<Task>().await.is_canceled());

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_cascades() -> Result<(), BoxError> {
        use crate::database::definitions::file::File;
        use base64::Engine;

        let suite = TestSuite::init().await?;
        let creator = suite.login("alice").await;
        let claimer = suite.login("bob").await;

        let data = base64::engine::general_purpose::STANDARD.encode(b"bytes");
        let response = suite
            .client()
            .post("/tasks")
            .header("Cookie", suite.cookie(&creator))
            .json(&json!({
                "title": "Shred documents",
                "attachments": [{ "name": "list.txt", "type": "text/plain", "data": data }],
            }))
            .send()
            .await;
        let created = response.json::<TaskWithFiles>().await;
        suite.claim_task(&claimer, created.task()).await;

        // only the claimer may delete
        let response = suite
            .client()
            .delete("/tasks")
            .header("Cookie", suite.cookie(&creator))
            .json(&json!({ "id": created.task().id().id }))
            .send()
            .await;
        assert_eq!(StatusCode::FORBIDDEN, response.status());

        let response = suite
            .client()
            .delete("/tasks")
            .header("Cookie", suite.cookie(&claimer))
            .json(&json!({ "id": created.task().id().id }))
            .send()
            .await;
        assert_eq!(StatusCode::NO_CONTENT, response.status());

        // no task and no orphaned file rows are left behind
        let task: Option<Task> = suite.connection().select(created.task().id()).await?;
        assert!(task.is_none());
        let files = File::of_task(created.task().id(), suite.connection()).await?;
        assert!(files.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_get_respects_visibility() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let creator = suite.login("alice").await;
        let claimer = suite.login("bob").await;
        let stranger = suite.login("carol").await;

        let task = suite.create_task(&creator, "Fix printer").await;
        suite.claim_task(&claimer, &task).await;

        // a claimed task disappears for uninvolved users
        let response = suite
            .client()
            .get(format!("/tasks/{}", task.id().id).as_str())
            .header("Cookie", suite.cookie(&stranger))
            .send()
            .await;
        assert_eq!(StatusCode::NOT_FOUND, response.status());

        let response = suite
            .client()
            .get(format!("/tasks/{}", task.id().id).as_str())
            .header("Cookie", suite.cookie(&creator))
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());

        Ok(())
    }

    #[tokio::test]
    async fn test_list_visibility_and_views() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let creator = suite.login("alice").await;
        let claimer = suite.login("bob").await;
        let stranger = suite.login("carol").await;

        let open = suite.create_task(&creator, "Open task").await;
        let claimed = suite.create_task(&creator, "Claimed task").await;
        suite.claim_task(&claimer, &claimed).await;
        let canceled = suite.create_task(&creator, "Canceled task").await;
        suite.claim_task(&claimer, &canceled).await;
        suite
            .client()
            .post(format!("/tasks/{}/cancel", canceled.id().id).as_str())
            .header("Cookie", suite.cookie(&claimer))
            .send()
            .await;

        // a stranger only sees the unclaimed task
        let response = suite
            .client()
            .get("/tasks")
            .header("Cookie", suite.cookie(&stranger))
            .send()
            .await;
        let page = response.json::<Page<Task>>().await;
        assert_eq!(1, page.total);
        assert_eq!(open.id(), page.data.first().unwrap().id());

        // the creator sees both active tasks, but not the canceled one
        let response = suite
            .client()
            .get("/tasks")
            .header("Cookie", suite.cookie(&creator))
            .send()
            .await;
        assert_eq!(2, response.json::<Page<Task>>().await.total);

        // the canceled view carries it for the involved parties only
        let response = suite
            .client()
            .get("/tasks?show=canceled")
            .header("Cookie", suite.cookie(&creator))
            .send()
            .await;
        let page = response.json::<Page<Task>>().await;
        assert_eq!(1, page.total);
        assert_eq!(canceled.id(), page.data.first().unwrap().id());

        let response = suite
            .client()
            .get("/tasks?show=canceled")
            .header("Cookie", suite.cookie(&stranger))
            .send()
            .await;
        assert_eq!(0, response.json::<Page<Task>>().await.total);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_orders_by_priority() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let login = suite.login("alice").await;

        for (title, priority) in [("low", "low"), ("urgent", "urgent"), ("medium", "medium")] {
            suite
                .client()
                .post("/tasks")
                .header("Cookie", suite.cookie(&login))
                .json(&json!({ "title": title, "priority": priority }))
                .send()
                .await;
        }

        let response = suite
            .client()
            .get("/tasks?sort=priority")
            .header("Cookie", suite.cookie(&login))
            .send()
            .await;
        let page = response.json::<Page<Task>>().await;

        // enum order, not lexical: urgent > medium > low
        let titles = page
            .data
            .iter()
            .map(|task| task.title().as_str())
            .collect::<Vec<_>>();
        assert_eq!(vec!["urgent", "medium", "low"], titles);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_orders_by_due_date() -> Result<(), BoxError> {
        use chrono::{Duration, Utc};

        let suite = TestSuite::init().await?;
        let login = suite.login("alice").await;

        for (title, due) in [
            ("later", Some(Utc::now() + Duration::days(7))),
            ("undated", None),
            ("soon", Some(Utc::now() + Duration::days(1))),
        ] {
            let response = suite
                .client()
                .post("/tasks")
                .header("Cookie", suite.cookie(&login))
                .json(&json!({ "title": title, "due": due }))
                .send()
                .await;
            assert_eq!(StatusCode::CREATED, response.status());
        }

        let response = suite
            .client()
            .get("/tasks?sort=dueDate")
            .header("Cookie", suite.cookie(&login))
            .send()
            .await;
        let page = response.json::<Page<Task>>().await;
        assert_eq!(3, page.total);

        // dated tasks ascend by due date; the undated one is still listed
        let titles = page
            .data
            .iter()
            .map(|task| task.title().as_str())
            .collect::<Vec<_>>();
        let soon = titles.iter().position(|title| *title == "soon").unwrap();
        let later = titles.iter().position(|title| *title == "later").unwrap();
        assert!(soon < later);
        assert!(titles.contains(&"undated"));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_defaults_to_newest_first() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let login = suite.login("alice").await;

        for title in ["first", "second", "third"] {
            suite.create_task(&login, title).await;
        }

        let response = suite
            .client()
            .get("/tasks")
            .header("Cookie", suite.cookie(&login))
            .send()
            .await;
        let page = response.json::<Page<Task>>().await;

        let titles = page
            .data
            .iter()
            .map(|task| task.title().as_str())
            .collect::<Vec<_>>();
        assert_eq!(vec!["third", "second", "first"], titles);

        Ok(())
    }
}
