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

use crate::database::definitions::user::{Role, User, WriteUser};
use crate::prelude::*;
use aide::axum::routing::{get_with, put_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query, State};
use axum::Extension;

pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/me",
            get_with(get_me, get_me_docs).layer(require_session!(state)),
        )
        .api_route(
            "/",
            get_with(get_user_page, get_user_page_docs).layer(require_session!(state, admin)),
        )
        .api_route(
            "/:id/role",
            put_with(put_role, put_role_docs).layer(require_session!(state, admin)),
        )
        .with_state(state)
}

async fn get_me(Extension(user): Extension<User>) -> Result<Json<User>> {
    Ok(Json(user))
}

fn get_me_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Obtain the signed-in user")
        .summary("Who am I")
        .response::<200, Json<User>>()
}

async fn get_user_page(
    State(state): State<ApplicationState>,
    Query(data): Query<PagingOptions>,
) -> Result<Json<Page<User>>> {
    let page = data
        .execute::<User>(
            "SELECT * FROM user ORDER BY created_at ASC %%%".to_owned(),
            vec![],
            state.connection(),
        )
        .await?;

    Ok(Json(page))
}

fn get_user_page_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Obtain a page of all users. Restricted to administrators.")
        .summary("List users")
        .response::<200, Json<Page<User>>>()
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct AssignRoleRequest {
    role: Role,
}

async fn put_role(
    State(state): State<ApplicationState>,
    Path(id): Path<String>,
    Json(data): Json<AssignRoleRequest>,
) -> Result<Json<User>> {
    let id = Id::try_from(("user", id.as_str()))?;
    let user = WriteUser::from(state.connection())
        .set_target(Some(&id))
        .set_role(Some(data.role))
        .to_owned()
        .await?;

    Ok(Json(user))
}

fn put_role_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Assign a role to a user. Restricted to administrators.")
        .summary("Assign a role")
        .response::<200, Json<User>>()
        .response_with::<404, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("Unknown user")
        })
}
