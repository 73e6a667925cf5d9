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

use crate::prelude::*;
use aide::axum::ApiRouter;
use aide::openapi::OpenApi;
use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod extractor;
pub mod openapi;
pub mod task;
pub mod user;

pub async fn router(info: ConnectionInfo) -> Result<Router> {
    let state = ApplicationState::from(info);
    let mut api = OpenApi::default();

    Ok(ApiRouter::new()
        .nest_api_service("/auth", auth::router(state.clone()))
        .nest_api_service("/tasks", task::router(state.clone()))
        .nest_api_service("/users", user::router(state.clone()))
        .nest_api_service("/docs", openapi::router(state.clone()))
        .finish_api_with(&mut api, openapi::transform_api)
        .layer(Extension(Arc::new(api)))
        .layer(CompressionLayer::new().gzip(true))
        .layer(TraceLayer::new_for_http()))
}
