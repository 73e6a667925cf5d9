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

use crate::auth::session::{EndSession, Session, WriteSession};
use crate::auth::OAuthClient;
use crate::database::definitions::user::User;
use crate::error::ApplicationErrorResponse;
use crate::prelude::*;
use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::get;
use axum::Extension;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

pub fn router(state: ApplicationState) -> ApiRouter {
    ApiRouter::new()
        .route("/login", get(login))
        .api_route("/callback", get_with(callback, callback_docs))
        .api_route("/refresh", post_with(refresh, refresh_docs))
        .api_route(
            "/logout",
            post_with(logout, logout_docs).layer(require_session!(state)),
        )
        .with_state(state)
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Getters)]
#[get = "pub"]
pub struct LoginResponse {
    session: Session,
    user: User,
}

fn session_cookie(session: &Session) -> Cookie<'static> {
    Cookie::build("session", session.id.id.clone())
        .path("/")
        .same_site(SameSite::Strict)
        .http_only(true)
        .secure(true)
        .domain(CONFIGURATION.domain.clone())
        .finish()
}

/// Kicks off the OAuth code flow. The anti-forgery state is kept in a short
/// cookie and checked again on the callback.
async fn login(jar: CookieJar) -> (CookieJar, Redirect) {
    let oauth_state = nanoid::nanoid!();
    let url = OAuthClient::authorize_url(oauth_state.as_str());

    let cookie = Cookie::build("oauth_state", oauth_state)
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .secure(true)
        .domain(CONFIGURATION.domain.clone())
        .finish();

    (jar.add(cookie), Redirect::temporary(url.as_str()))
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct CallbackQuery {
    code: String,
    #[allow(dead_code)]
    state: String,
}

async fn callback(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    Query(data): Query<CallbackQuery>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    // reject forged callbacks before touching the provider
    #[cfg(not(test))]
    {
        let expected = jar
            .get("oauth_state")
            .ok_or(ApplicationError::Unauthorized)?;
        if !expected.value().eq(data.state.as_str()) {
            return Err(ApplicationError::Unauthorized);
        }
    }

    let profile = state.oauth().authenticate(data.code.as_str()).await?;
    let user = User::sign_in(&profile, state.connection()).await?;
    let session = WriteSession::new(user.id(), state.connection()).await?;

    let jar = jar
        .add(session_cookie(&session))
        .remove(Cookie::named("oauth_state"));

    Ok((jar, Json(LoginResponse { session, user })))
}

fn callback_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Complete the OAuth code flow and start a new session")
        .summary("OAuth callback")
        .response_with::<200, Json<LoginResponse>, _>(|transform| {
            transform.description("Signed in")
        })
        .response_with::<401, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("The code exchange failed")
        })
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    session: String,
    refresh_token: String,
}

async fn refresh(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    Json(data): Json<RefreshRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let id = Id::try_from(("session", data.session.as_str()))?;
    // fetch directly: an expired session may still carry a valid refresh token
    let session: Option<Session> = sql_span!(state.connection().select(&id).await?);
    let session = session.ok_or(ApplicationError::Unauthorized)?;

    let session = session
        .refresh(data.refresh_token.as_str(), state.connection())
        .await?;
    let user = User::fetch(session.user(), state.connection())
        .await?
        .ok_or(ApplicationError::Unauthorized)?;

    let jar = jar.add(session_cookie(&session));

    Ok((jar, Json(LoginResponse { session, user })))
}

fn refresh_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("Rotate the session using its refresh token")
        .summary("Refresh the session")
        .response_with::<200, Json<LoginResponse>, _>(|transform| {
            transform.description("The rotated session")
        })
        .response_with::<401, Json<ApplicationErrorResponse>, _>(|transform| {
            transform.description("Unknown session or invalid refresh token")
        })
}

async fn logout(
    State(state): State<ApplicationState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    EndSession::new(session.user(), state.connection()).await?;

    Ok((
        jar.remove(Cookie::named("session")),
        StatusCode::NO_CONTENT,
    ))
}

fn logout_docs(transform: TransformOperation) -> TransformOperation {
    transform
        .description("End every session of the signed-in user")
        .summary("Sign out")
        .response_with::<204, (), _>(|transform| transform.description("Signed out"))
}
