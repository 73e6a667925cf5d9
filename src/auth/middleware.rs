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

use crate::auth::session::Session;
use crate::auth::ActingUser;
use crate::database::definitions::user::{Role, User};
use crate::prelude::*;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

/// Resolves the `session` cookie into the session and its user.
async fn resolve(state: &ApplicationState, jar: &CookieJar) -> Result<(Session, User)> {
    let cookie = jar.get("session").ok_or(ApplicationError::Unauthorized)?;
    let connection = state.connection();

    let session = Session::validate_session(cookie.value(), connection).await?;
    let user = User::fetch(session.user(), connection)
        .await?
        .ok_or(ApplicationError::Unauthorized)?;

    Ok((session, user))
}

pub async fn require_session<B>(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    mut request: Request<B>,
    next: Next<B>,
) -> Response {
    match resolve(&state, &jar).await {
        Ok((session, user)) => {
            let extensions = request.extensions_mut();
            extensions.insert(ActingUser::from(&user));
            extensions.insert(user);
            extensions.insert(session);

            next.run(request).await
        }
        Err(error) => error.into_response(),
    }
}

pub async fn require_admin<B>(
    State(state): State<ApplicationState>,
    jar: CookieJar,
    mut request: Request<B>,
    next: Next<B>,
) -> Response {
    match resolve(&state, &jar).await {
        Ok((session, user)) => {
            if !user.role().eq(&Role::Admin) {
                return ApplicationError::Forbidden("administrators only".to_owned())
                    .into_response();
            }

            let extensions = request.extensions_mut();
            extensions.insert(ActingUser::from(&user));
            extensions.insert(user);
            extensions.insert(session);

            next.run(request).await
        }
        Err(error) => error.into_response(),
    }
}

/// Attaches the session middleware to a route. The `admin` form additionally
/// gates on the admin role.
#[macro_export]
macro_rules! require_session {
    ($state:expr) => {
        axum::middleware::from_fn_with_state(
            $state.clone(),
            $crate::auth::middleware::require_session,
        )
    };
    ($state:expr, admin) => {
        axum::middleware::from_fn_with_state(
            $state.clone(),
            $crate::auth::middleware::require_admin,
        )
    };
}
