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

use crate::auth::OAuthProfile;
use crate::prelude::*;
use chrono::{DateTime, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

#[derive(
    Deserialize, Serialize, JsonSchema, strum::Display, Debug, Clone, Copy, PartialEq, Eq, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Getters)]
#[get = "pub"]
pub struct User {
    id: Id,
    email: String,
    name: String,
    role: Role,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl User {
    /// Upserts the user record for a verified OAuth profile. The record id is
    /// derived from the provider's stable account id, so repeated sign-ins
    /// converge on the same row. The role is only ever defaulted here, never
    /// overwritten (it is admin-assigned, see [`WriteUser`]).
    #[instrument(skip_all, fields(provider_id = profile.id))]
    pub async fn sign_in(profile: &OAuthProfile, connection: &DatabaseConnection) -> Result<User> {
        let id = Id::new(("user", profile.id.to_string().as_str()));

        let user = sql_span!(
            connection
                .query(
                    "UPDATE $target MERGE { email: $email, name: $name, updated_at: time::now() };
                     UPDATE $target SET role = role ?? 'user', created_at = created_at ?? time::now() RETURN AFTER;",
                )
                .bind(("target", id.to_thing()))
                .bind(("email", profile.email()))
                .bind(("name", profile.display_name()))
                .await?
                .check()?
                .take::<Option<User>>(1)?
        );

        user.ok_or(ApplicationError::InternalServerError)
    }

    pub async fn fetch(id: &Id, connection: &DatabaseConnection) -> Result<Option<User>> {
        Ok(sql_span!(connection.select(id).await?))
    }
}

/// Admin-side mutation of a user record. Currently the only mutable
/// attribute is the role.
#[derive(Clone, Debug, Setters)]
pub struct WriteUser<'a> {
    #[set = "pub"]
    role: Option<Role>,
    #[set = "pub"]
    target: Option<&'a Id>,
    connection: &'a DatabaseConnection,
}

impl<'a> From<&'a DatabaseConnection> for WriteUser<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            role: None,
            target: None,
            connection,
        }
    }
}

impl<'a> IntoFuture for WriteUser<'a> {
    type Output = Result<User>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let target = self
                .target
                .ok_or(ApplicationError::BadRequest("missing target".to_owned()))?;
            let role = self
                .role
                .ok_or(ApplicationError::BadRequest("missing role".to_owned()))?;

            // UPDATE on a record id is an upsert; the guard keeps a typoed
            // target from materializing a phantom row
            let user: Option<User> = sql_span!(
                self.connection
                    .query(
                        "UPDATE $target MERGE { role: $role, updated_at: time::now() } \
                         WHERE email != NONE RETURN AFTER"
                    )
                    .bind(("target", target.to_thing()))
                    .bind(("role", role))
                    .await?
                    .check()?
                    .take::<Option<User>>(0)?
            );

            user.ok_or(ApplicationError::NotFound("unknown user".to_owned()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::OAuthProfile;
    use axum::BoxError;

    #[tokio::test]
    async fn test_sign_in_is_idempotent() -> std::result::Result<(), BoxError> {
        let connection = crate::database::connect(None).await?.connection;
        let profile = OAuthProfile {
            id: 4242,
            login: "octocat".to_owned(),
            name: Some("Octo Cat".to_owned()),
            email: None,
        };

        let user = User::sign_in(&profile, &connection).await?;
        assert_eq!(Role::User, *user.role());
        assert_eq!("Octo Cat", user.name());

        // a promoted user keeps the role across sign-ins
        let promoted = WriteUser::from(&connection)
            .set_target(Some(user.id()))
            .set_role(Some(Role::Admin))
            .to_owned()
            .await?;
        assert_eq!(Role::Admin, *promoted.role());

        let again = User::sign_in(&profile, &connection).await?;
        assert_eq!(user.id(), again.id());
        assert_eq!(Role::Admin, *again.role());
        assert_eq!(user.created_at(), again.created_at());

        Ok(())
    }
}
