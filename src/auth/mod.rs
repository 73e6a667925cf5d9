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

use crate::database::definitions::user::{Role, User};
use crate::prelude::*;

pub mod middleware;
pub mod session;

/// The identity a request acts under, resolved once by the session
/// middleware and passed explicitly into every lifecycle decision — the
/// engine never reads ambient state.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct ActingUser {
    pub id: Id,
    pub role: Role,
}

impl From<&User> for ActingUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().clone(),
            role: *user.role(),
        }
    }
}

/// The profile the OAuth provider vouches for after a successful code
/// exchange.
#[derive(Deserialize, Debug, Clone)]
pub struct OAuthProfile {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl OAuthProfile {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.login.clone())
    }

    /// GitHub hides the address for most accounts, so fall back to the
    /// noreply form it reserves per login.
    pub fn email(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| format!("{}@users.noreply.github.com", self.login))
    }
}

#[derive(Deserialize, Debug)]
struct AccessTokenResponse {
    access_token: String,
}

/// Thin client for the provider's OAuth code flow. The protocol itself is
/// the provider's business; we only perform the two documented requests.
#[derive(Clone, Debug, Default)]
pub struct OAuthClient {
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// The URL the login route redirects the browser to.
    pub fn authorize_url(state: &str) -> String {
        format!(
            "https://github.com/login/oauth/authorize?client_id={}&redirect_uri={}/auth/callback&scope=read:user%20user:email&state={}",
            &CONFIGURATION.github_client_id, &CONFIGURATION.public_url, state
        )
    }

    /// Exchanges the callback code for the provider-verified profile.
    #[cfg(not(test))]
    #[instrument(skip_all)]
    pub async fn authenticate(&self, code: &str) -> Result<OAuthProfile> {
        let token = self
            .http
            .post("https://github.com/login/oauth/access_token")
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", CONFIGURATION.github_client_id.as_str()),
                ("client_secret", CONFIGURATION.github_client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|_| ApplicationError::Unauthorized)?
            .json::<AccessTokenResponse>()
            .await
            .map_err(|_| ApplicationError::Unauthorized)?;

        let profile = self
            .http
            .get("https://api.github.com/user")
            .header(reqwest::header::USER_AGENT, "taskdesk")
            .bearer_auth(token.access_token.as_str())
            .send()
            .await?
            .error_for_status()
            .map_err(|_| ApplicationError::Unauthorized)?
            .json::<OAuthProfile>()
            .await
            .map_err(|_| ApplicationError::Unauthorized)?;

        Ok(profile)
    }

    /// Offline stand-in for the test suite: any code authenticates and maps
    /// deterministically onto a provider account.
    #[cfg(test)]
    pub async fn authenticate(&self, code: &str) -> Result<OAuthProfile> {
        let id = code
            .bytes()
            .fold(0i64, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as i64))
            .abs();

        Ok(OAuthProfile {
            id,
            login: code.to_owned(),
            name: Some(code.to_owned()),
            email: None,
        })
    }
}
