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

use crate::database::definitions::task::Task;
use crate::database::definitions::user::{Role, WriteUser};
use crate::prelude::DatabaseConnection;
use crate::routes::auth::LoginResponse;
use crate::routes::task::TaskWithFiles;
use axum::http::StatusCode;
use axum::BoxError;
use axum_test_helper::TestClient;

/// One suite per test: a throwaway database plus a client against the full
/// router. Sign-ins run through the offline OAuth stub, so any code acts as
/// a distinct provider account.
#[derive(Getters)]
#[get = "pub"]
pub struct TestSuite {
    client: TestClient,
    connection: DatabaseConnection,
}

impl TestSuite {
    pub async fn init() -> Result<Self, BoxError> {
        let info = crate::database::connect(None).await?;
        let connection = info.connection.clone();
        let client = TestClient::new(crate::routes::router(info).await?);

        Ok(Self { client, connection })
    }

    pub async fn login(&self, code: &str) -> LoginResponse {
        let response = self
            .client
            .get(format!("/auth/callback?code={code}&state=test").as_str())
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());

        response.json::<LoginResponse>().await
    }

    /// Signs in and promotes the account to admin. The middleware re-reads
    /// the user per request, so the promotion is effective immediately.
    pub async fn login_admin(&self, code: &str) -> LoginResponse {
        let login = self.login(code).await;
        WriteUser::from(&self.connection)
            .set_target(Some(login.user().id()))
            .set_role(Some(Role::Admin))
            .to_owned()
            .await
            .unwrap();

        login
    }

    pub fn cookie(&self, login: &LoginResponse) -> String {
        format!("session={}", login.session().id.id)
    }

    pub async fn create_task(&self, login: &LoginResponse, title: &str) -> Task {
        let response = self
            .client
            .post("/tasks")
            .header("Cookie", self.cookie(login))
            .json(&json!({ "title": title }))
            .send()
            .await;
        assert_eq!(StatusCode::CREATED, response.status());

        response.json::<TaskWithFiles>().await.task().clone()
    }

    pub async fn claim_task(&self, login: &LoginResponse, task: &Task) -> Task {
        let response = self
            .client
            .post(format!("/tasks/{}/claim", task.id().id).as_str())
            .header("Cookie", self.cookie(login))
            .send()
            .await;
        assert_eq!(StatusCode::OK, response.status());

        response.json::<Task>().await
    }
}
