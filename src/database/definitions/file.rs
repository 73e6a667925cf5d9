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
use chrono::{DateTime, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

/// An attachment record. The bytes live in the upload directory, the row
/// only points at them. Owned exclusively by its task: the rows are removed
/// together with the task (see `DeleteTask`).
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Getters)]
#[get = "pub"]
pub struct File {
    id: Id,
    name: String,
    url: String,
    size: u64,
    #[serde(rename = "type")]
    mime: String,
    task: Id,
    created_at: DateTime<Utc>,
}

impl File {
    pub async fn of_task(task: &Id, connection: &DatabaseConnection) -> Result<Vec<File>> {
        Ok(sql_span!(
            connection
                .query("SELECT * FROM file WHERE task = $task ORDER BY created_at ASC")
                .bind(("task", task))
                .await?
                .check()?
                .take::<Vec<File>>(0)?
        ))
    }
}

#[derive(Clone, Debug, Setters)]
#[set = "pub"]
pub struct WriteFile<'a> {
    name: Option<String>,
    url: Option<String>,
    size: Option<u64>,
    mime: Option<String>,
    task: Option<&'a Id>,
    #[getset(skip)]
    connection: &'a DatabaseConnection,
}

impl<'a> From<&'a DatabaseConnection> for WriteFile<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            name: None,
            url: None,
            size: None,
            mime: None,
            task: None,
            connection,
        }
    }
}

impl<'a> IntoFuture for WriteFile<'a> {
    type Output = Result<File>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let task = self
                .task
                .ok_or(ApplicationError::BadRequest("missing task".to_owned()))?;

            let file: Option<File> = sql_span!(
                self.connection
                    .query(
                        "CREATE type::thing('file', $id) CONTENT {
                             name: $name,
                             url: $url,
                             size: $size,
                             \"type\": $mime,
                             task: $task,
                             created_at: time::now()
                         };",
                    )
                    .bind(("id", nanoid::nanoid!()))
                    .bind(("name", self.name))
                    .bind(("url", self.url))
                    .bind(("size", self.size))
                    .bind(("mime", self.mime))
                    .bind(("task", task))
                    .await?
                    .check()?
                    .take::<Option<File>>(0)?
            );

            file.ok_or(ApplicationError::InternalServerError)
        })
    }
}
