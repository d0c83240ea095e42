//! GraphQL client for board bootstrap and file upload.

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::error::{MondayError, MondayResult};
use crate::settings::MondayConfig;

const CREATE_BOARD: &str = "mutation ($name: String!) { \
    create_board(board_name: $name, board_kind: public) { id } }";

const CREATE_GROUP: &str = "mutation ($board: ID!, $name: String!) { \
    create_group(board_id: $board, group_name: $name) { id } }";

const CREATE_FILE_COLUMN: &str = "mutation ($board: ID!, $title: String!) { \
    create_column(board_id: $board, title: $title, description: \"files\", column_type: file) { id } }";

const CREATE_ITEM: &str = "mutation ($board: ID!, $group: String!, $name: String!) { \
    create_item(board_id: $board, group_id: $group, item_name: $name) { id } }";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateBoardData {
    create_board: Created,
}

#[derive(Debug, Deserialize)]
struct CreateGroupData {
    create_group: Created,
}

#[derive(Debug, Deserialize)]
struct CreateColumnData {
    create_column: Created,
}

#[derive(Debug, Deserialize)]
struct CreateItemData {
    create_item: Created,
}

#[derive(Debug, Deserialize)]
struct AddFileData {
    add_file_to_column: Created,
}

/// monday.com API client bound to one user's access token.
#[derive(Clone)]
pub struct MondayClient {
    http: Client,
    api_url: String,
    file_api_url: String,
    token: String,
}

impl MondayClient {
    pub fn new(http: Client, config: &MondayConfig, token: impl Into<String>) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            file_api_url: config.file_api_url.clone(),
            token: token.into(),
        }
    }

    /// Run a GraphQL operation with variables.
    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> MondayResult<T> {
        let response = self
            .http
            .post(&self.api_url)
            .header(AUTHORIZATION, &self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| MondayError::ConnectionFailed {
                url: self.api_url.clone(),
                message: e.to_string(),
            })?;
        parse_graphql(response).await
    }

    /// Create a public board and return its id.
    pub async fn create_board(&self, name: &str) -> MondayResult<String> {
        let data: CreateBoardData = self.execute(CREATE_BOARD, json!({ "name": name })).await?;
        debug!(board_id = %data.create_board.id, "Board created");
        Ok(data.create_board.id)
    }

    pub async fn create_group(&self, board_id: &str, name: &str) -> MondayResult<String> {
        let data: CreateGroupData = self
            .execute(CREATE_GROUP, json!({ "board": board_id, "name": name }))
            .await?;
        Ok(data.create_group.id)
    }

    /// Create a file column titled `title` and return its id.
    pub async fn create_file_column(&self, board_id: &str, title: &str) -> MondayResult<String> {
        let data: CreateColumnData = self
            .execute(CREATE_FILE_COLUMN, json!({ "board": board_id, "title": title }))
            .await?;
        Ok(data.create_column.id)
    }

    pub async fn create_item(
        &self,
        board_id: &str,
        group_id: &str,
        name: &str,
    ) -> MondayResult<String> {
        let data: CreateItemData = self
            .execute(
                CREATE_ITEM,
                json!({ "board": board_id, "group": group_id, "name": name }),
            )
            .await?;
        Ok(data.create_item.id)
    }

    /// Upload `bytes` into the file column of an item.
    ///
    /// Goes through the multipart file endpoint; the file itself is the
    /// `$file` variable.
    pub async fn add_file_to_column(
        &self,
        item_id: &str,
        column_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> MondayResult<String> {
        let query = format!(
            "mutation ($file: File!) {{ add_file_to_column(item_id: {}, column_id: {}, file: $file) {{ id }} }}",
            json!(item_id),
            json!(column_id),
        );
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime.as_ref())?;
        let form = Form::new()
            .text("query", query)
            .part("variables[file]", part);

        let response = self
            .http
            .post(&self.file_api_url)
            .header(AUTHORIZATION, &self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MondayError::ConnectionFailed {
                url: self.file_api_url.clone(),
                message: e.to_string(),
            })?;
        let data: AddFileData = parse_graphql(response).await?;
        Ok(data.add_file_to_column.id)
    }
}

impl std::fmt::Debug for MondayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MondayClient")
            .field("api_url", &self.api_url)
            .field("file_api_url", &self.file_api_url)
            .finish_non_exhaustive()
    }
}

pub(super) async fn check_status(response: Response) -> MondayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(MondayError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn parse_graphql<T: DeserializeOwned>(response: Response) -> MondayResult<T> {
    let body: GraphQlResponse<T> = check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| MondayError::ParseError(e.to_string()))?;

    if !body.errors.is_empty() {
        let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
        return Err(MondayError::GraphQl(messages.join("; ")));
    }
    if let Some(message) = body.error_message {
        return Err(MondayError::GraphQl(message));
    }
    body.data
        .ok_or_else(|| MondayError::ParseError("response carried no data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_errors_are_collected() {
        let body: GraphQlResponse<CreateBoardData> = serde_json::from_str(
            r#"{"errors": [{"message": "a"}, {"message": "b"}], "account_id": 1}"#,
        )
        .unwrap();
        assert!(body.data.is_none());
        assert_eq!(body.errors.len(), 2);
    }

    #[test]
    fn test_board_id_parses() {
        let body: GraphQlResponse<CreateBoardData> =
            serde_json::from_str(r#"{"data": {"create_board": {"id": "12345"}}}"#).unwrap();
        assert_eq!(body.data.unwrap().create_board.id, "12345");
    }
}
