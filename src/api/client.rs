//! API client module
//!
//! This module provides HTTP client functionality to interact with a
//! running sprig API server. The CLI is its main consumer.

use std::sync::Arc;

use reqwest::{Client as ReqwestClient, Error as ReqwestError};
use serde::de::DeserializeOwned;

use crate::api::server::{
    AddChildRequest, AddTaskRequest, ApiResponse, MoveTaskRequest, SetDocumentRequest, TaskCreated,
};
use crate::models::{TaskId, Tree};

/// API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),

    #[error("API error: {0}")]
    Api(String),

    #[error("Missing data in response")]
    MissingData,
}

/// Trait defining the API client interface for the sprig service, so the
/// CLI can be driven by a fake in tests.
#[async_trait::async_trait]
pub trait TreeClient {
    /// Get the full tree snapshot
    async fn get_tree(&self) -> Result<Tree, ClientError>;

    /// Get the display projection of the tree
    async fn get_visible_tree(&self, show_completed: bool) -> Result<Tree, ClientError>;

    /// Add a new root task
    async fn add_task(&self, label: String) -> Result<TaskCreated, ClientError>;

    /// Add a child task under an existing task
    async fn add_child(&self, parent_id: TaskId, label: String) -> Result<TaskCreated, ClientError>;

    /// Toggle completion of a task
    async fn toggle_task(&self, id: TaskId) -> Result<Tree, ClientError>;

    /// Replace the document attached to a task
    async fn set_document(&self, id: TaskId, document: String) -> Result<Tree, ClientError>;

    /// Move a task to a new parent (or root level) and position
    async fn move_task(
        &self,
        id: TaskId,
        parent: Option<TaskId>,
        position: usize,
    ) -> Result<Tree, ClientError>;

    /// Remove a task and its subtree
    async fn remove_task(&self, id: TaskId) -> Result<Tree, ClientError>;
}

/// HTTP client for the sprig API
#[derive(Debug, Clone)]
pub struct Client {
    http_client: Arc<ReqwestClient>,
    config: ClientConfig,
}

impl Client {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            http_client: Arc::new(ReqwestClient::new()),
            config,
        }
    }

    /// Unwraps the `{ success, data, error }` envelope
    async fn parse<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let api_response: ApiResponse<T> = response.json().await?;
        if api_response.success {
            api_response.data.ok_or(ClientError::MissingData)
        } else {
            Err(ClientError::Api(
                api_response
                    .error
                    .unwrap_or_else(|| "Unknown API error".to_string()),
            ))
        }
    }
}

#[async_trait::async_trait]
impl TreeClient for Client {
    async fn get_tree(&self) -> Result<Tree, ClientError> {
        let url = format!("{}/api/tree", self.config.base_url);
        let response = self.http_client.get(&url).send().await?;
        self.parse(response).await
    }

    async fn get_visible_tree(&self, show_completed: bool) -> Result<Tree, ClientError> {
        let url = format!(
            "{}/api/tree/visible?show_completed={}",
            self.config.base_url, show_completed
        );
        let response = self.http_client.get(&url).send().await?;
        self.parse(response).await
    }

    async fn add_task(&self, label: String) -> Result<TaskCreated, ClientError> {
        let url = format!("{}/api/tasks", self.config.base_url);
        let request = AddTaskRequest { label };
        let response = self.http_client.post(&url).json(&request).send().await?;
        self.parse(response).await
    }

    async fn add_child(
        &self,
        parent_id: TaskId,
        label: String,
    ) -> Result<TaskCreated, ClientError> {
        let url = format!("{}/api/tasks/{}/children", self.config.base_url, parent_id);
        let request = AddChildRequest { label };
        let response = self.http_client.post(&url).json(&request).send().await?;
        self.parse(response).await
    }

    async fn toggle_task(&self, id: TaskId) -> Result<Tree, ClientError> {
        let url = format!("{}/api/tasks/{}/toggle", self.config.base_url, id);
        let response = self.http_client.post(&url).send().await?;
        self.parse(response).await
    }

    async fn set_document(&self, id: TaskId, document: String) -> Result<Tree, ClientError> {
        let url = format!("{}/api/tasks/{}/document", self.config.base_url, id);
        let request = SetDocumentRequest { document };
        let response = self.http_client.put(&url).json(&request).send().await?;
        self.parse(response).await
    }

    async fn move_task(
        &self,
        id: TaskId,
        parent: Option<TaskId>,
        position: usize,
    ) -> Result<Tree, ClientError> {
        let url = format!("{}/api/tasks/{}/move", self.config.base_url, id);
        let request = MoveTaskRequest { parent, position };
        let response = self.http_client.post(&url).json(&request).send().await?;
        self.parse(response).await
    }

    async fn remove_task(&self, id: TaskId) -> Result<Tree, ClientError> {
        let url = format!("{}/api/tasks/{}", self.config.base_url, id);
        let response = self.http_client.delete(&url).send().await?;
        self.parse(response).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
