//! REST client for the conversation server.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use super::{Conversation, Plan, Store, StoreError, StoreResult};

/// Default address of the conversation server
pub const DEFAULT_BASE_URL: &str = "http://localhost:11436";

/// Kind of record addressed by a request, used to map 404s
#[derive(Clone, Copy)]
enum Record<'a> {
    Conversation(&'a str),
    Plan(&'a str),
    None,
}

/// [`Store`] backed by the conversation server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpStore {
    /// Create a client; an empty `base_url` selects [`DEFAULT_BASE_URL`]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };

        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }

    /// Server address this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        record: Record<'_>,
    ) -> StoreResult<reqwest::Response> {
        let mut request = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            match record {
                Record::Conversation(id) => {
                    return Err(StoreError::ConversationNotFound(id.to_string()))
                }
                Record::Plan(id) => return Err(StoreError::PlanNotFound(id.to_string())),
                Record::None => {}
            }
        }

        if status.as_u16() >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        record: Record<'_>,
    ) -> StoreResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(method, path, body, record).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(format!("failed to read response: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Store for HttpStore {
    async fn create_conversation(&self) -> StoreResult<Conversation> {
        let result: HashMap<String, String> = self
            .send_json::<(), _>(Method::POST, "/conversations", None, Record::None)
            .await?;
        let id = result
            .get("id")
            .cloned()
            .ok_or_else(|| StoreError::Transport("server returned no conversation id".into()))?;
        Ok(Conversation::with_id(id))
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Conversation> {
        self.send_json::<(), _>(
            Method::GET,
            &format!("/conversations/{}", id),
            None,
            Record::Conversation(id),
        )
        .await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        self.send(
            Method::PUT,
            &format!("/conversations/{}", conversation.id),
            Some(conversation),
            Record::Conversation(&conversation.id),
        )
        .await?;
        Ok(())
    }

    async fn update_token_count(&self, id: &str, token_count: usize) -> StoreResult<()> {
        let body = json!({ "token_count": token_count });
        self.send(
            Method::PATCH,
            &format!("/conversations/{}", id),
            Some(&body),
            Record::Conversation(id),
        )
        .await?;
        Ok(())
    }

    async fn get_plan(&self, conversation_id: &str) -> StoreResult<Plan> {
        self.send_json::<(), _>(
            Method::GET,
            &format!("/plans/{}", conversation_id),
            None,
            Record::Plan(conversation_id),
        )
        .await
    }

    async fn create_plan(&self, conversation_id: &str) -> StoreResult<Plan> {
        let body = json!({ "conversation_id": conversation_id });
        let result: HashMap<String, String> = self
            .send_json(Method::POST, "/plans", Some(&body), Record::None)
            .await?;
        let id = result
            .get("id")
            .cloned()
            .ok_or_else(|| StoreError::Transport("server returned no plan id".into()))?;
        Ok(Plan::new(id, conversation_id))
    }

    async fn save_plan(&self, plan: &Plan) -> StoreResult<()> {
        self.send(
            Method::PUT,
            &format!("/plans/{}", plan.id),
            Some(plan),
            Record::Plan(&plan.id),
        )
        .await?;
        Ok(())
    }
}
