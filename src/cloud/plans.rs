use reqwest::Client;
use serde_json::Value;

use crate::error::NodeError;

/// REST client for a cloud account's plan, usage, and lead-enrichment
/// endpoints.
///
/// Thin one-call wrappers over fixed relative paths: no retries, no
/// caching, no pagination. Transport and non-2xx responses surface as
/// [`NodeError::Http`].
pub struct CloudPlanClient {
    base_url: String,
    client: Client,
}

impl CloudPlanClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    /// Retrieves the account's current plan.
    pub async fn get_current_plan(&self) -> Result<Value, NodeError> {
        self.get("user/plan").await
    }

    /// Retrieves the account's current usage counters.
    pub async fn get_current_usage(&self) -> Result<Value, NodeError> {
        self.get("user/usage").await
    }

    /// Submits a lead payload for enrichment.
    pub async fn enrich_lead(&self, payload: &Value) -> Result<Value, NodeError> {
        let response = self
            .client
            .post(self.endpoint("data/lead-enrichment"))
            .json(payload)
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?;
        response.json().await.map_err(http_error)
    }

    async fn get(&self, path: &str) -> Result<Value, NodeError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?;
        response.json().await.map_err(http_error)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn http_error(error: reqwest::Error) -> NodeError {
    NodeError::Http(error.to_string())
}
