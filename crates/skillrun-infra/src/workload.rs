//! HTTP client for the external workload engine.
//!
//! Speaks a small JSON contract: list a target's declared variables, start
//! an execution, poll its status, and abort it. Engine-side errors are
//! wrapped into `WorkloadError` with enough text for the unit row's
//! drill-down error message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use skillrun_core::engine::workload::{
    WorkloadEngine, WorkloadError, WorkloadOptions, WorkloadStatus, WorkloadVariable,
};
use skillrun_types::skill::OwnerContext;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct VariablesResponse {
    #[serde(default)]
    variables: Vec<WorkloadVariable>,
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    owner_id: String,
    installation_id: String,
    variables: &'a [WorkloadVariable],
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    execution_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl StatusResponse {
    fn into_status(self) -> Result<WorkloadStatus, WorkloadError> {
        match self.state.as_str() {
            "pending" => Ok(WorkloadStatus::Pending),
            "executing" => Ok(WorkloadStatus::Executing),
            "finished" => Ok(WorkloadStatus::Finished {
                output: self.output.unwrap_or(Value::Null),
            }),
            "failed" => Ok(WorkloadStatus::Failed {
                error: self
                    .error
                    .unwrap_or_else(|| "workload failed without detail".to_string()),
            }),
            other => Err(WorkloadError::Request(format!(
                "unknown workload state '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpWorkloadEngine
// ---------------------------------------------------------------------------

/// Workload engine reachable over HTTP.
pub struct HttpWorkloadEngine {
    base_url: String,
    client: reqwest::Client,
    api_token: Option<String>,
}

impl HttpWorkloadEngine {
    /// Create a client for the engine at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            api_token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, WorkloadError> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(WorkloadError::TargetNotFound(
                response.url().path().to_string(),
            ));
        }
        response
            .error_for_status()
            .map_err(|e| WorkloadError::Request(e.to_string()))
    }
}

impl WorkloadEngine for HttpWorkloadEngine {
    async fn variables(
        &self,
        _owner: &OwnerContext,
        target_id: &str,
    ) -> Result<Vec<WorkloadVariable>, WorkloadError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/workflows/{target_id}/variables"),
            )
            .send()
            .await
            .map_err(|e| WorkloadError::Request(e.to_string()))?;

        let body: VariablesResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| WorkloadError::Request(e.to_string()))?;
        Ok(body.variables)
    }

    async fn initialize(
        &self,
        owner: &OwnerContext,
        target_id: &str,
        variables: &[WorkloadVariable],
        options: &WorkloadOptions,
    ) -> Result<String, WorkloadError> {
        let request = StartRequest {
            owner_id: owner.owner_id.to_string(),
            installation_id: owner.installation_id.to_string(),
            variables,
            timeout_secs: options.timeout_secs,
        };

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/workflows/{target_id}/executions"),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkloadError::Request(e.to_string()))?;

        let body: StartResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| WorkloadError::Request(e.to_string()))?;

        tracing::debug!(
            target_id,
            handle = body.execution_id.as_str(),
            "workload execution started"
        );
        Ok(body.execution_id)
    }

    async fn status(&self, handle: &str) -> Result<WorkloadStatus, WorkloadError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/executions/{handle}"))
            .send()
            .await
            .map_err(|e| WorkloadError::Request(e.to_string()))?;

        let body: StatusResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| WorkloadError::Request(e.to_string()))?;
        body.into_status()
    }

    async fn abort(&self, _owner: &OwnerContext, handle: &str) -> Result<(), WorkloadError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/executions/{handle}/abort"),
            )
            .send()
            .await
            .map_err(|e| WorkloadError::Request(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
