// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ops Manager automation config over HTTP.
//!
//! Reads and writes `{base}/api/public/v1.0/groups/{project_id}/automationConfig`.
//! Transient failures (429, 5xx, connection errors) are retried with exponential
//! backoff. Authentication is whatever the supplied [`reqwest::Client`] is configured
//! with.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info};
use url::Url;

use super::AutomationConfigConnection;
use crate::constants::{AUTOMATION_CONFIG_PATH_TEMPLATE, OPS_MANAGER_REQUEST_TIMEOUT_SECS};
use crate::deployment::Deployment;
use crate::errors::ConnectionError;
use crate::metrics;
use crate::retry::{http_backoff, retry_request, ExponentialBackoff};

/// HTTP connection to one Ops Manager project.
#[derive(Debug, Clone)]
pub struct HttpConnection {
    client: Client,
    base_url: Url,
    project_id: String,
    project_name: String,
    org_id: String,
    backoff: ExponentialBackoff,
}

impl HttpConnection {
    /// Connection to project `project_id` on the Ops Manager at `base_url`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::InvalidUrl`] if `base_url` is not an absolute http(s) URL.
    pub fn new(
        client: Client,
        base_url: &str,
        project_id: &str,
        project_name: &str,
        org_id: &str,
    ) -> Result<Self, ConnectionError> {
        let mut url = Url::parse(base_url).map_err(|e| ConnectionError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ConnectionError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) base URL".to_string(),
            });
        }
        // Url::join replaces the last segment unless the path ends with '/'
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url: url,
            project_id: project_id.to_string(),
            project_name: project_name.to_string(),
            org_id: org_id.to_string(),
            backoff: http_backoff(),
        })
    }

    /// A client builder with the default request timeout.
    #[must_use]
    pub fn client_builder() -> reqwest::ClientBuilder {
        Client::builder().timeout(Duration::from_secs(OPS_MANAGER_REQUEST_TIMEOUT_SECS))
    }

    /// Replace the retry schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Ops Manager project id.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// URL of the project's automation config.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::InvalidUrl`] if the project id does not form a valid path.
    pub fn automation_config_url(&self) -> Result<Url, ConnectionError> {
        let path = AUTOMATION_CONFIG_PATH_TEMPLATE.replace("{project_id}", &self.project_id);
        self.base_url
            .join(&path)
            .map_err(|e| ConnectionError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })
    }

    /// The retry schedule, restarted so elapsed time counts from this request.
    fn fresh_backoff(&self) -> ExponentialBackoff {
        let mut backoff = self.backoff.clone();
        backoff.reset();
        backoff
    }

    async fn send(
        &self,
        method: &'static str,
        url: &Url,
        body: Option<&Deployment>,
    ) -> Result<Vec<u8>, ConnectionError> {
        debug!(
            method = %method,
            url = %url,
            project = %self.project_name,
            "HTTP request to Ops Manager"
        );

        let request = match body {
            Some(deployment) => self.client.put(url.clone()).json(deployment),
            None => self.client.get(url.clone()),
        };

        let response = request.send().await.map_err(|source| {
            metrics::record_request(method, "transport");
            ConnectionError::Transport {
                method,
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        metrics::record_request(method, status.as_str());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                method = %method,
                url = %url,
                status = %status,
                error = %body,
                "Ops Manager request failed"
            );
            return Err(ConnectionError::Http {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ConnectionError::Transport {
                method,
                url: url.to_string(),
                source,
            })?;

        debug!(
            method = %method,
            url = %url,
            status = %status,
            response_len = bytes.len(),
            "Ops Manager request successful"
        );
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl AutomationConfigConnection for HttpConnection {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn org_id(&self) -> &str {
        &self.org_id
    }

    async fn read_deployment(&self) -> Result<Deployment, ConnectionError> {
        let url = self.automation_config_url()?;
        let body = retry_request(
            self.fresh_backoff(),
            || self.send("GET", &url, None),
            "read_automation_config",
        )
        .await?;
        Ok(Deployment::from_slice(&body)?)
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), ConnectionError> {
        let url = self.automation_config_url()?;
        retry_request(
            self.fresh_backoff(),
            || self.send("PUT", &url, Some(deployment)),
            "update_automation_config",
        )
        .await?;
        info!(
            project = %self.project_name,
            version = deployment.version().unwrap_or(-1),
            "Updated automation config in Ops Manager"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
