//! REST client for origin pools in one XC configuration namespace.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::xc::types::OriginPool;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues origin-pool reads and writes, each addressed by canonical name and
/// authenticated per request. Cheap to clone; the underlying HTTP client is
/// shared.
#[derive(Clone)]
pub struct OriginPoolClient {
    http: reqwest::Client,
    api_domain: String,
    namespace: String,
    token: String,
}

impl OriginPoolClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_domain: config.api_domain.clone(),
            namespace: config.xc_namespace.clone(),
            token: config.xc_token.clone(),
        })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/api/config/namespaces/{}/origin_pools",
            self.api_domain, self.namespace
        )
    }

    fn item_url(&self, name: &str) -> String {
        format!("{}/{}", self.collection_url(), name)
    }

    fn auth_value(&self) -> String {
        format!("APIToken {}", self.token)
    }

    /// Point-in-time existence check. 200 means present, 404 means absent;
    /// any other status is an error and existence must not be inferred from
    /// it.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let response = self
            .http
            .get(self.item_url(name))
            .header(AUTHORIZATION, self.auth_value())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(api_error("read", name, status, response).await),
        }
    }

    pub async fn create(&self, pool: &OriginPool) -> Result<()> {
        // Serialized up front so a marshalling failure never reaches the API.
        let body = serde_json::to_vec(pool)?;
        debug!("POST {}", self.collection_url());
        let response = self
            .http
            .post(self.collection_url())
            .header(AUTHORIZATION, self.auth_value())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        ok_or_status("create", &pool.metadata.name, response).await
    }

    /// Full replacement of the pool addressed by `name`.
    pub async fn update(&self, name: &str, pool: &OriginPool) -> Result<()> {
        let body = serde_json::to_vec(pool)?;
        debug!("PUT {}", self.item_url(name));
        let response = self
            .http
            .put(self.item_url(name))
            .header(AUTHORIZATION, self.auth_value())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        ok_or_status("update", name, response).await
    }

    /// Unconditional removal: `fail_if_referred` is always false, so pools
    /// still referenced by load balancers are deleted anyway. A 404 surfaces
    /// like any other non-2xx; the caller decides whether it matters.
    pub async fn delete(&self, name: &str) -> Result<()> {
        debug!("DELETE {}", self.item_url(name));
        let body = json!({
            "fail_if_referred": false,
            "name": name,
            "namespace": self.namespace,
        });
        let response = self
            .http
            .delete(self.item_url(name))
            .header(AUTHORIZATION, self.auth_value())
            .json(&body)
            .send()
            .await?;
        ok_or_status("delete", name, response).await
    }
}

async fn ok_or_status(operation: &'static str, name: &str, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(api_error(operation, name, status, response).await)
}

async fn api_error(
    operation: &'static str,
    name: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> Error {
    let body = response.text().await.unwrap_or_default();
    Error::ApiError {
        operation,
        name: name.to_string(),
        status,
        body,
    }
}
