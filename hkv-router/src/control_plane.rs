//! HTTP client for the external control plane: API-key verification and
//! tenant -> node port resolution. Both calls are read-only GETs with a
//! 5-second hard timeout; a timeout or any non-2xx response is treated as
//! a failure, never an authentication.

use std::time::Duration;

use serde::Deserialize;

use hkv_common::{HkvError, HkvResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TenantResponse {
    node_port: u16,
    host: String,
}

pub struct ControlPlaneClient {
    base_url: String,
    http: reqwest::Client,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client config is valid");
        ControlPlaneClient {
            base_url: base_url.into(),
            http,
        }
    }

    /// Returns `Ok(Some(tenant_id))` on a verified key, `Ok(None)` when the
    /// control plane reports the key invalid, and `Err` only for transport
    /// failures (including timeout) — never an authentication result.
    pub async fn verify_key(&self, api_key: &str) -> HkvResult<Option<String>> {
        let url = format!("{}/api/verify", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|err| HkvError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|err| HkvError::Transport(err.to_string()))?;
        Ok(body.tenant_id.filter(|id| !id.is_empty()))
    }

    /// Resolves a tenant's backend host/port via the authoritative
    /// control-plane call — never a hash of the tenant id.
    pub async fn tenant_endpoint(&self, tenant_id: &str) -> HkvResult<(String, u16)> {
        let url = format!("{}/api/tenants/{}", self.base_url, tenant_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| HkvError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(HkvError::NotFound(format!("tenant {tenant_id}")));
        }

        let body: TenantResponse = response
            .json()
            .await
            .map_err(|err| HkvError::Transport(err.to_string()))?;
        Ok((body.host, body.node_port))
    }
}
