//! Inventory HTTP Adapter
//!
//! Reads the datacenter trees from the virtualization management endpoint.
//! A session is opened with basic credentials, the inventory is fetched
//! with the session token, and the session is released at the end of the
//! run.

use super::model::Datacenter;
use crate::domain::ports::InventoryClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

// =============================================================================
// Constants
// =============================================================================

const SESSION_PATH: &str = "/api/session";
const INVENTORY_PATH: &str = "/api/inventory/datacenters";
const SESSION_HEADER: &str = "vmware-api-session-id";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the inventory adapter
#[derive(Debug, Clone)]
pub struct InventoryClientConfig {
    /// Base URL, e.g. `https://vcenter.example:443`
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Verify the endpoint's TLS certificate
    pub verify_tls: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for InventoryClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://192.168.1.2:443".to_string(),
            username: "administrator@vsphere.local".to_string(),
            password: String::new(),
            verify_tls: false,
            timeout: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// HTTP Inventory Client
// =============================================================================

/// Inventory client backed by the management endpoint's REST session API
pub struct HttpInventoryClient {
    config: InventoryClientConfig,
    client: Client,
    session: RwLock<Option<String>>,
}

impl HttpInventoryClient {
    /// Create a new inventory client; no request is made until first use
    pub fn new(config: InventoryClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            session: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn connection_error(&self, reason: impl std::fmt::Display) -> Error {
        Error::InventoryConnection {
            endpoint: self.config.endpoint.clone(),
            reason: reason.to_string(),
        }
    }

    /// Open a session, or reuse the one already open
    #[instrument(skip(self), fields(endpoint = %self.config.endpoint))]
    async fn session_token(&self) -> Result<String> {
        if let Some(token) = self.session.read().await.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .client
            .post(self.url(SESSION_PATH))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(self.connection_error(
                    "could not connect using the configured username and password",
                ));
            }
            status => {
                return Err(self.connection_error(format!("session request returned {}", status)));
            }
        }

        let token: String = response
            .json()
            .await
            .map_err(|e| Error::InventoryResponseParse(format!("session token: {}", e)))?;

        info!("Connected to inventory endpoint {}", self.config.endpoint);
        *self.session.write().await = Some(token.clone());
        Ok(token)
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[instrument(skip(self), fields(endpoint = %self.config.endpoint))]
    async fn datacenters(&self) -> Result<Vec<Datacenter>> {
        let token = self.session_token().await?;

        let response = self
            .client
            .get(self.url(INVENTORY_PATH))
            .header(SESSION_HEADER, token)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        if !response.status().is_success() {
            return Err(self.connection_error(format!(
                "inventory request returned {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| self.connection_error(e))?;
        let datacenters: Vec<Datacenter> = serde_json::from_str(&body)
            .map_err(|e| Error::InventoryResponseParse(e.to_string()))?;

        debug!("Fetched {} datacenters", datacenters.len());
        Ok(datacenters)
    }

    async fn disconnect(&self) -> Result<()> {
        let token = match self.session.write().await.take() {
            Some(token) => token,
            None => return Ok(()),
        };

        let result = self
            .client
            .delete(self.url(SESSION_PATH))
            .header(SESSION_HEADER, token)
            .send()
            .await;

        // Logout failures never fail the run
        if let Err(e) = result {
            warn!("Failed to close inventory session: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = InventoryClientConfig::default();
        assert_eq!(config.username, "administrator@vsphere.local");
        assert!(!config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = HttpInventoryClient::new(InventoryClientConfig {
            endpoint: "https://vcenter.local/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url(SESSION_PATH), "https://vcenter.local/api/session");
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let client = HttpInventoryClient::new(InventoryClientConfig::default()).unwrap();
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let client = HttpInventoryClient::new(InventoryClientConfig {
            endpoint: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        let err = client.datacenters().await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
