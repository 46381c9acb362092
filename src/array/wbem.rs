//! WBEM Client
//!
//! Issues CIM-XML intrinsic method calls to the array's management
//! provider over HTTP(S).

use super::cim::{self, CimOperation, QUERY_LANGUAGE};
use crate::domain::ports::{ArrayManagementClient, CimInstance, ObjectPath};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the WBEM client
#[derive(Debug, Clone)]
pub struct WbemConfig {
    /// Provider base URL, e.g. `http://smis.example:5988`
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// CIM namespace every operation is scoped to
    pub namespace: String,
    /// Verify the provider's TLS certificate
    pub verify_tls: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for WbemConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://192.168.1.1:5988".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            namespace: "root/emc".to_string(),
            verify_tls: false,
            timeout: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// WBEM Client
// =============================================================================

/// CIM-XML client for the array management provider
pub struct WbemClient {
    config: WbemConfig,
    client: Client,
    next_message_id: AtomicU64,
}

impl WbemClient {
    /// Create a new client; no request is made until first use
    pub fn new(config: WbemConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            next_message_id: AtomicU64::new(1001),
        })
    }

    fn url(&self) -> String {
        format!("{}/cimom", self.config.endpoint.trim_end_matches('/'))
    }

    fn connection_error(&self, reason: impl std::fmt::Display) -> Error {
        Error::ArrayConnection {
            endpoint: self.config.endpoint.clone(),
            reason: reason.to_string(),
        }
    }

    /// Send one method call and decode the instances it returns
    #[instrument(skip(self, operation), fields(method = operation.method_name()))]
    async fn invoke(&self, operation: CimOperation<'_>) -> Result<Vec<CimInstance>> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let body = cim::build_request(message_id, &self.config.namespace, &operation)?;

        let response = self
            .client
            .post(self.url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/xml; charset=\"utf-8\"")
            .header("CIMOperation", "MethodCall")
            .header("CIMMethod", operation.method_name())
            .header("CIMObject", cim::encode_namespace(&self.config.namespace))
            .body(body)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.connection_error("authentication rejected by the provider"));
        }
        if !status.is_success() {
            let cim_error = response
                .headers()
                .get("CIMError")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(self.connection_error(format!("HTTP {} {}", status, cim_error)));
        }

        let text = response.text().await.map_err(|e| self.connection_error(e))?;
        let instances = cim::parse_response(&text)?;

        debug!(
            "{} returned {} instances",
            operation.method_name(),
            instances.len()
        );
        Ok(instances)
    }
}

#[async_trait]
impl ArrayManagementClient for WbemClient {
    async fn enumerate_instances(&self, class_name: &str) -> Result<Vec<CimInstance>> {
        self.invoke(CimOperation::EnumerateInstances { class_name })
            .await
    }

    async fn exec_query(&self, query: &str) -> Result<Vec<CimInstance>> {
        self.invoke(CimOperation::ExecQuery {
            query_language: QUERY_LANGUAGE,
            query,
        })
        .await
    }

    async fn associators(&self, path: &ObjectPath, result_class: &str) -> Result<Vec<CimInstance>> {
        self.invoke(CimOperation::Associators {
            object_name: path,
            result_class,
        })
        .await
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}
