//! Persistence gateway
//!
//! The editor talks to one endpoint, `<gateway_url>?action=<action>`:
//! a `GET` for the load document and a JSON `POST` per save request.

use async_trait::async_trait;
use funmap_common::api::{GatewayAction, LoadDocument, SaveResponse};
use funmap_common::events::SaveFailureKind;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("funmap-admin/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Gateway errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Request never completed (connection, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered but refused the write
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// Server answered with a body that is not the expected JSON
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// User-facing failure class; a garbled answer still means the server was reached
    pub fn kind(&self) -> SaveFailureKind {
        match self {
            GatewayError::Network(_) => SaveFailureKind::Network,
            GatewayError::Rejected(_) | GatewayError::Decode(_) => SaveFailureKind::Rejected,
        }
    }
}

/// Load/save endpoint used by the session
#[async_trait]
pub trait SaveGateway: Send + Sync {
    /// Fetch the admin document that seeds every baseline
    async fn load(&self) -> Result<LoadDocument, GatewayError>;

    /// Post one save request
    ///
    /// `Ok` carries the server's answer, which may itself be a rejection
    /// (`success: false`).
    async fn submit(&self, action: GatewayAction, body: Value) -> Result<SaveResponse, GatewayError>;
}

/// HTTP implementation over `reqwest`
pub struct HttpGateway {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SaveGateway for HttpGateway {
    async fn load(&self) -> Result<LoadDocument, GatewayError> {
        let action = GatewayAction::GetAdminSettings;
        tracing::debug!(url = %self.base_url, action = action.as_str(), "Loading admin document");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("action", action.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        response
            .json::<LoadDocument>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn submit(&self, action: GatewayAction, body: Value) -> Result<SaveResponse, GatewayError> {
        tracing::debug!(url = %self.base_url, action = action.as_str(), "Submitting save request");

        let response = self
            .http_client
            .post(&self.base_url)
            .query(&[("action", action.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        // Error statuses usually still carry a `{success:false, message}` body
        match serde_json::from_str::<SaveResponse>(&text) {
            Ok(answer) => Ok(answer),
            Err(_) if !status.is_success() => {
                Err(GatewayError::Rejected(format!("HTTP {}: {}", status.as_u16(), text.trim())))
            }
            Err(e) => Err(GatewayError::Decode(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(GatewayError::Network("timeout".into()).kind(), SaveFailureKind::Network);
        assert_eq!(GatewayError::Rejected("no".into()).kind(), SaveFailureKind::Rejected);
        assert_eq!(GatewayError::Decode("<html>".into()).kind(), SaveFailureKind::Rejected);
    }

    #[test]
    fn test_http_gateway_keeps_base_url() {
        let gateway = HttpGateway::new("http://localhost/gateway.php").unwrap();
        assert_eq!(gateway.base_url(), "http://localhost/gateway.php");
    }
}
