//! In-memory gateway

use async_trait::async_trait;
use funmap_admin::gateway::{GatewayError, SaveGateway};
use funmap_common::api::{GatewayAction, LoadDocument, SaveResponse};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Scripted answer for one action
#[derive(Debug, Clone)]
pub enum Reply {
    Ok,
    Reject(String),
    NetworkDown,
}

pub struct ScriptedGateway {
    document: LoadDocument,
    latency: Option<Duration>,
    replies: Mutex<HashMap<GatewayAction, Reply>>,
    submitted: Mutex<Vec<(GatewayAction, Value)>>,
}

impl ScriptedGateway {
    pub fn new(document: LoadDocument) -> Self {
        Self {
            document,
            latency: None,
            replies: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Every submit sleeps this long (tokio time) before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn reply(&self, action: GatewayAction, reply: Reply) {
        self.replies.lock().insert(action, reply);
    }

    /// Requests received so far, in arrival order
    pub fn submitted(&self) -> Vec<(GatewayAction, Value)> {
        self.submitted.lock().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Body of the last request sent with `action`
    pub fn last_body(&self, action: GatewayAction) -> Option<Value> {
        self.submitted
            .lock()
            .iter()
            .rev()
            .find(|(sent, _)| *sent == action)
            .map(|(_, body)| body.clone())
    }
}

#[async_trait]
impl SaveGateway for ScriptedGateway {
    async fn load(&self) -> Result<LoadDocument, GatewayError> {
        Ok(self.document.clone())
    }

    async fn submit(&self, action: GatewayAction, body: Value) -> Result<SaveResponse, GatewayError> {
        self.submitted.lock().push((action, body));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self.replies.lock().get(&action).cloned().unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => Ok(SaveResponse::ok()),
            Reply::Reject(message) => Ok(SaveResponse::rejected(message)),
            Reply::NetworkDown => Err(GatewayError::Network("connection refused".to_string())),
        }
    }
}
