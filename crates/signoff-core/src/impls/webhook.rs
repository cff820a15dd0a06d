//! WebhookHandler - イベントを HTTP で配送する EventHandler
//!
//! イベントを JSON にして設定された URL に送る。2xx 以外は失敗扱いで、
//! 再送は EventNotifier 側の RetryPolicy に任せる。

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{FlowError, FlowResult};
use crate::domain::events::Event;
use crate::ports::EventHandler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
    /// HTTP method, "POST" unless set.
    pub method: String,
    pub headers: BTreeMap<String, String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            timeout_ms: 5_000,
        }
    }
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

pub struct WebhookHandler {
    name: String,
    config: WebhookConfig,
    method: Method,
    client: Client,
}

impl WebhookHandler {
    /// # Errors
    /// `Validation` for an empty URL or an unparseable method.
    pub fn new(name: impl Into<String>, config: WebhookConfig) -> FlowResult<Self> {
        if config.url.trim().is_empty() {
            return Err(FlowError::validation("webhook url is required"));
        }
        let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                FlowError::validation(format!("invalid webhook method '{}'", config.method))
            })?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FlowError::validation(format!("webhook client: {e}")))?;

        Ok(Self {
            name: name.into(),
            config,
            method,
            client,
        })
    }
}

#[async_trait]
impl EventHandler for WebhookHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> FlowResult<()> {
        let mut request = self.client.request(self.method.clone(), &self.config.url);
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }
        // json() keeps a content-type that is already set
        let request = request.json(event);

        let response = request
            .send()
            .await
            .map_err(|e| FlowError::Handler(format!("webhook {}: {e}", self.config.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::Handler(format!(
                "webhook {} returned {status}",
                self.config.url
            )));
        }
        Ok(())
    }
}
