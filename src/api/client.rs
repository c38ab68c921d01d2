use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::error::ConsoleError;
use crate::types::{ApiMessage, ChatRequest, StreamOptions};
use crate::util::is_local_endpoint_url;
use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, messages: &[ApiMessage]) -> Result<ByteStream>;
}

#[derive(Clone)]
pub struct ApiClient {
    pub(super) http: reqwest::Client,
    pub(super) api_key: Option<String>,
    model: String,
    api_url: String,
    pub(super) balance_url: String,
    credential_optional: bool,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.api_url.clone(),
            balance_url: config.balance_url.clone(),
            credential_optional: config.credential_optional(),
            #[cfg(test)]
            mock_stream_producer: None,
        })
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: Some("test-key".to_string()),
            model: "mock-model".to_string(),
            api_url: "https://api.invalid/v1/chat/completions".to_string(),
            balance_url: "https://api.invalid/account/balance".to_string(),
            credential_optional: false,
            mock_stream_producer: Some(mock_producer),
        }
    }

    #[cfg(test)]
    pub fn without_key(mut self) -> Self {
        self.api_key = None;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Synchronous credential check done before any network call of a turn.
    pub fn ensure_credential(&self) -> Result<(), ConsoleError> {
        if self.api_key.is_none() && !self.credential_optional {
            return Err(ConsoleError::MissingCredential);
        }
        Ok(())
    }

    /// Opens the streaming response. Cancelling `cancel` while the request is
    /// in flight abandons it; the returned stream itself is polled by the
    /// caller, which checks the token between chunks.
    pub async fn create_stream(
        &self,
        messages: &[ApiMessage],
        cancel: &CancellationToken,
    ) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(messages);
            }
        }

        let body = ChatRequest {
            messages,
            model: &self.model,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        };

        if debug_payload_enabled() {
            emit_debug_payload(&self.api_url, &serde_json::to_value(&body)?);
        }

        let mut request = self
            .http
            .post(&self.api_url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                anyhow::bail!("request to '{}' cancelled", self.api_url);
            }
            response = request.send() => {
                response.map_err(|error| map_api_request_error(error, &self.api_url))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = status.canonical_reason();
            return Err(
                ConsoleError::from_status(status.as_u16(), &body, reason, &self.model).into(),
            );
        }

        let request_url = self.api_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| anyhow::Error::from(map_api_request_error(error, &request_url)))
        });
        Ok(Box::pin(stream))
    }
}

pub(super) fn map_api_request_error(error: reqwest::Error, request_url: &str) -> ConsoleError {
    let message = if error.is_connect() && is_local_endpoint_url(request_url) {
        format!("cannot reach local endpoint: {error}. Start your local server or update PAIRPAD_API_URL.")
    } else if error.is_connect() {
        format!("cannot reach endpoint: {error}")
    } else if error.is_timeout() {
        format!("timed out: {error}")
    } else {
        error.to_string()
    };
    ConsoleError::Transport {
        url: request_url.to_string(),
        message,
    }
}
