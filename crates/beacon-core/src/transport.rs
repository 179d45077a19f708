//! Submission of serialized batches to the collector.
//!
//! The batcher hands a transport an already-encoded JSON body and only
//! cares whether the collector accepted it. [`HttpTransport`] is the real
//! implementation; tests substitute in-memory fakes.

use std::future::Future;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::TransportError;

/// Longest response body kept in a [`TransportError::Status`] diagnostic.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Something that can deliver a batch payload.
///
/// `Ok(())` means the collector acknowledged the batch; anything else is a
/// failed attempt and the events stay queued.
pub trait Transport: Send + Sync + 'static {
    /// Submit one encoded batch.
    fn submit(&self, payload: Vec<u8>) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn submit(&self, payload: Vec<u8>) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).submit(payload)
    }
}

/// Transport that `POST`s each batch as `application/json`.
///
/// Only `200 OK` counts as delivered. Any other status, a connection
/// failure, or a timeout is a failure.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    server_url: String,
}

impl HttpTransport {
    /// Build a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the HTTP client cannot be
    /// constructed (e.g. TLS backend initialization failure).
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Client(format!("{e}")))?;

        Ok(Self {
            client,
            server_url: config.server_url.clone(),
        })
    }

    /// The collector URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

impl Transport for HttpTransport {
    async fn submit(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let bytes = payload.len();
        let response = self
            .client
            .post(&self.server_url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("{e}")))?;

        let status = response.status();
        debug!(
            url = self.server_url,
            status = status.as_u16(),
            bytes = bytes,
            "collector responded"
        );

        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_LEN),
            });
        }

        Ok(())
    }
}

/// Cut `text` to at most `max` bytes on a char boundary.
fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    text.get(..end).unwrap_or_default().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate("oops", 10), "oops");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // 'é' is two bytes; cutting at 3 would split it.
        assert_eq!(truncate("aéb", 2), "a");
        assert_eq!(truncate("abcdef", 3), "abc");
    }

    #[test]
    fn new_uses_configured_url() {
        let config = TransportConfig {
            server_url: "http://127.0.0.1:9/events".to_owned(),
            request_timeout_ms: 0,
        };
        let transport = HttpTransport::new(&config);
        assert!(transport.is_ok());
        assert_eq!(
            transport.map(|t| t.server_url().to_owned()).unwrap_or_default(),
            "http://127.0.0.1:9/events"
        );
    }
}
