// src/services/stream.rs

//! Streaming subscription client.
//!
//! The upstream pushes newline-delimited JSON items over one long-lived HTTP
//! response. This client splits the chunked body into items; blank
//! keep-alive lines are dropped.

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::StreamConfig;

/// A subscribable streaming upstream.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open one filtered subscription.
    async fn connect(&self, filters: &[String]) -> Result<Box<dyn StreamConnection>>;
}

/// One live subscription.
#[async_trait]
pub trait StreamConnection: Send {
    /// Next pushed item. `Ok(None)` means the upstream closed the stream;
    /// an error means the connection dropped. Both are recoverable by
    /// reconnecting.
    async fn next_item(&mut self) -> Result<Option<Vec<u8>>>;
}

/// HTTP implementation driven by a `StreamConfig`.
pub struct HttpStreamSource {
    client: reqwest::Client,
    config: StreamConfig,
}

impl HttpStreamSource {
    pub fn new(client: reqwest::Client, config: StreamConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn connect(&self, filters: &[String]) -> Result<Box<dyn StreamConnection>> {
        let mut url = Url::parse(&self.config.url)?;
        url.query_pairs_mut()
            .append_pair(&self.config.filter_param, &filters.join(","));

        let mut request = self.client.get(url);
        if let Ok(token) = std::env::var(&self.config.token_env) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(AppError::transient(
                &self.config.platform,
                format!("HTTP {status}"),
            ));
        }
        let response = response.error_for_status()?;

        Ok(Box::new(HttpStreamConnection {
            response,
            buffer: Vec::new(),
        }))
    }
}

struct HttpStreamConnection {
    response: reqwest::Response,
    buffer: Vec<u8>,
}

impl HttpStreamConnection {
    /// Pop the next complete non-blank line from the buffer.
    fn pop_line(&mut self) -> Option<Vec<u8>> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }
}

#[async_trait]
impl StreamConnection for HttpStreamConnection {
    async fn next_item(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.pop_line() {
                return Ok(Some(line));
            }

            match self.response.chunk().await? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => {
                    // Stream closed; hand back a trailing unterminated item.
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(std::mem::take(&mut self.buffer)));
                }
            }
        }
    }
}
