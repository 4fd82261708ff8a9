//! Upstream API clients.
//!
//! Each upstream is wrapped behind a small trait so the pipelines can be
//! exercised against scripted fakes:
//! - Keyword search (`SearchClient`)
//! - Bulletin-board catalog/archive/thread endpoints (`BoardClient`)
//! - Streaming subscription (`StreamSource`)

mod board;
mod search;
mod stream;

pub use board::{BoardClient, HttpBoardClient};
pub use search::{HttpSearchClient, SearchClient};
pub use stream::{HttpStreamSource, StreamConnection, StreamSource};

use serde_json::Value;

use crate::error::{AppError, Result};

/// Issue a GET and decode the body as JSON, classifying failures.
///
/// Rate limits and server errors are transient (a later scheduled invocation
/// retries from committed state); an undecodable body is malformed; other
/// non-success statuses are fatal for this invocation.
pub(crate) async fn fetch_json(
    client: &reqwest::Client,
    url: url::Url,
    context: &str,
) -> Result<Value> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if status.as_u16() == 429 || status.is_server_error() {
        return Err(AppError::transient(context, format!("HTTP {status}")));
    }
    let response = response.error_for_status()?;

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| AppError::malformed(context, e))
}
