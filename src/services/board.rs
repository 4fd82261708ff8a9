// src/services/board.rs

//! Bulletin-board client: live catalog, archive listing, full threads.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::models::BoardSourceConfig;
use crate::services::fetch_json;

/// The bulletin-board upstream.
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// Snapshot of the live board (bounded reply previews).
    async fn fetch_catalog(&self) -> Result<Value>;

    /// Listing of finalized thread ids.
    async fn fetch_archive(&self) -> Result<Value>;

    /// One full thread, including all replies.
    async fn fetch_thread(&self, thread_id: &str) -> Result<Value>;
}

/// HTTP implementation driven by a `BoardSourceConfig`.
pub struct HttpBoardClient {
    client: reqwest::Client,
    config: BoardSourceConfig,
}

impl HttpBoardClient {
    pub fn new(client: reqwest::Client, config: BoardSourceConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl BoardClient for HttpBoardClient {
    async fn fetch_catalog(&self) -> Result<Value> {
        let url = Url::parse(&self.config.catalog_url)?;
        fetch_json(&self.client, url, "catalog").await
    }

    async fn fetch_archive(&self) -> Result<Value> {
        let url = Url::parse(&self.config.archive_url)?;
        fetch_json(&self.client, url, "archive").await
    }

    async fn fetch_thread(&self, thread_id: &str) -> Result<Value> {
        let url = Url::parse(&self.config.thread_url.replace("{thread_id}", thread_id))?;
        fetch_json(&self.client, url, "thread").await
    }
}
