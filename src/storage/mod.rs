//! Storage abstractions for collected data.
//!
//! Each collector writes into its own namespace under the data root, keyed
//! by platform and day, so independent collectors never share files. The
//! durable cross-run state (harvest watermarks and the last archive listing)
//! lives in small JSON checkpoint files that are replaced whole.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── checkpoints/
//! │   ├── reddit__comment.json        # Watermark per (platform, content type)
//! │   └── 4chan__listing.json         # Last archive listing
//! ├── reddit/
//! │   └── 2022-06-01/
//! │       └── comment__ab12cd34__20220601T000000__00000.ndjson.gz
//! ├── 4chan/
//! │   ├── catalog/2022-06-01/0615.json.gz
//! │   ├── archive_list/2022-06-01/0615.json.gz
//! │   └── archive_threads/2022-06-01/389214721.json.gz
//! └── twitter/
//!     └── stream/2022-06-01--1.ndjson
//! ```

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::models::{ArchiveListing, CatalogRecord, ContentType, Page, SearchWindow, Watermark};

// Re-export for convenience
pub use local::{LocalStorage, StreamRotator};

/// Trait for collected-data storage backends.
///
/// Artifact writes are atomic (temp file + rename), so a crash mid-write
/// never leaves a truncated artifact behind. Re-running the same window
/// rewrites the same artifact name; an accepted idempotent duplicate.
#[async_trait]
pub trait CollectStorage: Send + Sync {
    /// Persist one fetched page verbatim, one payload per line, gzipped.
    async fn write_page(
        &self,
        platform: &str,
        window: &SearchWindow,
        sequence: u32,
        page: &Page,
    ) -> Result<PathBuf>;

    /// Persist one full thread as a standalone artifact.
    async fn write_thread(&self, platform: &str, thread_id: &str, payload: &Value)
    -> Result<PathBuf>;

    /// Persist a raw archive listing as a point-in-time artifact.
    async fn write_listing_artifact(
        &self,
        platform: &str,
        captured_at: DateTime<Utc>,
        payload: &Value,
    ) -> Result<PathBuf>;

    /// Persist one live-board poll record.
    async fn write_catalog_record(&self, platform: &str, record: &CatalogRecord)
    -> Result<PathBuf>;

    /// Load the committed watermark, if any. Corrupt checkpoints degrade to
    /// `None` (start from the default backfill depth), never to an error.
    async fn load_watermark(
        &self,
        platform: &str,
        content_type: ContentType,
    ) -> Result<Option<Watermark>>;

    /// Replace the committed watermark.
    async fn store_watermark(&self, watermark: &Watermark) -> Result<()>;

    /// Load the previous archive listing, if any. Corrupt checkpoints
    /// degrade to `None` (bootstrap), never to an error.
    async fn load_listing(&self, platform: &str) -> Result<Option<ArchiveListing>>;

    /// Replace the archive listing checkpoint.
    async fn store_listing(&self, platform: &str, listing: &ArchiveListing) -> Result<()>;
}
