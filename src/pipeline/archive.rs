// src/pipeline/archive.rs

//! Bulletin-board collection: the archive sweep and the live catalog poll.
//!
//! The sweep discovers newly finalized threads by diffing the current
//! archive listing against the previous capture, fetches each new thread in
//! full, and only then commits the listing checkpoint. A crash mid-sweep
//! recomputes the same diff next run and re-fetches idempotently
//! (fetch-then-mark-seen).

use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::error::Result;
use crate::models::{ArchiveListing, CatalogRecord, Config};
use crate::pipeline::diff::new_thread_ids;
use crate::services::BoardClient;
use crate::storage::CollectStorage;

/// Summary of one archive sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    /// Newly archived thread ids detected
    pub discovered: usize,
    /// Threads fetched and persisted
    pub fetched: usize,
    /// Threads whose fetch failed (logged and skipped)
    pub failed: usize,
}

/// Fetch the current archive listing and diff it against `previous`.
///
/// Returns the new ids, the parsed current listing, and the raw payload.
pub async fn discover_new_threads(
    client: &dyn BoardClient,
    previous: &ArchiveListing,
) -> Result<(Vec<String>, ArchiveListing, Value)> {
    let raw = client.fetch_archive().await?;
    let current = ArchiveListing::from_payload(Utc::now(), &raw)?;
    let new_ids = new_thread_ids(previous, &current);
    Ok((new_ids, current, raw))
}

/// Run one archive sweep: discover, fetch, persist, commit.
pub async fn run_archive_sweep(
    config: &Config,
    storage: &dyn CollectStorage,
    client: &dyn BoardClient,
) -> Result<SweepOutcome> {
    let platform = config.board.platform.as_str();

    let previous = match storage.load_listing(platform).await? {
        Some(listing) => listing,
        None => {
            log::info!("No previous archive listing for {platform}; bootstrapping full archive");
            ArchiveListing::empty()
        }
    };

    let (new_ids, current, raw) = discover_new_threads(client, &previous).await?;
    storage
        .write_listing_artifact(platform, current.captured_at, &raw)
        .await?;
    log::info!(
        "{platform}: {} archived threads, {} new",
        current.len(),
        new_ids.len()
    );

    let delay = Duration::from_millis(config.board.thread_delay_ms);
    let concurrency = config.http.max_concurrent.max(1);

    let mut outcome = SweepOutcome {
        discovered: new_ids.len(),
        ..SweepOutcome::default()
    };

    // Each fetch is independent: one bad thread must not block the rest.
    let mut fetches = stream::iter(new_ids)
        .map(|id| async move {
            let result = client.fetch_thread(&id).await;
            (id, result)
        })
        .buffer_unordered(concurrency);

    while let Some((id, result)) = fetches.next().await {
        match result {
            Ok(payload) => {
                storage.write_thread(platform, &id, &payload).await?;
                outcome.fetched += 1;
            }
            Err(error) => {
                outcome.failed += 1;
                log::warn!("{platform}: failed to fetch thread {id}: {error}");
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    // Commit only after every new id was attempted, so a crash above simply
    // recomputes the same diff next run.
    storage.store_listing(platform, &current).await?;

    log::info!(
        "{platform}: sweep complete ({} fetched, {} failed)",
        outcome.fetched,
        outcome.failed
    );
    Ok(outcome)
}

/// Poll the live board: capture catalog plus archive as one record.
///
/// Runs on a shorter period than the sweep purely to catch original posts
/// before threads finalize; reply coverage is bounded by the platform's
/// catalog preview.
pub async fn run_catalog_poll(
    config: &Config,
    storage: &dyn CollectStorage,
    client: &dyn BoardClient,
) -> Result<()> {
    let platform = config.board.platform.as_str();

    let catalog = client.fetch_catalog().await?;
    let archive = client.fetch_archive().await?;
    let record = CatalogRecord {
        time: Utc::now().timestamp(),
        catalog,
        archive,
    };

    let path = storage.write_catalog_record(platform, &record).await?;
    log::info!("{platform}: catalog snapshot written to {}", path.display());
    Ok(())
}
