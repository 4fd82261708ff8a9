// src/pipeline/harvest.rs

//! Windowed search harvesting.
//!
//! Each run walks a time window forward one page at a time. A page is
//! persisted before the watermark advances, so a crash at any point loses at
//! most the in-flight page; the next run re-fetches it from the committed
//! watermark and re-persists it (an accepted idempotent duplicate). The
//! advance sets the lower bound one second past the newest item seen, which
//! excludes already-collected items from the next page without a seen-set.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, ContentType, SearchWindow, Watermark};
use crate::services::SearchClient;
use crate::storage::CollectStorage;
use crate::utils::time::backfill_start;

/// Summary of one harvest run.
#[derive(Debug, Clone, Copy)]
pub struct HarvestOutcome {
    /// The resumption point for the next run
    pub final_watermark: DateTime<Utc>,
    /// Pages persisted
    pub pages: u32,
    /// Items persisted
    pub items: usize,
}

/// The windowed search harvester.
pub struct Harvester<'a> {
    client: &'a dyn SearchClient,
    storage: &'a dyn CollectStorage,
    platform: String,
    max_pages: u32,
    request_delay: Duration,
}

impl<'a> Harvester<'a> {
    pub fn new(
        client: &'a dyn SearchClient,
        storage: &'a dyn CollectStorage,
        platform: impl Into<String>,
        max_pages: u32,
        request_delay: Duration,
    ) -> Self {
        Self {
            client,
            storage,
            platform: platform.into(),
            max_pages,
            request_delay,
        }
    }

    /// Harvest from `start` until the window drains, the stop watermark is
    /// reached, or the page ceiling is hit.
    ///
    /// Returns the final watermark; it is also committed to storage after
    /// every page, so a failed run resumes from its last completed page.
    pub async fn run(
        &self,
        content_type: ContentType,
        query: impl Into<String>,
        page_size: usize,
        start: DateTime<Utc>,
        stop: Option<DateTime<Utc>>,
    ) -> Result<HarvestOutcome> {
        let mut window = SearchWindow::new(content_type, query, start, stop, page_size)?;
        let mut pages = 0u32;
        let mut items = 0usize;

        loop {
            let page = self.client.fetch_page(&window).await?;

            if page.is_empty() {
                log::info!(
                    "{}/{content_type}: empty page at {}; nothing further to collect",
                    self.platform,
                    window.lower_bound
                );
                break;
            }

            // Persist happens-before watermark advance: a crash here means
            // the page gets fetched again next run, never skipped.
            self.storage
                .write_page(&self.platform, &window, pages, &page)
                .await?;

            let max_ts = page.max_created_at().ok_or_else(|| {
                AppError::malformed(&self.platform, "non-empty page without timestamps")
            })?;
            let short_page = page.len() < window.page_size;
            items += page.len();
            pages += 1;

            log::info!(
                "{}/{content_type}: page {pages}, {} items through {max_ts}",
                self.platform,
                page.len()
            );

            window.advance_past(max_ts);
            self.storage
                .store_watermark(&Watermark::new(
                    &self.platform,
                    content_type,
                    window.lower_bound,
                ))
                .await?;

            if window.exhausted() {
                log::info!("{}/{content_type}: reached stop watermark", self.platform);
                break;
            }
            if short_page {
                log::info!("{}/{content_type}: short page; window drained", self.platform);
                break;
            }
            if pages >= self.max_pages {
                log::warn!(
                    "{}/{content_type}: page ceiling {} reached; stopping early",
                    self.platform,
                    self.max_pages
                );
                break;
            }

            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        Ok(HarvestOutcome {
            final_watermark: window.lower_bound,
            pages,
            items,
        })
    }
}

/// Run a harvest for one platform and content type.
///
/// The start watermark resolves in order: explicit parameter, committed
/// checkpoint, default backfill depth (yesterday 00:00:00 UTC).
pub async fn run_harvest(
    config: &Config,
    storage: &dyn CollectStorage,
    client: &dyn SearchClient,
    platform: &str,
    content_type: ContentType,
    terms: &[String],
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
) -> Result<HarvestOutcome> {
    let source = config.source(platform)?;
    let query = source.build_query(terms);
    log::info!("Query for {platform}: {query}");

    let start = match start {
        Some(explicit) => explicit,
        None => match storage.load_watermark(platform, content_type).await? {
            Some(mark) => {
                log::info!("Resuming {platform}/{content_type} from watermark {}", mark.committed);
                mark.committed
            }
            None => {
                let fallback = backfill_start(config.harvest.backfill_days);
                log::info!("No watermark for {platform}/{content_type}; starting at {fallback}");
                fallback
            }
        },
    };

    let harvester = Harvester::new(
        client,
        storage,
        platform,
        config.harvest.max_pages,
        Duration::from_millis(config.http.request_delay_ms),
    );
    let outcome = harvester
        .run(content_type, query, source.page_size, start, stop)
        .await?;

    log::info!(
        "{platform}/{content_type}: {} items in {} pages; watermark now {}",
        outcome.items,
        outcome.pages,
        outcome.final_watermark
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{Item, Page};
    use crate::storage::LocalStorage;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn item(id: &str, secs: i64) -> Item {
        Item {
            id: id.to_string(),
            created_at: ts(secs),
            payload: json!({"id": id, "created_utc": secs}),
        }
    }

    /// Replays a scripted sequence of pages, recording each requested window.
    struct ScriptedSearch {
        pages: Mutex<VecDeque<Result<Page>>>,
        requests: Mutex<Vec<DateTime<Utc>>>,
    }

    impl ScriptedSearch {
        fn new(pages: Vec<Result<Page>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requested_bounds(&self) -> Vec<DateTime<Utc>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchClient for ScriptedSearch {
        async fn fetch_page(&self, window: &SearchWindow) -> Result<Page> {
            self.requests.lock().unwrap().push(window.lower_bound);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Page::default()))
        }
    }

    fn harvester<'a>(client: &'a ScriptedSearch, storage: &'a LocalStorage) -> Harvester<'a> {
        Harvester::new(client, storage, "reddit", 100, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_watermark_monotonicity() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        // Three full pages (page_size = 2), then an empty page.
        let client = ScriptedSearch::new(vec![
            Ok(Page::new(vec![item("a", 100), item("b", 110)])),
            Ok(Page::new(vec![item("c", 120), item("d", 130)])),
            Ok(Page::new(vec![item("e", 140), item("f", 150)])),
            Ok(Page::default()),
        ]);

        let outcome = harvester(&client, &storage)
            .run(ContentType::Comment, "q", 2, ts(50), None)
            .await
            .unwrap();

        let bounds = client.requested_bounds();
        assert_eq!(bounds, vec![ts(50), ts(111), ts(131), ts(151)]);
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(outcome.final_watermark, ts(151));
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.items, 6);
    }

    #[tokio::test]
    async fn test_same_timestamp_edge() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        // Page at [100, 100, 105] must advance the lower bound to 106.
        let client = ScriptedSearch::new(vec![Ok(Page::new(vec![
            item("a", 100),
            item("b", 100),
            item("c", 105),
        ]))]);

        let outcome = harvester(&client, &storage)
            .run(ContentType::Comment, "q", 3, ts(50), None)
            .await
            .unwrap();

        assert_eq!(outcome.final_watermark, ts(106));
        let mark = storage
            .load_watermark("reddit", ContentType::Comment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mark.committed, ts(106));
    }

    #[tokio::test]
    async fn test_drain_detection_short_page() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        // One item against page_size 250, far below the stop watermark.
        let client = ScriptedSearch::new(vec![Ok(Page::new(vec![item("a", 100)]))]);

        let outcome = harvester(&client, &storage)
            .run(ContentType::Submission, "q", 250, ts(50), Some(ts(1_000_000)))
            .await
            .unwrap();

        assert_eq!(outcome.pages, 1);
        assert_eq!(client.requested_bounds().len(), 1);
        assert_eq!(outcome.final_watermark, ts(101));
    }

    #[tokio::test]
    async fn test_stop_watermark_terminates_full_pages() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let client = ScriptedSearch::new(vec![
            Ok(Page::new(vec![item("a", 100), item("b", 198)])),
            Ok(Page::new(vec![item("c", 199), item("d", 205)])),
        ]);

        let outcome = harvester(&client, &storage)
            .run(ContentType::Comment, "q", 2, ts(50), Some(ts(200)))
            .await
            .unwrap();

        // Second page advanced past the stop watermark; no third request.
        assert_eq!(client.requested_bounds().len(), 2);
        assert_eq!(outcome.final_watermark, ts(206));
    }

    #[tokio::test]
    async fn test_empty_first_page_leaves_watermark_unchanged() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let client = ScriptedSearch::new(vec![Ok(Page::default())]);

        let outcome = harvester(&client, &storage)
            .run(ContentType::Comment, "q", 250, ts(50), None)
            .await
            .unwrap();

        assert_eq!(outcome.final_watermark, ts(50));
        assert_eq!(outcome.pages, 0);
        // Nothing committed: the caller may retry later from the same point.
        assert!(
            storage
                .load_watermark("reddit", ContentType::Comment)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_failure_preserves_prior_watermark() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let client = ScriptedSearch::new(vec![
            Ok(Page::new(vec![item("a", 100), item("b", 110)])),
            Err(AppError::transient("reddit", "HTTP 429")),
        ]);

        let result = harvester(&client, &storage)
            .run(ContentType::Comment, "q", 2, ts(50), None)
            .await;

        assert!(result.is_err());
        // The first page's advance is committed; only the in-flight page is lost.
        let mark = storage
            .load_watermark("reddit", ContentType::Comment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mark.committed, ts(111));
    }

    #[tokio::test]
    async fn test_page_ceiling_stops_run() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let client = ScriptedSearch::new(
            (0..10)
                .map(|i| Ok(Page::new(vec![item("x", 100 + i), item("y", 101 + i)])))
                .collect(),
        );

        let harvester = Harvester::new(&client, &storage, "reddit", 3, Duration::ZERO);
        let outcome = harvester
            .run(ContentType::Comment, "q", 2, ts(50), None)
            .await
            .unwrap();

        assert_eq!(outcome.pages, 3);
    }

    /// Storage wrapper that dies between page persist and watermark write,
    /// simulating a crash in the gap.
    struct CrashAfterPersist {
        inner: LocalStorage,
    }

    #[async_trait]
    impl CollectStorage for CrashAfterPersist {
        async fn write_page(
            &self,
            platform: &str,
            window: &SearchWindow,
            sequence: u32,
            page: &Page,
        ) -> Result<std::path::PathBuf> {
            self.inner.write_page(platform, window, sequence, page).await
        }

        async fn write_thread(
            &self,
            platform: &str,
            thread_id: &str,
            payload: &serde_json::Value,
        ) -> Result<std::path::PathBuf> {
            self.inner.write_thread(platform, thread_id, payload).await
        }

        async fn write_listing_artifact(
            &self,
            platform: &str,
            captured_at: DateTime<Utc>,
            payload: &serde_json::Value,
        ) -> Result<std::path::PathBuf> {
            self.inner
                .write_listing_artifact(platform, captured_at, payload)
                .await
        }

        async fn write_catalog_record(
            &self,
            platform: &str,
            record: &crate::models::CatalogRecord,
        ) -> Result<std::path::PathBuf> {
            self.inner.write_catalog_record(platform, record).await
        }

        async fn load_watermark(
            &self,
            platform: &str,
            content_type: ContentType,
        ) -> Result<Option<Watermark>> {
            self.inner.load_watermark(platform, content_type).await
        }

        async fn store_watermark(&self, _watermark: &Watermark) -> Result<()> {
            Err(AppError::config("simulated crash before checkpoint"))
        }

        async fn load_listing(
            &self,
            platform: &str,
        ) -> Result<Option<crate::models::ArchiveListing>> {
            self.inner.load_listing(platform).await
        }

        async fn store_listing(
            &self,
            platform: &str,
            listing: &crate::models::ArchiveListing,
        ) -> Result<()> {
            self.inner.store_listing(platform, listing).await
        }
    }

    #[tokio::test]
    async fn test_no_loss_on_crash_between_persist_and_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let page = Page::new(vec![item("a", 100), item("b", 110)]);

        // First run persists the page, then "crashes" before the checkpoint.
        let crashing = CrashAfterPersist {
            inner: storage.clone(),
        };
        let client = ScriptedSearch::new(vec![Ok(page.clone())]);
        let result = harvester_on(&client, &crashing)
            .run(ContentType::Comment, "q", 250, ts(50), None)
            .await;
        assert!(result.is_err());
        assert_eq!(storage.page_files("reddit", "1970-01-01").await.unwrap().len(), 1);

        // Re-run from the pre-crash watermark: the same page is fetched
        // again and re-persisted to the same artifact. No item skipped.
        let client = ScriptedSearch::new(vec![Ok(page)]);
        let outcome = harvester_on(&client, &storage)
            .run(ContentType::Comment, "q", 250, ts(50), None)
            .await
            .unwrap();

        assert_eq!(client.requested_bounds(), vec![ts(50)]);
        assert_eq!(outcome.items, 2);
        let files = storage.page_files("reddit", "1970-01-01").await.unwrap();
        assert_eq!(files.len(), 1);
        let lines = storage.read_gzip_lines(&files[0]).await.unwrap();
        assert_eq!(lines.len(), 2);
    }

    fn harvester_on<'a>(
        client: &'a ScriptedSearch,
        storage: &'a dyn CollectStorage,
    ) -> Harvester<'a> {
        Harvester::new(client, storage, "reddit", 100, Duration::ZERO)
    }
}
