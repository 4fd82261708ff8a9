//! Local filesystem storage implementation.
//!
//! All whole-file writes go through `write_bytes` (write temp, flush,
//! rename), so readers and re-runs never observe a partial artifact.
//! Checkpoint reads treat a corrupt file the same as a missing one: the
//! collector restarts from its default backfill depth instead of dying.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ArchiveListing, CatalogRecord, ContentType, Page, SearchWindow, Watermark};
use crate::storage::CollectStorage;
use crate::utils::query_fingerprint;
use crate::utils::time::{compact_stamp, day_stamp, minute_of_day};

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Gzip-compress in memory, then write atomically.
    async fn write_gzip(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;
        self.write_bytes(key, &compressed).await
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read a JSON checkpoint. Missing and undecodable files both come back
    /// as None: the collector then restarts from its default backfill depth.
    async fn read_checkpoint<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    log::warn!("Checkpoint {key} is corrupt ({e}); treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn watermark_key(platform: &str, content_type: ContentType) -> String {
        format!("checkpoints/{platform}__{content_type}.json")
    }

    fn listing_key(platform: &str) -> String {
        format!("checkpoints/{platform}__listing.json")
    }

    /// Open a daily-rotating append-only writer for the streaming ingester.
    pub async fn stream_rotator(&self, platform: &str) -> Result<StreamRotator> {
        let dir = self.root_dir.join(platform).join("stream");
        StreamRotator::open(dir).await
    }

    /// Page artifact files collected for a platform on a given day.
    pub async fn page_files(&self, platform: &str, day: &str) -> Result<Vec<PathBuf>> {
        let dir = self.root_dir.join(platform).join(day);
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(AppError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.to_string_lossy().ends_with(".ndjson.gz") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Decompress a gzipped artifact into its text lines.
    pub async fn read_gzip_lines(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = tokio::fs::read(path).await?;
        let mut decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(bytes));
        let mut text = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut text)?;
        Ok(text.lines().map(String::from).collect())
    }

    /// Write a keyword-expansion result table.
    pub async fn write_gram_table(&self, iteration: &str, csv: &str) -> Result<PathBuf> {
        let key = format!("snowball/{iteration}/top_grams_{iteration}.csv");
        self.write_bytes(&key, csv.as_bytes()).await?;
        Ok(self.path(&key))
    }
}

#[async_trait]
impl CollectStorage for LocalStorage {
    async fn write_page(
        &self,
        platform: &str,
        window: &SearchWindow,
        sequence: u32,
        page: &Page,
    ) -> Result<PathBuf> {
        let key = format!(
            "{platform}/{day}/{content_type}__{query}__{start}__{sequence:05}.ndjson.gz",
            day = day_stamp(window.lower_bound),
            content_type = window.content_type,
            query = query_fingerprint(&window.query),
            start = compact_stamp(window.lower_bound),
        );

        let mut body = Vec::new();
        for item in &page.items {
            serde_json::to_writer(&mut body, &item.payload)?;
            body.push(b'\n');
        }
        self.write_gzip(&key, &body).await?;

        log::debug!("Wrote {} items to {key}", page.len());
        Ok(self.path(&key))
    }

    async fn write_thread(
        &self,
        platform: &str,
        thread_id: &str,
        payload: &Value,
    ) -> Result<PathBuf> {
        let key = format!(
            "{platform}/archive_threads/{day}/{thread_id}.json.gz",
            day = day_stamp(Utc::now()),
        );
        self.write_gzip(&key, &serde_json::to_vec(payload)?).await?;
        Ok(self.path(&key))
    }

    async fn write_listing_artifact(
        &self,
        platform: &str,
        captured_at: DateTime<Utc>,
        payload: &Value,
    ) -> Result<PathBuf> {
        let key = format!(
            "{platform}/archive_list/{day}/{minute:04}.json.gz",
            day = day_stamp(captured_at),
            minute = minute_of_day(captured_at),
        );
        self.write_gzip(&key, &serde_json::to_vec(payload)?).await?;
        Ok(self.path(&key))
    }

    async fn write_catalog_record(
        &self,
        platform: &str,
        record: &CatalogRecord,
    ) -> Result<PathBuf> {
        let captured_at = DateTime::from_timestamp(record.time, 0).unwrap_or_else(Utc::now);
        let key = format!(
            "{platform}/catalog/{day}/{minute:04}.json.gz",
            day = day_stamp(captured_at),
            minute = minute_of_day(captured_at),
        );
        self.write_gzip(&key, &serde_json::to_vec(record)?).await?;
        Ok(self.path(&key))
    }

    async fn load_watermark(
        &self,
        platform: &str,
        content_type: ContentType,
    ) -> Result<Option<Watermark>> {
        self.read_checkpoint(&Self::watermark_key(platform, content_type))
            .await
    }

    async fn store_watermark(&self, watermark: &Watermark) -> Result<()> {
        let key = Self::watermark_key(&watermark.platform, watermark.content_type);
        self.write_json(&key, watermark).await
    }

    async fn load_listing(&self, platform: &str) -> Result<Option<ArchiveListing>> {
        self.read_checkpoint(&Self::listing_key(platform)).await
    }

    async fn store_listing(&self, platform: &str, listing: &ArchiveListing) -> Result<()> {
        self.write_json(&Self::listing_key(platform), listing).await
    }
}

/// Daily-rotating append-only output for the streaming ingester.
///
/// At open time the first unused version suffix for today is chosen, so a
/// restarted ingester never appends to a previous run's file. On a day
/// change the version resets to 1 for the fresh day.
pub struct StreamRotator {
    dir: PathBuf,
    day: String,
    version: u32,
    file: tokio::fs::File,
}

impl StreamRotator {
    async fn open(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let day = day_stamp(Utc::now());

        let mut version = 1;
        while tokio::fs::try_exists(Self::file_path(&dir, &day, version)).await? {
            version += 1;
        }

        let file = Self::open_file(&dir, &day, version).await?;
        log::info!("Stream output: {}", Self::file_path(&dir, &day, version).display());
        Ok(Self {
            dir,
            day,
            version,
            file,
        })
    }

    fn file_path(dir: &Path, day: &str, version: u32) -> PathBuf {
        dir.join(format!("{day}--{version}.ndjson"))
    }

    async fn open_file(dir: &Path, day: &str, version: u32) -> Result<tokio::fs::File> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::file_path(dir, day, version))
            .await?;
        Ok(file)
    }

    /// Current output path.
    pub fn current_path(&self) -> PathBuf {
        Self::file_path(&self.dir, &self.day, self.version)
    }

    /// Append one received item as a line, rotating on day change.
    pub async fn append(&mut self, item: &[u8]) -> Result<()> {
        let today = day_stamp(Utc::now());
        if today != self.day {
            log::info!("Rotating stream output for new day {today}");
            self.day = today;
            self.version = 1;
            self.file = Self::open_file(&self.dir, &self.day, self.version).await?;
        }

        self.file.write_all(item).await?;
        if !item.ends_with(b"\n") {
            self.file.write_all(b"\n").await?;
        }
        self.file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, SearchWindow};
    use serde_json::json;
    use tempfile::TempDir;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn page_of(ids: &[(&str, i64)]) -> Page {
        Page::new(
            ids.iter()
                .map(|(id, secs)| Item {
                    id: id.to_string(),
                    created_at: ts(*secs),
                    payload: json!({"id": id, "created_utc": secs}),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_page_artifact_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let window = SearchWindow::new(
            ContentType::Comment,
            "\"ballot\"",
            ts(1_654_041_600),
            None,
            250,
        )
        .unwrap();
        let page = page_of(&[("a", 1_654_041_601), ("b", 1_654_041_700)]);

        let path = storage.write_page("reddit", &window, 0, &page).await.unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().contains("reddit/2022-06-01/comment__"));

        let lines = storage.read_gzip_lines(&path).await.unwrap();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["id"], "a");
    }

    #[tokio::test]
    async fn test_same_window_same_name() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let window =
            SearchWindow::new(ContentType::Submission, "q", ts(1_654_041_600), None, 250).unwrap();
        let page = page_of(&[("a", 1_654_041_601)]);

        let first = storage.write_page("reddit", &window, 0, &page).await.unwrap();
        let second = storage.write_page("reddit", &window, 0, &page).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_watermark_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(
            storage
                .load_watermark("reddit", ContentType::Comment)
                .await
                .unwrap()
                .is_none()
        );

        let mark = Watermark::new("reddit", ContentType::Comment, ts(1_654_041_600));
        storage.store_watermark(&mark).await.unwrap();

        let loaded = storage
            .load_watermark("reddit", ContentType::Comment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.committed, ts(1_654_041_600));

        // The other content type has its own checkpoint
        assert!(
            storage
                .load_watermark("reddit", ContentType::Submission)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_treated_as_absent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write_bytes("checkpoints/reddit__comment.json", b"{not json")
            .await
            .unwrap();

        let loaded = storage
            .load_watermark("reddit", ContentType::Comment)
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_listing_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let listing = ArchiveListing::new(ts(1_654_041_600), ["1", "2"].map(String::from));
        storage.store_listing("4chan", &listing).await.unwrap();

        let loaded = storage.load_listing("4chan").await.unwrap().unwrap();
        assert_eq!(loaded.ids, listing.ids);
    }

    #[tokio::test]
    async fn test_thread_artifact() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let path = storage
            .write_thread("4chan", "389214721", &json!({"posts": [{"no": 389214721}]}))
            .await
            .unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().contains("archive_threads"));
    }

    #[tokio::test]
    async fn test_stream_rotator_never_reuses_files() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut first = storage.stream_rotator("twitter").await.unwrap();
        first.append(b"{\"text\":\"one\"}").await.unwrap();
        let first_path = first.current_path();
        drop(first);

        // A fresh run must pick a new version, not append to the old file.
        let second = storage.stream_rotator("twitter").await.unwrap();
        assert_ne!(second.current_path(), first_path);
    }

    #[tokio::test]
    async fn test_stream_append_adds_newline() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut rotator = storage.stream_rotator("twitter").await.unwrap();
        rotator.append(b"{\"text\":\"one\"}").await.unwrap();
        rotator.append(b"{\"text\":\"two\"}\n").await.unwrap();

        let content = std::fs::read_to_string(rotator.current_path()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_page_files_listing() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let window =
            SearchWindow::new(ContentType::Comment, "q", ts(1_654_041_600), None, 250).unwrap();
        storage
            .write_page("reddit", &window, 0, &page_of(&[("a", 1_654_041_601)]))
            .await
            .unwrap();

        let files = storage.page_files("reddit", "2022-06-01").await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(storage.page_files("reddit", "1999-01-01").await.unwrap().is_empty());
    }
}
