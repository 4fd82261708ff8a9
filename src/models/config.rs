//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ContentType, ItemFields, TimeEncoding};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client behavior settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Data and input file locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Search harvester settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Search source definitions, one per platform
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SearchSourceConfig>,

    /// Bulletin-board source definition
    #[serde(default)]
    pub board: BoardSourceConfig,

    /// Streaming source definition
    #[serde(default)]
    pub stream: StreamConfig,

    /// Keyword-expansion settings
    #[serde(default)]
    pub snowball: SnowballConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Look up a search source by platform name.
    pub fn source(&self, platform: &str) -> Result<&SearchSourceConfig> {
        self.sources
            .iter()
            .find(|s| s.platform == platform)
            .ok_or_else(|| AppError::config(format!("No search source named '{platform}'")))
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.harvest.max_pages == 0 {
            return Err(AppError::validation("harvest.max_pages must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No search sources defined"));
        }
        for source in &self.sources {
            if source.endpoints.is_empty() {
                return Err(AppError::validation(format!(
                    "Source '{}' has no endpoints",
                    source.platform
                )));
            }
            if source.page_size == 0 {
                return Err(AppError::validation(format!(
                    "Source '{}' page_size must be > 0",
                    source.platform
                )));
            }
        }
        if !self.board.thread_url.contains("{thread_id}") {
            return Err(AppError::validation(
                "board.thread_url must contain a {thread_id} placeholder",
            ));
        }
        if self.stream.initial_backoff_secs == 0
            || self.stream.initial_backoff_secs > self.stream.max_backoff_secs
        {
            return Err(AppError::validation(
                "stream backoff must satisfy 0 < initial <= max",
            ));
        }
        if self.snowball.top_n == 0 {
            return Err(AppError::validation("snowball.top_n must be > 0"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            paths: PathsConfig::default(),
            harvest: HarvestConfig::default(),
            sources: defaults::default_sources(),
            board: BoardSourceConfig::default(),
            stream: StreamConfig::default(),
            snowball: SnowballConfig::default(),
        }
    }
}

/// HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent requests (archive thread fetches)
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Data and input file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory for collected artifacts and checkpoints
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Newline-delimited keyword list
    #[serde(default = "defaults::keywords_file")]
    pub keywords_file: PathBuf,

    /// Newline-delimited filter list for the streaming ingester
    #[serde(default = "defaults::filters_file")]
    pub filters_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            keywords_file: defaults::keywords_file(),
            filters_file: defaults::filters_file(),
        }
    }
}

/// Search harvester settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Default backfill depth in days when no watermark exists
    #[serde(default = "defaults::backfill_days")]
    pub backfill_days: i64,

    /// Page-count ceiling per run (runaway protection)
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            backfill_days: defaults::backfill_days(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// One search endpoint within a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEndpoint {
    pub content_type: ContentType,
    pub url: String,
}

/// An extra fixed request parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// A keyword-search platform: endpoints, parameter names, and the narrow
/// accessors needed to read ids and timestamps out of its payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSourceConfig {
    /// Platform key, used for output namespacing and checkpoints
    pub platform: String,

    /// One endpoint per content type this platform serves
    pub endpoints: Vec<SearchEndpoint>,

    /// Hard page-size ceiling for this platform
    pub page_size: usize,

    /// Request parameter carrying the query string
    pub query_param: String,

    /// Separator joining keyword terms into one query (OR semantics)
    pub query_joiner: String,

    /// Whether terms are wrapped in double quotes (exact-phrase matching)
    #[serde(default)]
    pub quote_terms: bool,

    /// Request parameter for the window lower bound (inclusive)
    pub after_param: String,

    /// Request parameter for the window upper bound (exclusive)
    pub before_param: String,

    /// Request parameter for the page size
    pub size_param: String,

    /// How window bounds are rendered into request parameters
    pub window_encoding: TimeEncoding,

    /// Fixed parameters appended to every request
    #[serde(default)]
    pub extra_params: Vec<Param>,

    /// JSON pointer to the items array in a response
    pub items_pointer: String,

    /// Accessors for the required item fields
    pub fields: ItemFields,

    /// JSON pointers to the payload fields carrying human text
    #[serde(default)]
    pub text_pointers: Vec<String>,

    /// Request parameter carrying the API token, if the platform needs one
    #[serde(default)]
    pub token_param: Option<String>,

    /// Environment variable the token is read from
    #[serde(default)]
    pub token_env: Option<String>,
}

impl SearchSourceConfig {
    /// Endpoint URL for a content type.
    pub fn endpoint(&self, content_type: ContentType) -> Result<&str> {
        self.endpoints
            .iter()
            .find(|e| e.content_type == content_type)
            .map(|e| e.url.as_str())
            .ok_or_else(|| {
                AppError::config(format!(
                    "Source '{}' has no endpoint for content type '{content_type}'",
                    self.platform
                ))
            })
    }

    /// Join keyword terms into this platform's query syntax.
    pub fn build_query(&self, terms: &[String]) -> String {
        let rendered: Vec<String> = terms
            .iter()
            .map(|t| {
                if self.quote_terms {
                    format!("\"{t}\"")
                } else {
                    t.clone()
                }
            })
            .collect();
        rendered.join(&self.query_joiner)
    }
}

/// The bulletin-board source: catalog, archive listing, and thread endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSourceConfig {
    /// Platform key
    #[serde(default = "defaults::board_platform")]
    pub platform: String,

    /// Live board catalog endpoint
    #[serde(default = "defaults::catalog_url")]
    pub catalog_url: String,

    /// Archive listing endpoint (finalized thread ids)
    #[serde(default = "defaults::archive_url")]
    pub archive_url: String,

    /// Full-thread endpoint with a `{thread_id}` placeholder
    #[serde(default = "defaults::thread_url")]
    pub thread_url: String,

    /// Delay between thread fetches in milliseconds
    #[serde(default = "defaults::thread_delay")]
    pub thread_delay_ms: u64,
}

impl Default for BoardSourceConfig {
    fn default() -> Self {
        Self {
            platform: defaults::board_platform(),
            catalog_url: defaults::catalog_url(),
            archive_url: defaults::archive_url(),
            thread_url: defaults::thread_url(),
            thread_delay_ms: defaults::thread_delay(),
        }
    }
}

/// The streaming source: one persistent filtered subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Platform key
    #[serde(default = "defaults::stream_platform")]
    pub platform: String,

    /// Subscription endpoint
    #[serde(default = "defaults::stream_url")]
    pub url: String,

    /// Request parameter carrying the comma-joined filter list
    #[serde(default = "defaults::stream_filter_param")]
    pub filter_param: String,

    /// Environment variable holding the bearer token
    #[serde(default = "defaults::stream_token_env")]
    pub token_env: String,

    /// First reconnect delay in seconds
    #[serde(default = "defaults::stream_initial_backoff")]
    pub initial_backoff_secs: u64,

    /// Reconnect delay ceiling in seconds
    #[serde(default = "defaults::stream_max_backoff")]
    pub max_backoff_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            platform: defaults::stream_platform(),
            url: defaults::stream_url(),
            filter_param: defaults::stream_filter_param(),
            token_env: defaults::stream_token_env(),
            initial_backoff_secs: defaults::stream_initial_backoff(),
            max_backoff_secs: defaults::stream_max_backoff(),
        }
    }
}

/// Keyword-expansion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowballConfig {
    /// How many top unigrams and top bigrams to keep per platform
    #[serde(default = "defaults::top_n")]
    pub top_n: usize,

    /// Minimum token length to count
    #[serde(default = "defaults::min_token_length")]
    pub min_token_length: usize,
}

impl Default for SnowballConfig {
    fn default() -> Self {
        Self {
            top_n: defaults::top_n(),
            min_token_length: defaults::min_token_length(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{Param, SearchEndpoint, SearchSourceConfig};
    use crate::models::{ContentType, ItemFields, TimeEncoding};

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; driftnet/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        10_000
    }
    pub fn max_concurrent() -> usize {
        2
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        "data".into()
    }
    pub fn keywords_file() -> PathBuf {
        "keywords.txt".into()
    }
    pub fn filters_file() -> PathBuf {
        "filters.txt".into()
    }

    // Harvest defaults
    pub fn backfill_days() -> i64 {
        1
    }
    pub fn max_pages() -> u32 {
        20_000
    }

    // Board defaults
    pub fn board_platform() -> String {
        "4chan".into()
    }
    pub fn catalog_url() -> String {
        "https://a.4cdn.org/pol/catalog.json".into()
    }
    pub fn archive_url() -> String {
        "https://a.4cdn.org/pol/archive.json".into()
    }
    pub fn thread_url() -> String {
        "https://a.4cdn.org/pol/thread/{thread_id}.json".into()
    }
    pub fn thread_delay() -> u64 {
        500
    }

    // Stream defaults
    pub fn stream_platform() -> String {
        "twitter".into()
    }
    pub fn stream_url() -> String {
        "https://stream.twitter.com/1.1/statuses/filter.json".into()
    }
    pub fn stream_filter_param() -> String {
        "follow".into()
    }
    pub fn stream_token_env() -> String {
        "DRIFTNET_STREAM_TOKEN".into()
    }
    pub fn stream_initial_backoff() -> u64 {
        5
    }
    pub fn stream_max_backoff() -> u64 {
        300
    }

    // Snowball defaults
    pub fn top_n() -> usize {
        50
    }
    pub fn min_token_length() -> usize {
        2
    }

    // Search source defaults
    pub fn default_sources() -> Vec<SearchSourceConfig> {
        vec![
            SearchSourceConfig {
                platform: "reddit".to_string(),
                endpoints: vec![
                    SearchEndpoint {
                        content_type: ContentType::Submission,
                        url: "https://api.pushshift.io/reddit/submission/search".to_string(),
                    },
                    SearchEndpoint {
                        content_type: ContentType::Comment,
                        url: "https://api.pushshift.io/reddit/comment/search".to_string(),
                    },
                ],
                page_size: 250,
                query_param: "q".to_string(),
                query_joiner: "|".to_string(),
                quote_terms: true,
                after_param: "after".to_string(),
                before_param: "before".to_string(),
                size_param: "size".to_string(),
                window_encoding: TimeEncoding::EpochSeconds,
                extra_params: vec![],
                items_pointer: "/data".to_string(),
                fields: ItemFields {
                    id_pointer: "/id".to_string(),
                    time_pointer: "/created_utc".to_string(),
                    time_encoding: TimeEncoding::EpochSeconds,
                },
                text_pointers: vec![
                    "/title".to_string(),
                    "/selftext".to_string(),
                    "/body".to_string(),
                ],
                token_param: None,
                token_env: None,
            },
            SearchSourceConfig {
                platform: "meta".to_string(),
                endpoints: vec![SearchEndpoint {
                    content_type: ContentType::Post,
                    url: "https://api.crowdtangle.com/posts/search".to_string(),
                }],
                page_size: 10_000,
                query_param: "searchTerm".to_string(),
                query_joiner: ",".to_string(),
                quote_terms: false,
                after_param: "startDate".to_string(),
                before_param: "endDate".to_string(),
                size_param: "count".to_string(),
                window_encoding: TimeEncoding::Formatted {
                    format: "%Y-%m-%dT%H:%M:%S".to_string(),
                },
                extra_params: vec![
                    Param {
                        name: "sortBy".to_string(),
                        value: "date".to_string(),
                    },
                    Param {
                        name: "platforms".to_string(),
                        value: "facebook,instagram".to_string(),
                    },
                    Param {
                        name: "language".to_string(),
                        value: "en".to_string(),
                    },
                    Param {
                        name: "includeHistory".to_string(),
                        value: "true".to_string(),
                    },
                ],
                items_pointer: "/result/posts".to_string(),
                fields: ItemFields {
                    id_pointer: "/platformId".to_string(),
                    time_pointer: "/date".to_string(),
                    time_encoding: TimeEncoding::Formatted {
                        format: "%Y-%m-%d %H:%M:%S".to_string(),
                    },
                },
                text_pointers: vec!["/message".to_string(), "/description".to_string()],
                token_param: Some("token".to_string()),
                token_env: Some("DRIFTNET_META_TOKEN".to_string()),
            },
            SearchSourceConfig {
                platform: "fb_ads".to_string(),
                endpoints: vec![SearchEndpoint {
                    content_type: ContentType::Ad,
                    url: "https://graph.facebook.com/v14.0/ads_archive".to_string(),
                }],
                page_size: 300,
                query_param: "search_terms".to_string(),
                query_joiner: ",".to_string(),
                quote_terms: false,
                after_param: "ad_delivery_date_min".to_string(),
                before_param: "ad_delivery_date_max".to_string(),
                size_param: "limit".to_string(),
                window_encoding: TimeEncoding::Formatted {
                    format: "%Y-%m-%d".to_string(),
                },
                extra_params: vec![Param {
                    name: "ad_reached_countries".to_string(),
                    value: "US".to_string(),
                }],
                items_pointer: "/data".to_string(),
                fields: ItemFields {
                    id_pointer: "/id".to_string(),
                    time_pointer: "/ad_creation_time".to_string(),
                    time_encoding: TimeEncoding::Formatted {
                        format: "%Y-%m-%d".to_string(),
                    },
                },
                text_pointers: vec!["/ad_creative_bodies/0".to_string()],
                token_param: Some("access_token".to_string()),
                token_env: Some("DRIFTNET_FB_ADS_TOKEN".to_string()),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_thread_url_without_placeholder() {
        let mut config = Config::default();
        config.board.thread_url = "https://a.4cdn.org/pol/thread/1.json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.stream.initial_backoff_secs = 600;
        config.stream.max_backoff_secs = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_lookup() {
        let config = Config::default();
        assert!(config.source("reddit").is_ok());
        assert!(config.source("myspace").is_err());
    }

    #[test]
    fn test_build_query_quoted_or() {
        let config = Config::default();
        let source = config.source("reddit").unwrap();
        let query = source.build_query(&["ballot".to_string(), "early voting".to_string()]);
        assert_eq!(query, "\"ballot\"|\"early voting\"");
    }

    #[test]
    fn test_build_query_plain_comma() {
        let config = Config::default();
        let source = config.source("meta").unwrap();
        let query = source.build_query(&["ballot".to_string(), "early voting".to_string()]);
        assert_eq!(query, "ballot,early voting");
    }

    #[test]
    fn test_endpoint_per_content_type() {
        let config = Config::default();
        let source = config.source("reddit").unwrap();
        assert!(
            source
                .endpoint(ContentType::Comment)
                .unwrap()
                .contains("comment")
        );
        assert!(source.endpoint(ContentType::Ad).is_err());
    }
}
