// src/services/search.rs

//! Keyword-search client.
//!
//! One request = one time-bounded page of a platform's search endpoint. The
//! request shape (parameter names, timestamp encodings, items location) comes
//! entirely from the source configuration; nothing platform-specific is
//! hard-coded here.

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Page, SearchSourceConfig, SearchWindow};
use crate::services::fetch_json;

/// A paginated, time-bounded search upstream.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Fetch one page of items for the window.
    async fn fetch_page(&self, window: &SearchWindow) -> Result<Page>;
}

/// HTTP implementation driven by a `SearchSourceConfig`.
pub struct HttpSearchClient {
    client: reqwest::Client,
    source: SearchSourceConfig,
    token: Option<String>,
}

impl HttpSearchClient {
    /// Create a client for one search source. The API token, when the
    /// platform requires one, is read from the configured environment
    /// variable; absent tokens only fail at request time, so token-free
    /// sources stay unaffected.
    pub fn new(client: reqwest::Client, source: SearchSourceConfig) -> Self {
        let token = source
            .token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        Self {
            client,
            source,
            token,
        }
    }

    /// Build the request URL for a window.
    fn build_url(&self, window: &SearchWindow) -> Result<Url> {
        let endpoint = self.source.endpoint(window.content_type)?;
        let mut url = Url::parse(endpoint)?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair(&self.source.query_param, &window.query);
            params.append_pair(&self.source.size_param, &window.page_size.to_string());
            params.append_pair(
                &self.source.after_param,
                &self.source.window_encoding.encode(window.lower_bound),
            );
            if let Some(upper) = window.upper_bound {
                params.append_pair(
                    &self.source.before_param,
                    &self.source.window_encoding.encode(upper),
                );
            }
            for param in &self.source.extra_params {
                params.append_pair(&param.name, &param.value);
            }
            if let (Some(name), Some(token)) = (&self.source.token_param, &self.token) {
                params.append_pair(name, token);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn fetch_page(&self, window: &SearchWindow) -> Result<Page> {
        let url = self.build_url(window)?;
        log::debug!(
            "Search {} {} from {}",
            self.source.platform,
            window.content_type,
            window.lower_bound
        );

        let body = fetch_json(&self.client, url, &self.source.platform).await?;

        let raw_items = body
            .pointer(&self.source.items_pointer)
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AppError::malformed(
                    &self.source.platform,
                    format!("no items array at {}", self.source.items_pointer),
                )
            })?;

        let items = raw_items
            .iter()
            .map(|raw| self.source.fields.extract(raw.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, ContentType};
    use chrono::DateTime;

    fn client_for(platform: &str) -> HttpSearchClient {
        let source = Config::default().source(platform).unwrap().clone();
        HttpSearchClient::new(reqwest::Client::new(), source)
    }

    fn window(content_type: ContentType, lower: i64, upper: Option<i64>) -> SearchWindow {
        SearchWindow::new(
            content_type,
            "\"ballot\"|\"early voting\"",
            DateTime::from_timestamp(lower, 0).unwrap(),
            upper.map(|s| DateTime::from_timestamp(s, 0).unwrap()),
            250,
        )
        .unwrap()
    }

    #[test]
    fn test_build_url_epoch_params() {
        let client = client_for("reddit");
        let url = client
            .build_url(&window(ContentType::Comment, 1_654_041_600, Some(1_654_128_000)))
            .unwrap();

        assert!(url.as_str().starts_with("https://api.pushshift.io/reddit/comment/search?"));
        let pairs: Vec<_> = url.query_pairs().collect();
        assert!(pairs.iter().any(|(k, v)| k == "after" && v == "1654041600"));
        assert!(pairs.iter().any(|(k, v)| k == "before" && v == "1654128000"));
        assert!(pairs.iter().any(|(k, v)| k == "size" && v == "250"));
    }

    #[test]
    fn test_build_url_formatted_params_and_extras() {
        let client = client_for("meta");
        let url = client
            .build_url(&window(ContentType::Post, 1_654_041_600, None))
            .unwrap();

        let pairs: Vec<_> = url.query_pairs().collect();
        assert!(
            pairs
                .iter()
                .any(|(k, v)| k == "startDate" && v == "2022-06-01T00:00:00")
        );
        assert!(!pairs.iter().any(|(k, _)| k == "endDate"));
        assert!(pairs.iter().any(|(k, v)| k == "sortBy" && v == "date"));
    }

    #[test]
    fn test_build_url_unknown_content_type() {
        let client = client_for("reddit");
        assert!(client.build_url(&window(ContentType::Ad, 0, None)).is_err());
    }
}
