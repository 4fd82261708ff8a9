// src/pipeline/snowball.rs

//! Keyword expansion by frequent-term mining.
//!
//! Counts unigrams and bigrams across collected text and ranks the most
//! frequent grams that are not already tracked keywords. Because every
//! collected item matched at least one existing keyword, raw co-occurrence
//! counts are enough; no scoring model is involved.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, Utc};
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::Config;
use crate::storage::LocalStorage;

/// Accumulates unigram and bigram counts over cleaned text.
pub struct GramCounter {
    min_token_length: usize,
    url_pattern: Regex,
    counts: HashMap<String, u64>,
    texts: usize,
}

impl GramCounter {
    pub fn new(min_token_length: usize) -> Self {
        Self {
            min_token_length,
            // Links carry no phrase-worthy text; drop them before segmenting.
            url_pattern: Regex::new(r"https?://\S+").expect("static pattern"),
            counts: HashMap::new(),
            texts: 0,
        }
    }

    /// Count one text's unigrams and bigrams.
    pub fn add_text(&mut self, text: &str) {
        let tokens = self.tokenize(text);
        if tokens.is_empty() {
            return;
        }
        self.texts += 1;

        for window in tokens.windows(2) {
            *self.counts.entry(window.join(" ")).or_default() += 1;
        }
        for token in tokens {
            *self.counts.entry(token).or_default() += 1;
        }
    }

    /// Number of texts that contributed at least one token.
    pub fn texts(&self) -> usize {
        self.texts
    }

    pub fn into_counts(self) -> HashMap<String, u64> {
        self.counts
    }

    /// Tokenize into normalized keywords.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let stripped = self.url_pattern.replace_all(text, " ");
        let normalized = stripped.to_lowercase();

        normalized
            .unicode_words()
            .filter(|word| word.len() >= self.min_token_length)
            .filter(|word| !is_stopword(word))
            .filter(|word| !word.chars().all(char::is_numeric))
            .map(String::from)
            .collect()
    }
}

/// One ranked phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GramCount {
    pub phrase: String,
    pub count: u64,
}

/// Top unigrams and bigrams, already filtered against tracked keywords.
#[derive(Debug, Clone, Default)]
pub struct TopGrams {
    pub unigrams: Vec<GramCount>,
    pub bigrams: Vec<GramCount>,
}

/// Rank the `n` most frequent unigrams and the `n` most frequent bigrams,
/// excluding phrases already in the keyword list. Ties break on the phrase
/// for deterministic output.
pub fn top_grams(counts: &HashMap<String, u64>, existing: &HashSet<String>, n: usize) -> TopGrams {
    let mut unigrams = Vec::new();
    let mut bigrams = Vec::new();

    for (phrase, &count) in counts {
        if existing.contains(phrase) {
            continue;
        }
        let gram = GramCount {
            phrase: phrase.clone(),
            count,
        };
        if phrase.contains(' ') {
            bigrams.push(gram);
        } else {
            unigrams.push(gram);
        }
    }

    for grams in [&mut unigrams, &mut bigrams] {
        grams.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.phrase.cmp(&b.phrase)));
        grams.truncate(n);
    }

    TopGrams { unigrams, bigrams }
}

/// Common English words and URL artifacts that never make useful keywords.
fn is_stopword(word: &str) -> bool {
    const STOPWORDS: &[&str] = &[
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "must",
        "shall", "of", "to", "in", "for", "on", "with", "at", "by", "from", "as", "or", "and",
        "but", "if", "then", "so", "than", "this", "that", "these", "those", "it", "its", "he",
        "she", "they", "them", "his", "her", "their", "we", "you", "your", "our", "not", "no",
        "just", "about", "into", "over", "after", "before", "out", "up", "down", "what", "who",
        "when", "where", "how", "why", "all", "any", "more", "most", "some", "such", "only",
        "very", "rt", "amp", // Common URL/HTML artifacts
        "http", "https", "www", "com", "html", "php",
    ];
    STOPWORDS.contains(&word)
}

/// Mine collected page artifacts for keyword-expansion candidates.
///
/// Walks each search platform's artifacts over `[start, end]` (whole days),
/// extracts item text through the platform's configured pointers, and writes
/// one CSV table of top grams per platform.
pub async fn run_snowball(
    config: &Config,
    storage: &LocalStorage,
    iteration: &str,
    keywords: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<std::path::PathBuf> {
    let existing: HashSet<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut csv = String::from("platform,phrase,count\n");

    for source in &config.sources {
        if source.text_pointers.is_empty() {
            log::warn!("Source {} has no text pointers; skipping", source.platform);
            continue;
        }

        let mut counter = GramCounter::new(config.snowball.min_token_length);
        let mut files = 0usize;

        let mut day = start.date_naive();
        let last = end.date_naive();
        while day <= last {
            for path in storage
                .page_files(&source.platform, &day.format("%Y-%m-%d").to_string())
                .await?
            {
                files += 1;
                for line in storage.read_gzip_lines(&path).await? {
                    let payload: serde_json::Value = match serde_json::from_str(&line) {
                        Ok(value) => value,
                        Err(e) => {
                            log::warn!("Skipping undecodable line in {}: {e}", path.display());
                            continue;
                        }
                    };
                    for pointer in &source.text_pointers {
                        if let Some(text) = payload.pointer(pointer).and_then(|v| v.as_str()) {
                            counter.add_text(text);
                        }
                    }
                }
            }
            let Some(next) = day.checked_add_days(Days::new(1)) else {
                break;
            };
            day = next;
        }

        log::info!(
            "{}: counted grams from {} texts in {files} artifacts",
            source.platform,
            counter.texts()
        );

        let top = top_grams(&counter.into_counts(), &existing, config.snowball.top_n);
        for gram in top.unigrams.iter().chain(top.bigrams.iter()) {
            csv.push_str(&format!("{},{},{}\n", source.platform, gram.phrase, gram.count));
        }
    }

    let path = storage.write_gram_table(iteration, &csv).await?;
    log::info!("Top grams written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts_for(texts: &[&str]) -> HashMap<String, u64> {
        let mut counter = GramCounter::new(2);
        for text in texts {
            counter.add_text(text);
        }
        counter.into_counts()
    }

    #[test]
    fn test_counts_unigrams_and_bigrams() {
        let counts = counts_for(&["early voting fraud", "early voting lines"]);

        assert_eq!(counts["early"], 2);
        assert_eq!(counts["early voting"], 2);
        assert_eq!(counts["voting fraud"], 1);
        assert_eq!(counts["voting lines"], 1);
    }

    #[test]
    fn test_stopwords_and_numerals_dropped() {
        let counts = counts_for(&["the ballot was counted on 2022"]);

        assert!(!counts.contains_key("the"));
        assert!(!counts.contains_key("2022"));
        // Remaining tokens pair up across removed stopwords.
        assert_eq!(counts["ballot counted"], 1);
    }

    #[test]
    fn test_urls_stripped_before_segmentation() {
        let counts = counts_for(&["watch this https://example.com/x?id=1 ballot drop"]);

        assert!(counts.contains_key("ballot drop"));
        assert!(!counts.keys().any(|k| k.contains("example")));
    }

    #[test]
    fn test_top_grams_excludes_existing_keywords() {
        let counts = counts_for(&["ballot fraud claims", "ballot fraud claims"]);
        let existing: HashSet<String> =
            ["ballot", "ballot fraud"].into_iter().map(String::from).collect();

        let top = top_grams(&counts, &existing, 50);
        assert!(top.unigrams.iter().all(|g| g.phrase != "ballot"));
        assert!(top.bigrams.iter().all(|g| g.phrase != "ballot fraud"));
        assert!(top.bigrams.iter().any(|g| g.phrase == "fraud claims"));
    }

    #[test]
    fn test_top_grams_ranked_and_truncated() {
        let mut counts = HashMap::new();
        counts.insert("alpha".to_string(), 3);
        counts.insert("bravo".to_string(), 9);
        counts.insert("charlie".to_string(), 9);
        counts.insert("delta echo".to_string(), 4);

        let top = top_grams(&counts, &HashSet::new(), 2);
        let phrases: Vec<&str> = top.unigrams.iter().map(|g| g.phrase.as_str()).collect();
        // Count-descending, ties broken by phrase.
        assert_eq!(phrases, vec!["bravo", "charlie"]);
        assert_eq!(top.bigrams.len(), 1);
    }

    mod end_to_end {
        use chrono::DateTime;
        use serde_json::json;
        use tempfile::TempDir;

        use super::super::*;
        use crate::models::{ContentType, Item, Page, SearchWindow};
        use crate::storage::CollectStorage;

        #[tokio::test]
        async fn test_run_snowball_over_collected_pages() {
            let tmp = TempDir::new().unwrap();
            let storage = LocalStorage::new(tmp.path());
            let mut config = Config::default();
            config.snowball.top_n = 10;

            let start = DateTime::from_timestamp(1_654_041_600, 0).unwrap(); // 2022-06-01
            let window =
                SearchWindow::new(ContentType::Comment, "q", start, None, 250).unwrap();
            let items: Vec<Item> = (0..3)
                .map(|i| Item {
                    id: format!("c{i}"),
                    created_at: start,
                    payload: json!({
                        "id": format!("c{i}"),
                        "created_utc": 1_654_041_600,
                        "body": "ballot curing deadline extended"
                    }),
                })
                .collect();
            storage
                .write_page("reddit", &window, 0, &Page::new(items))
                .await
                .unwrap();

            let path = run_snowball(
                &config,
                &storage,
                "2",
                &["ballot".to_string()],
                start,
                start,
            )
            .await
            .unwrap();

            let csv = std::fs::read_to_string(&path).unwrap();
            assert!(csv.starts_with("platform,phrase,count\n"));
            assert!(csv.contains("reddit,curing,3"));
            assert!(csv.contains("reddit,curing deadline,3"));
            // Tracked keywords never come back as candidates.
            assert!(!csv.contains("reddit,ballot,"));
        }
    }
}
