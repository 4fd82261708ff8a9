//! Search window and result page models.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{ContentType, Item};

/// The unit of work for the search harvester: one time-bounded query.
///
/// `lower_bound` is inclusive, `upper_bound` exclusive. Within one run the
/// lower bound only ever moves forward.
#[derive(Debug, Clone)]
pub struct SearchWindow {
    pub content_type: ContentType,
    pub query: String,
    pub lower_bound: DateTime<Utc>,
    pub upper_bound: Option<DateTime<Utc>>,
    pub page_size: usize,
}

impl SearchWindow {
    pub fn new(
        content_type: ContentType,
        query: impl Into<String>,
        lower_bound: DateTime<Utc>,
        upper_bound: Option<DateTime<Utc>>,
        page_size: usize,
    ) -> Result<Self> {
        if let Some(upper) = upper_bound {
            if lower_bound >= upper {
                return Err(AppError::validation(format!(
                    "Window lower bound {lower_bound} must precede upper bound {upper}"
                )));
            }
        }
        Ok(Self {
            content_type,
            query: query.into(),
            lower_bound,
            upper_bound,
            page_size,
        })
    }

    /// Advance the lower bound one second past the newest item seen.
    ///
    /// The +1s step excludes everything with a timestamp <= `max_ts` from the
    /// next page without a seen-set. Items sharing that timestamp but not yet
    /// visible upstream are skipped; an accepted tolerance, not a bug.
    pub fn advance_past(&mut self, max_ts: DateTime<Utc>) {
        let next = max_ts + Duration::seconds(1);
        debug_assert!(next > self.lower_bound);
        self.lower_bound = next;
    }

    /// Whether the advancing lower bound has met or passed the upper bound.
    pub fn exhausted(&self) -> bool {
        match self.upper_bound {
            Some(upper) => self.lower_bound >= upper,
            None => false,
        }
    }
}

/// One fetched batch of items for a window.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
}

impl Page {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum creation timestamp across the page.
    ///
    /// Upstream sources do not guarantee time order within a page, so this
    /// takes the max rather than reading the last element.
    pub fn max_created_at(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|item| item.created_at).max()
    }
}
