//! Pipeline entry points for the collectors.
//!
//! - `run_harvest`: windowed keyword-search harvesting
//! - `run_archive_sweep` / `run_catalog_poll`: bulletin-board collection
//! - `StreamIngester`: long-lived streaming ingestion
//! - `run_snowball`: keyword expansion from collected text

pub mod archive;
pub mod diff;
pub mod harvest;
pub mod snowball;
pub mod stream;

pub use archive::{SweepOutcome, discover_new_threads, run_archive_sweep, run_catalog_poll};
pub use diff::new_thread_ids;
pub use harvest::{HarvestOutcome, Harvester, run_harvest};
pub use snowball::{GramCount, GramCounter, TopGrams, run_snowball, top_grams};
pub use stream::{Backoff, ConnectionState, StreamIngester};
