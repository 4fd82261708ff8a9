// src/models/mod.rs

//! Domain models for the collectors.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod checkpoint;
mod config;
mod item;
mod snapshot;
mod window;

// Re-export all public types
pub use checkpoint::Watermark;
pub use config::{
    BoardSourceConfig, Config, HarvestConfig, HttpConfig, Param, PathsConfig, SearchEndpoint,
    SearchSourceConfig, SnowballConfig, StreamConfig,
};
pub use item::{ContentType, Item, ItemFields, TimeEncoding};
pub use snapshot::{ArchiveListing, CatalogRecord};
pub use window::{Page, SearchWindow};
