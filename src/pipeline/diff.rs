//! Archive snapshot differencing.
//!
//! Detects newly finalized threads by comparing the current archive listing
//! with the previous capture. Only the additive direction is computed: a
//! finalized thread is immutable, so a new id is fetched exactly once, and
//! ids that drop off the listing are not tracked or reported.

use crate::models::ArchiveListing;

/// Thread ids present in `current` but not in `previous`, in id order.
pub fn new_thread_ids(previous: &ArchiveListing, current: &ArchiveListing) -> Vec<String> {
    current.ids.difference(&previous.ids).cloned().collect()
}
