use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru_cache::LruCache;

use crate::{AppError, AppResult};

pub const RECENT_POST_TTL: Duration = Duration::from_secs(60 * 60);
pub const PENDING_FILE_MAX_AGE: Duration = Duration::from_secs(30 * 60);

struct RecentPostEntry {
    update_at: i64,
    inserted: Instant,
}

/// Remembers the `update_at` written back onto freshly bridged posts so the
/// resulting self-edit can be recognized and dropped.
///
/// Losing an entry is harmless (one redundant edit goes through the loop),
/// so `put` failing on a full tracker is advisory.
pub struct RecentPostTracker {
    max_entries: usize,
    ttl: Duration,
    entries: Mutex<LruCache<String, RecentPostEntry>>,
}

impl RecentPostTracker {
    pub fn new(max_entries: usize) -> Self {
        Self::with_ttl(max_entries, RECENT_POST_TTL)
    }

    pub fn with_ttl(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl,
            entries: Mutex::new(LruCache::new(max_entries.max(1))),
        }
    }

    pub fn put(&self, post_id: &str, update_at: i64) -> AppResult<()> {
        let mut entries = self.entries.lock().expect("tracker mutex poisoned");
        Self::purge_expired(&mut entries, self.ttl);
        if entries.len() >= self.max_entries {
            return Err(AppError::public(format!(
                "recent post tracker is full ({} entries)",
                self.max_entries
            )));
        }
        entries.insert(
            post_id.to_owned(),
            RecentPostEntry {
                update_at,
                inserted: Instant::now(),
            },
        );
        Ok(())
    }

    /// True when `post_id` is tracked with exactly this `update_at`; the
    /// entry is consumed on match.
    pub fn matches_and_remove(&self, post_id: &str, update_at: i64) -> bool {
        let mut entries = self.entries.lock().expect("tracker mutex poisoned");
        let (expired, matches) = match entries.get_mut(post_id) {
            None => return false,
            Some(entry) => (
                entry.inserted.elapsed() > self.ttl,
                entry.update_at == update_at,
            ),
        };
        if expired {
            entries.remove(post_id);
            return false;
        }
        if !matches {
            return false;
        }
        entries.remove(post_id);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("tracker mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(entries: &mut LruCache<String, RecentPostEntry>, ttl: Duration) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.inserted.elapsed() > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            entries.remove(&key);
        }
    }
}

/// A file uploaded to Matrix ahead of the post that will carry it.
#[derive(Clone, Debug)]
pub struct PendingFile {
    pub file_id: String,
    pub filename: String,
    pub mxc_uri: String,
    pub mime_type: String,
    pub size: i64,
    pub uploaded_at: Instant,
}

/// Holds uploaded files keyed by post id until the post sync drains them.
#[derive(Default)]
pub struct PendingFileTracker {
    entries: Mutex<HashMap<String, Vec<PendingFile>>>,
}

impl PendingFileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, post_id: &str, file: PendingFile) {
        let mut entries = self.entries.lock().expect("tracker mutex poisoned");
        entries.entry(post_id.to_owned()).or_default().push(file);
    }

    /// Read-and-remove: the caller becomes responsible for the files.
    pub fn take_files(&self, post_id: &str) -> Vec<PendingFile> {
        let mut entries = self.entries.lock().expect("tracker mutex poisoned");
        entries.remove(post_id).unwrap_or_default()
    }

    pub fn remove_file(&self, post_id: &str, file_id: &str) -> bool {
        let mut entries = self.entries.lock().expect("tracker mutex poisoned");
        let Some(files) = entries.get_mut(post_id) else {
            return false;
        };
        let before = files.len();
        files.retain(|f| f.file_id != file_id);
        let removed = files.len() < before;
        if files.is_empty() {
            entries.remove(post_id);
        }
        removed
    }

    pub fn cleanup(&self, max_age: Duration) {
        let mut entries = self.entries.lock().expect("tracker mutex poisoned");
        entries.retain(|_, files| {
            files.retain(|f| f.uploaded_at.elapsed() <= max_age);
            !files.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("tracker mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str) -> PendingFile {
        PendingFile {
            file_id: id.to_owned(),
            filename: format!("{id}.png"),
            mxc_uri: format!("mxc://example.com/{id}"),
            mime_type: "image/png".to_owned(),
            size: 42,
            uploaded_at: Instant::now(),
        }
    }

    #[test]
    fn recent_post_match_consumes_entry() {
        let tracker = RecentPostTracker::new(10);
        tracker.put("p1", 1000).unwrap();
        assert!(!tracker.matches_and_remove("p1", 999));
        assert!(tracker.matches_and_remove("p1", 1000));
        assert!(!tracker.matches_and_remove("p1", 1000));
    }

    #[test]
    fn recent_post_tracker_reports_capacity() {
        let tracker = RecentPostTracker::new(2);
        tracker.put("p1", 1).unwrap();
        tracker.put("p2", 2).unwrap();
        assert!(tracker.put("p3", 3).is_err());
        // Consuming an entry frees a slot.
        assert!(tracker.matches_and_remove("p1", 1));
        tracker.put("p3", 3).unwrap();
    }

    #[test]
    fn recent_post_entries_expire() {
        let tracker = RecentPostTracker::with_ttl(2, Duration::ZERO);
        tracker.put("p1", 1).unwrap();
        assert!(!tracker.matches_and_remove("p1", 1));
        // Expired entries do not count against capacity.
        tracker.put("p2", 2).unwrap();
        tracker.put("p3", 3).unwrap();
        assert!(tracker.len() <= 2);
    }

    #[test]
    fn pending_files_drain_once() {
        let tracker = PendingFileTracker::new();
        tracker.add_file("p1", file("f1"));
        tracker.add_file("p1", file("f2"));
        let files = tracker.take_files("p1");
        assert_eq!(files.len(), 2);
        assert!(tracker.take_files("p1").is_empty());
    }

    #[test]
    fn pending_file_removal_by_id() {
        let tracker = PendingFileTracker::new();
        tracker.add_file("p1", file("f1"));
        tracker.add_file("p1", file("f2"));
        assert!(tracker.remove_file("p1", "f1"));
        assert!(!tracker.remove_file("p1", "f1"));
        assert_eq!(tracker.take_files("p1").len(), 1);
        assert!(!tracker.remove_file("missing", "f1"));
    }

    #[test]
    fn pending_file_cleanup_purges_old_entries() {
        let tracker = PendingFileTracker::new();
        tracker.add_file("p1", file("f1"));
        tracker.cleanup(Duration::ZERO);
        assert!(tracker.is_empty());
    }
}
