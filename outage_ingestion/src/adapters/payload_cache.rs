use crate::adapters::RawPayload;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Transient per-process cache of raw payloads, keyed by content hash.
///
/// Serves two purposes: quarantine review and retry can re-parse a payload
/// without re-fetching it, and a cycle can skip parsing entirely when the
/// upstream bytes are identical to the previous poll.
#[derive(Default)]
pub struct PayloadCache {
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    by_hash: HashMap<String, RawPayload>,
    // source key (usually the URL) -> content hash seen on the last poll
    last_seen: HashMap<String, String>,
}

impl PayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the payload and reports whether the content differs from what
    /// the same source served on the previous poll. The first observation of
    /// a source counts as changed. Only the latest payload per source is
    /// retained; a superseded payload is evicted and can no longer be
    /// re-parsed.
    pub fn store(&self, source_key: &str, payload: RawPayload) -> bool {
        let mut inner = self.inner.lock().expect("payload cache lock poisoned");
        let hash = payload.content_hash.clone();
        let previous = inner.last_seen.insert(source_key.to_owned(), hash.clone());
        let changed = previous.as_deref() != Some(hash.as_str());
        if changed {
            if let Some(superseded) = previous {
                inner.by_hash.remove(&superseded);
            }
        } else {
            debug!(source = source_key, "source content unchanged since last poll");
        }
        inner.by_hash.insert(hash, payload);
        changed
    }

    pub fn get(&self, content_hash: &str) -> Option<RawPayload> {
        let inner = self.inner.lock().expect("payload cache lock poisoned");
        inner.by_hash.get(content_hash).cloned()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("payload cache lock poisoned");
        inner.by_hash.clear();
        inner.last_seen.clear();
    }
}
