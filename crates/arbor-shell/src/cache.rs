//! Per-path cache of child-node names and property names.
//!
//! Entries are filled lazily from the session on first request and evicted
//! by the session's change events, which arrive on a background thread.
//! Each kind has its own map behind its own lock; a fetch runs with no lock
//! held. An epoch counter per map makes sure a fetch that raced an eviction
//! is returned to its caller but never stored.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arbor_repo::path::{is_within, parent_path};
use arbor_repo::{ChangeEvent, ChangeListener};
use parking_lot::Mutex;

/// Sorted, shared, immutable set of names.
pub type NameSet = Arc<BTreeSet<String>>;

pub const PARENT_ENTRY: &str = "..";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Nodes,
    Properties,
}

#[derive(Default)]
struct NameMap {
    entries: HashMap<String, NameSet>,
    epoch: u64,
}

#[derive(Default)]
pub struct NameCache {
    nodes: Mutex<NameMap>,
    properties: Mutex<NameMap>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: NameKind) -> &Mutex<NameMap> {
        match kind {
            NameKind::Nodes => &self.nodes,
            NameKind::Properties => &self.properties,
        }
    }

    /// Cached names for `path`, fetching them with `fetch` on a miss.
    ///
    /// Node listings of non-root paths also contain `..`.
    pub fn get_or_fetch<E>(
        &self,
        path: &str,
        kind: NameKind,
        fetch: impl FnOnce() -> Result<Vec<String>, E>,
    ) -> Result<NameSet, E> {
        let epoch = {
            let map = self.map(kind).lock();
            if let Some(hit) = map.entries.get(path) {
                return Ok(hit.clone());
            }
            map.epoch
        };

        let mut names: BTreeSet<String> = fetch()?.into_iter().collect();
        if kind == NameKind::Nodes && path != "/" {
            names.insert(PARENT_ENTRY.to_string());
        }
        let names = Arc::new(names);

        let mut map = self.map(kind).lock();
        if map.epoch != epoch {
            tracing::trace!(path, ?kind, "listing raced an eviction; not cached");
            return Ok(names);
        }
        Ok(map
            .entries
            .entry(path.to_string())
            .or_insert(names)
            .clone())
    }

    pub fn peek(&self, path: &str, kind: NameKind) -> Option<NameSet> {
        self.map(kind).lock().entries.get(path).cloned()
    }

    pub fn contains(&self, path: &str, kind: NameKind) -> bool {
        self.map(kind).lock().entries.contains_key(path)
    }

    pub fn len(&self, kind: NameKind) -> usize {
        self.map(kind).lock().entries.len()
    }

    /// Drop both entries for `path`.
    pub fn evict(&self, path: &str) {
        for kind in [NameKind::Nodes, NameKind::Properties] {
            let mut map = self.map(kind).lock();
            map.entries.remove(path);
            map.epoch += 1;
        }
    }

    /// Drop entries for `path` and everything beneath it.
    pub fn evict_subtree(&self, path: &str) {
        for kind in [NameKind::Nodes, NameKind::Properties] {
            let mut map = self.map(kind).lock();
            map.entries.retain(|p, _| !is_within(p, path));
            map.epoch += 1;
        }
    }

    pub fn evict_all(&self) {
        for kind in [NameKind::Nodes, NameKind::Properties] {
            let mut map = self.map(kind).lock();
            map.entries.clear();
            map.epoch += 1;
        }
    }

    /// Paths whose entries a batch invalidates, each once.
    ///
    /// Node events touch the node itself and its parent; property events
    /// touch only the owning node.
    pub fn affected_paths(events: &[ChangeEvent]) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        for event in events {
            if event.is_node_event() {
                if let Some(parent) = parent_path(&event.path) {
                    paths.insert(parent);
                }
                paths.insert(event.path.clone());
            } else {
                paths.insert(event.owner_path());
            }
        }
        paths
    }

    /// Evict everything a batch invalidates. Returns the number of paths evicted.
    pub fn apply_change_batch(&self, events: &[ChangeEvent]) -> usize {
        let paths = Self::affected_paths(events);
        for path in &paths {
            self.evict(path);
        }
        tracing::debug!(events = events.len(), paths = paths.len(), "name cache invalidated");
        paths.len()
    }
}

impl ChangeListener for NameCache {
    fn on_changes(&self, events: &[ChangeEvent]) {
        self.apply_change_batch(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_repo::EventKind;
    use std::convert::Infallible;

    fn names(list: &'static [&'static str]) -> impl FnOnce() -> Result<Vec<String>, Infallible> {
        move || Ok(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let cache = NameCache::new();
        let first = cache
            .get_or_fetch("/a", NameKind::Nodes, names(&["x", "y"]))
            .unwrap();
        let second = cache
            .get_or_fetch::<Infallible>("/a", NameKind::Nodes, || {
                panic!("repository consulted on a cache hit")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn node_listing_gets_parent_entry_except_at_root() {
        let cache = NameCache::new();
        let root = cache
            .get_or_fetch("/", NameKind::Nodes, names(&["a"]))
            .unwrap();
        assert!(!root.contains(PARENT_ENTRY));

        let child = cache
            .get_or_fetch("/a", NameKind::Nodes, names(&["b"]))
            .unwrap();
        assert!(child.contains(PARENT_ENTRY));

        let props = cache
            .get_or_fetch("/a", NameKind::Properties, names(&["title"]))
            .unwrap();
        assert!(!props.contains(PARENT_ENTRY));
    }

    #[test]
    fn fetch_errors_are_not_cached() {
        let cache = NameCache::new();
        let result: Result<NameSet, &str> =
            cache.get_or_fetch("/a", NameKind::Nodes, || Err("backend down"));
        assert!(result.is_err());
        assert!(!cache.contains("/a", NameKind::Nodes));
    }

    #[test]
    fn node_added_evicts_node_and_parent() {
        let cache = NameCache::new();
        for path in ["/a", "/a/b", "/c"] {
            cache
                .get_or_fetch(path, NameKind::Nodes, names(&[]))
                .unwrap();
            cache
                .get_or_fetch(path, NameKind::Properties, names(&[]))
                .unwrap();
        }

        cache.apply_change_batch(&[ChangeEvent::new(EventKind::NodeAdded, "/a/b")]);

        assert!(!cache.contains("/a", NameKind::Nodes));
        assert!(!cache.contains("/a", NameKind::Properties));
        assert!(!cache.contains("/a/b", NameKind::Nodes));
        assert!(cache.contains("/c", NameKind::Nodes));
    }

    #[test]
    fn property_event_evicts_only_owner() {
        let cache = NameCache::new();
        for path in ["/a", "/a/b"] {
            cache
                .get_or_fetch(path, NameKind::Properties, names(&["p"]))
                .unwrap();
        }

        cache.apply_change_batch(&[ChangeEvent::new(EventKind::PropertyChanged, "/a/b/p")]);

        assert!(!cache.contains("/a/b", NameKind::Properties));
        assert!(cache.contains("/a", NameKind::Properties));
    }

    #[test]
    fn batch_evicts_each_path_once() {
        let events = vec![
            ChangeEvent::new(EventKind::PropertyAdded, "/a/p"),
            ChangeEvent::new(EventKind::PropertyChanged, "/a/q"),
            ChangeEvent::new(EventKind::NodeAdded, "/a"),
        ];
        let affected = NameCache::affected_paths(&events);
        assert_eq!(
            affected.into_iter().collect::<Vec<_>>(),
            vec!["/".to_string(), "/a".to_string()]
        );
        assert_eq!(NameCache::new().apply_change_batch(&events), 2);
    }

    #[test]
    fn subtree_eviction_spares_siblings() {
        let cache = NameCache::new();
        for path in ["/a", "/a/b", "/ab", "/"] {
            cache
                .get_or_fetch(path, NameKind::Nodes, names(&[]))
                .unwrap();
        }
        cache.evict_subtree("/a");
        assert!(!cache.contains("/a", NameKind::Nodes));
        assert!(!cache.contains("/a/b", NameKind::Nodes));
        assert!(cache.contains("/ab", NameKind::Nodes));
        assert!(cache.contains("/", NameKind::Nodes));
    }

    #[test]
    fn fetch_racing_an_eviction_is_not_stored() {
        let cache = NameCache::new();
        let result = cache
            .get_or_fetch::<Infallible>("/a", NameKind::Nodes, || {
                cache.evict("/a");
                Ok(vec!["stale".to_string()])
            })
            .unwrap();
        assert!(result.contains("stale"));
        assert!(!cache.contains("/a", NameKind::Nodes));
    }

    #[test]
    fn concurrent_readers_and_evictions_do_not_deadlock() {
        let cache = Arc::new(NameCache::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    let path = format!("/n{}", i % 7);
                    if (i + t) % 5 == 0 {
                        cache.apply_change_batch(&[ChangeEvent::new(EventKind::NodeAdded, path)]);
                    } else {
                        let set = cache
                            .get_or_fetch::<Infallible>(&path, NameKind::Nodes, || {
                                Ok(vec!["x".to_string()])
                            })
                            .unwrap();
                        assert!(set.contains("x"));
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
