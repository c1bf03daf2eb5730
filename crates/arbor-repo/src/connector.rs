//! Location strings → repositories.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::memory::MemoryRepository;
use crate::{Connector, RepoError, RepoResult, Repository};

/// Understands two location forms:
///
/// - `mem:<name>` (or `memory:<name>`): a named in-process repository that
///   lives as long as the connector, so logging out and back in keeps content.
/// - `file:<path>` or any path ending in `.json`: a snapshot-backed repository.
#[derive(Default)]
pub struct LocationConnector {
    opened: Mutex<HashMap<String, MemoryRepository>>,
}

impl LocationConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `repo` for `location` instead of resolving it.
    pub fn with_repository(self, location: impl Into<String>, repo: MemoryRepository) -> Self {
        self.opened.lock().insert(location.into(), repo);
        self
    }
}

impl Connector for LocationConnector {
    fn open(&self, location: &str) -> RepoResult<Arc<dyn Repository>> {
        let location = location.trim();
        let mut opened = self.opened.lock();
        if let Some(repo) = opened.get(location) {
            return Ok(Arc::new(repo.clone()));
        }

        let repo = if let Some(name) = location
            .strip_prefix("mem:")
            .or_else(|| location.strip_prefix("memory:"))
        {
            if name.is_empty() {
                return Err(RepoError::InvalidLocation(location.to_string()));
            }
            MemoryRepository::new(name)
        } else if let Some(path) = location.strip_prefix("file:") {
            MemoryRepository::open(path)?
        } else if location.ends_with(".json") {
            MemoryRepository::open(location)?
        } else {
            return Err(RepoError::InvalidLocation(location.to_string()));
        };

        tracing::debug!(location, "repository opened");
        opened.insert(location.to_string(), repo.clone());
        Ok(Arc::new(repo))
    }
}
