//! Repository client seam for the arbor shell.
//!
//! The shell core never talks to a concrete store. It consumes the traits in
//! this crate:
//!
//! ```text
//!   Connector ──open(location)──► Repository ──login(credentials)──► Session
//!                                                                      │
//!                             nodes, properties, mutations, save ◄─────┤
//!                                                                      │
//!                 ChangeListener ◄──(background thread)── subscribe ◄──┘
//! ```
//!
//! [`MemoryRepository`] is the bundled backend: one shared tree, optional
//! JSON snapshot persistence, and asynchronous change notification.

pub mod connector;
pub mod events;
pub mod memory;
pub mod path;
pub mod value;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

pub use connector::LocationConnector;
pub use events::{ChangeEvent, ChangeListener, EventKind, SubscriptionId};
pub use memory::MemoryRepository;
pub use value::{NodeId, NodeInfo, Property, PropertyType};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("login failed: {0}")]
    Login(String),
    #[error("session is closed")]
    SessionClosed,
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("item already exists: {0}")]
    ItemExists(String),
    #[error("no such node type: {0}")]
    NoSuchNodeType(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("{0}")]
    ValueFormat(String),
    #[error("invalid repository location `{0}`")]
    InvalidLocation(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Resolves a location string (URL, file path, ...) to a repository.
pub trait Connector: Send + Sync {
    fn open(&self, location: &str) -> RepoResult<Arc<dyn Repository>>;
}

pub trait Repository: Send + Sync {
    fn login(&self, credentials: &Credentials, workspace: Option<&str>)
        -> RepoResult<Arc<dyn Session>>;

    /// Short human-readable description, e.g. `memory:default`.
    fn describe(&self) -> String;
}

/// An authenticated view of one workspace.
///
/// All operations block until the backend answers. Mutations publish change
/// events to subscribed listeners once they succeed.
pub trait Session: Send + Sync {
    fn user(&self) -> &str;
    fn workspace(&self) -> &str;
    fn is_live(&self) -> bool;

    fn root(&self) -> RepoResult<NodeInfo>;
    fn node_by_id(&self, id: NodeId) -> RepoResult<NodeInfo>;
    fn node_by_path(&self, path: &str) -> RepoResult<NodeInfo>;
    fn children(&self, id: NodeId) -> RepoResult<Vec<NodeInfo>>;
    fn properties(&self, id: NodeId) -> RepoResult<Vec<Property>>;
    fn property(&self, id: NodeId, name: &str) -> RepoResult<Option<Property>>;

    fn add_node(&self, parent: NodeId, name: &str, primary_type: &str) -> RepoResult<NodeInfo>;
    fn remove_node(&self, id: NodeId) -> RepoResult<()>;
    fn move_node(&self, src_path: &str, dest_path: &str) -> RepoResult<()>;
    fn copy_node(&self, src_path: &str, dest_path: &str) -> RepoResult<NodeInfo>;
    fn add_mixin(&self, id: NodeId, mixin: &str) -> RepoResult<()>;
    fn remove_mixin(&self, id: NodeId, mixin: &str) -> RepoResult<()>;
    /// Create or replace a property. Values are validated against its type.
    fn set_property(&self, id: NodeId, property: Property) -> RepoResult<()>;
    fn remove_property(&self, id: NodeId, name: &str) -> RepoResult<()>;

    fn save(&self) -> RepoResult<()>;
    fn refresh(&self, keep_changes: bool) -> RepoResult<()>;

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> RepoResult<SubscriptionId>;
    fn unsubscribe(&self, id: SubscriptionId) -> RepoResult<()>;

    /// Idempotent.
    fn logout(&self);
}
