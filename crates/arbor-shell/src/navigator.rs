//! Connection lifecycle, current position, and path resolution.
//!
//! The navigator owns the session. It connects lazily on first use and
//! keeps the current and previous node by identifier, so a position survives
//! renames elsewhere in the tree. Mutations go through it so the name cache
//! is evicted right after they succeed; change events from other sessions
//! evict it asynchronously.

use std::sync::Arc;

use arbor_repo::path::{is_within, normalize, parent_path};
use arbor_repo::{
    Connector, Credentials, NodeId, NodeInfo, Property, PropertyType, Session, SubscriptionId,
};

use crate::cache::{NameCache, NameKind, NameSet};
use crate::{ShellConfig, ShellError};

pub const DISCONNECTED_PROMPT: &str = "arbor:>";

/// Where the user is. Both slots are empty while disconnected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub current: Option<NodeId>,
    pub previous: Option<NodeId>,
}

pub struct SessionNavigator {
    connector: Arc<dyn Connector>,
    server: String,
    credentials: Credentials,
    workspace: Option<String>,
    session: Option<Arc<dyn Session>>,
    subscription: Option<SubscriptionId>,
    state: NavigationState,
    cache: Arc<NameCache>,
    prompt: String,
    last_error: Option<String>,
}

impl SessionNavigator {
    pub fn new(config: &ShellConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            server: config.server.clone(),
            credentials: Credentials::new(config.username.clone(), config.password.clone()),
            workspace: config.workspace.clone(),
            session: None,
            subscription: None,
            state: NavigationState::default(),
            cache: Arc::new(NameCache::new()),
            prompt: DISCONNECTED_PROMPT.to_string(),
            last_error: None,
        }
    }

    // ---------------------------------------------------------------------
    // Connection lifecycle
    // ---------------------------------------------------------------------

    /// Log in with the configured server and credentials unless already
    /// connected. Failures are logged, remembered for
    /// [`Self::take_last_error`], and leave the navigator disconnected.
    pub fn connect(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }
        match self.try_connect() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(server = %self.server, error = %err, "login failed");
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Open a fresh session, replacing any current one.
    pub fn try_connect(&mut self) -> Result<(), ShellError> {
        self.logout();

        let repository = self.connector.open(&self.server)?;
        let session = repository.login(&self.credentials, self.workspace.as_deref())?;
        let (subscription, root) = match session
            .subscribe(self.cache.clone())
            .and_then(|id| session.root().map(|root| (id, root)))
        {
            Ok(pair) => pair,
            Err(err) => {
                session.logout();
                return Err(err.into());
            }
        };

        tracing::info!(
            server = %self.server,
            repository = %repository.describe(),
            user = %session.user(),
            workspace = %session.workspace(),
            "logged in"
        );
        self.cache.evict_all();
        self.state = NavigationState {
            current: Some(root.id),
            previous: None,
        };
        self.prompt = format_prompt(session.user(), &root.path);
        self.session = Some(session);
        self.subscription = Some(subscription);
        self.last_error = None;
        Ok(())
    }

    /// End the session and forget all positions. Safe to call repeatedly.
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(id) = self.subscription.take() {
                if let Err(err) = session.unsubscribe(id) {
                    tracing::debug!(error = %err, "unsubscribe during logout failed");
                }
            }
            session.logout();
            tracing::info!(server = %self.server, "logged out");
        }
        self.subscription = None;
        self.state = NavigationState::default();
        self.cache.evict_all();
        self.prompt = DISCONNECTED_PROMPT.to_string();
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_live())
    }

    /// The live session, without connecting.
    pub fn session(&self) -> Result<&Arc<dyn Session>, ShellError> {
        match &self.session {
            Some(session) if session.is_live() => Ok(session),
            _ => Err(ShellError::NotConnected(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| "use `login` to connect".to_string()),
            )),
        }
    }

    /// The live session, connecting first if needed.
    pub fn ensure_connected(&mut self) -> Result<Arc<dyn Session>, ShellError> {
        if !self.is_connected() && !self.connect() {
            return Err(ShellError::NotConnected(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| "login failed".to_string()),
            ));
        }
        self.session().cloned()
    }

    pub fn take_last_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Point at another repository. Ends the current session.
    pub fn set_server(&mut self, server: impl Into<String>) {
        self.logout();
        self.server = server.into();
    }

    /// Switch user. Ends the current session.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.logout();
        self.credentials = credentials;
    }

    pub fn set_workspace(&mut self, workspace: Option<String>) {
        self.logout();
        self.workspace = workspace;
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn cache(&self) -> &Arc<NameCache> {
        &self.cache
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    // ---------------------------------------------------------------------
    // Position
    // ---------------------------------------------------------------------

    /// The current node, connecting lazily.
    pub fn current_node(&mut self) -> Result<NodeInfo, ShellError> {
        self.ensure_connected()?;
        self.position()
    }

    /// The current node of an already-open session.
    pub fn position(&self) -> Result<NodeInfo, ShellError> {
        let session = self.session()?;
        match self.state.current {
            Some(id) => session
                .node_by_id(id)
                .map_err(|_| ShellError::NotFound("the current node no longer exists".to_string())),
            None => Ok(session.root()?),
        }
    }

    pub fn root(&self) -> Result<NodeInfo, ShellError> {
        Ok(self.session()?.root()?)
    }

    /// Resolve a path against the current node.
    ///
    /// `""` and `.` name the current node, `/` the root and `..` the parent.
    /// A single segment naming a reference property of the current node
    /// follows the reference (first value if multi-valued). Anything else is
    /// normalised lexically, absolute or relative to the current path.
    pub fn resolve_path(&self, path: &str) -> Result<NodeInfo, ShellError> {
        let session = self.session()?;
        let current = self.position()?;
        let path = path.trim();
        match path {
            "" | "." => return Ok(current),
            "/" => return Ok(session.root()?),
            ".." => {
                let parent = parent_path(&current.path)
                    .ok_or_else(|| ShellError::NotFound("the root node has no parent".to_string()))?;
                return Ok(session.node_by_path(&parent)?);
            }
            _ => {}
        }

        if !path.contains('/') {
            if let Some(target) = follow_reference(session.as_ref(), &current, path)? {
                return Ok(target);
            }
        }

        let absolute = self.absolute_path(path)?;
        Ok(session.node_by_path(&absolute)?)
    }

    /// Resolve lexically, without following reference properties. Used where
    /// a path names a node to mutate.
    pub fn lookup(&self, path: &str) -> Result<NodeInfo, ShellError> {
        let absolute = self.absolute_path(path.trim())?;
        Ok(self.session()?.node_by_path(&absolute)?)
    }

    /// Lexically normalise `path` against the current node without checking existence.
    pub fn absolute_path(&self, path: &str) -> Result<String, ShellError> {
        let base = if path.starts_with('/') {
            "/".to_string()
        } else {
            self.position()?.path
        };
        normalize(&base, path.split('/'))
            .ok_or_else(|| ShellError::NotFound(format!("path climbs above the root: {path}")))
    }

    /// Resolve and move there. The old position becomes the previous one.
    pub fn try_cd(&mut self, path: &str) -> Result<NodeInfo, ShellError> {
        self.ensure_connected()?;
        let node = self.resolve_path(path)?;
        self.set_current(&node);
        Ok(node)
    }

    /// [`Self::try_cd`] reporting only success. State is untouched on failure.
    pub fn cd(&mut self, path: &str) -> bool {
        match self.try_cd(path) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(path, error = %err, "cd failed");
                false
            }
        }
    }

    /// Swap current and previous. `false` when there is no previous node.
    pub fn cd_previous(&mut self) -> Result<bool, ShellError> {
        let Some(previous) = self.state.previous else {
            return Ok(false);
        };
        let node = self
            .session()?
            .node_by_id(previous)
            .map_err(|_| ShellError::NotFound("the previous node no longer exists".to_string()))?;
        self.set_current(&node);
        Ok(true)
    }

    pub fn cd_by_id(&mut self, id: NodeId) -> Result<NodeInfo, ShellError> {
        self.ensure_connected()?;
        let node = self.node_by_id(id)?;
        self.set_current(&node);
        Ok(node)
    }

    pub fn node_by_id(&self, id: NodeId) -> Result<NodeInfo, ShellError> {
        Ok(self.session()?.node_by_id(id)?)
    }

    fn set_current(&mut self, node: &NodeInfo) {
        self.state.previous = self.state.current.replace(node.id);
        self.update_prompt(node);
    }

    /// Re-read the current node after a mutation that may have changed its
    /// path. Falls back to the root when it no longer exists.
    fn sync_position(&mut self) {
        match self.position() {
            Ok(node) => self.update_prompt(&node),
            Err(_) => {
                if let Ok(root) = self.root() {
                    self.state.current = Some(root.id);
                    self.update_prompt(&root);
                }
            }
        }
    }

    fn update_prompt(&mut self, node: &NodeInfo) {
        let user = self
            .session
            .as_ref()
            .map(|s| s.user().to_string())
            .unwrap_or_else(|| self.credentials.username.clone());
        self.prompt = format_prompt(&user, &node.path);
    }

    /// Status lines for the `status` command.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Server:     {}", self.server),
            format!("User:       {}", self.credentials.username),
        ];
        match self.session() {
            Ok(session) => {
                lines.push(format!("Workspace:  {}", session.workspace()));
                lines.push("Connected:  yes".to_string());
                if let Ok(node) = self.position() {
                    lines.push(format!("Current:    {}", node.path));
                }
            }
            Err(_) => {
                lines.push(format!(
                    "Workspace:  {}",
                    self.workspace.as_deref().unwrap_or("(default)")
                ));
                lines.push("Connected:  no".to_string());
            }
        }
        lines
    }

    // ---------------------------------------------------------------------
    // Cached names and pass-through reads
    // ---------------------------------------------------------------------

    pub fn names(&self, node: &NodeInfo, kind: NameKind) -> Result<NameSet, ShellError> {
        let session = self.session()?;
        self.cache
            .get_or_fetch(&node.path, kind, || match kind {
                NameKind::Nodes => session
                    .children(node.id)
                    .map(|c| c.into_iter().map(|n| n.name).collect()),
                NameKind::Properties => session
                    .properties(node.id)
                    .map(|p| p.into_iter().map(|p| p.name).collect()),
            })
            .map_err(ShellError::from)
    }

    pub fn node_names(&self, node: &NodeInfo) -> Result<NameSet, ShellError> {
        self.names(node, NameKind::Nodes)
    }

    pub fn property_names(&self, node: &NodeInfo) -> Result<NameSet, ShellError> {
        self.names(node, NameKind::Properties)
    }

    pub fn children(&self, node: &NodeInfo) -> Result<Vec<NodeInfo>, ShellError> {
        Ok(self.session()?.children(node.id)?)
    }

    pub fn properties(&self, node: &NodeInfo) -> Result<Vec<Property>, ShellError> {
        Ok(self.session()?.properties(node.id)?)
    }

    pub fn property(&self, node: &NodeInfo, name: &str) -> Result<Property, ShellError> {
        self.session()?
            .property(node.id, name)?
            .ok_or_else(|| ShellError::NotFound(format!("no property `{name}` on {}", node.path)))
    }

    // ---------------------------------------------------------------------
    // Mutations: evict after success only
    // ---------------------------------------------------------------------

    pub fn add_node(
        &self,
        parent: &NodeInfo,
        name: &str,
        primary_type: &str,
    ) -> Result<NodeInfo, ShellError> {
        let node = self.session()?.add_node(parent.id, name, primary_type)?;
        self.cache.evict(&parent.path);
        self.cache.evict_subtree(&node.path);
        Ok(node)
    }

    /// Remove `node`. If the current node was inside it, the current node
    /// becomes the removed node's parent.
    pub fn remove_node(&mut self, node: &NodeInfo) -> Result<(), ShellError> {
        let session = self.session()?.clone();
        let current_inside = self
            .position()
            .map(|current| is_within(&current.path, &node.path))
            .unwrap_or(false);

        session.remove_node(node.id)?;
        self.cache.evict_subtree(&node.path);
        let Some(parent) = parent_path(&node.path) else {
            return Ok(());
        };
        self.cache.evict(&parent);

        if current_inside {
            if let Ok(parent) = session.node_by_path(&parent) {
                self.state.current = Some(parent.id);
                self.update_prompt(&parent);
            }
        }
        Ok(())
    }

    /// Positions are kept by id, so moving the current node or an ancestor
    /// keeps the position and only its path (and the prompt) changes.
    pub fn move_node(&mut self, src: &NodeInfo, dest_path: &str) -> Result<(), ShellError> {
        self.session()?.move_node(&src.path, dest_path)?;
        self.cache.evict_subtree(&src.path);
        self.cache.evict_subtree(dest_path);
        for path in [src.path.as_str(), dest_path].into_iter().filter_map(parent_path) {
            self.cache.evict(&path);
        }
        self.sync_position();
        Ok(())
    }

    pub fn copy_node(&self, src: &NodeInfo, dest_path: &str) -> Result<NodeInfo, ShellError> {
        let copy = self.session()?.copy_node(&src.path, dest_path)?;
        self.cache.evict_subtree(&copy.path);
        if let Some(parent) = parent_path(&copy.path) {
            self.cache.evict(&parent);
        }
        Ok(copy)
    }

    pub fn add_mixin(&self, node: &NodeInfo, mixin: &str) -> Result<(), ShellError> {
        self.session()?.add_mixin(node.id, mixin)?;
        self.cache.evict(&node.path);
        Ok(())
    }

    pub fn remove_mixin(&self, node: &NodeInfo, mixin: &str) -> Result<(), ShellError> {
        self.session()?.remove_mixin(node.id, mixin)?;
        self.cache.evict(&node.path);
        Ok(())
    }

    pub fn set_property(&self, node: &NodeInfo, property: Property) -> Result<(), ShellError> {
        self.session()?.set_property(node.id, property)?;
        self.cache.evict(&node.path);
        Ok(())
    }

    pub fn remove_property(&self, node: &NodeInfo, name: &str) -> Result<(), ShellError> {
        self.session()?.remove_property(node.id, name)?;
        self.cache.evict(&node.path);
        Ok(())
    }

    pub fn save(&self) -> Result<(), ShellError> {
        Ok(self.session()?.save()?)
    }

    /// Refresh the session; discarding changes also empties the cache.
    pub fn refresh(&mut self, keep_changes: bool) -> Result<(), ShellError> {
        self.session()?.refresh(keep_changes)?;
        if !keep_changes {
            self.cache.evict_all();
            self.sync_position();
        }
        Ok(())
    }
}

impl Drop for SessionNavigator {
    fn drop(&mut self) {
        self.logout();
    }
}

pub fn format_prompt(user: &str, path: &str) -> String {
    format!("{user}:{path}>")
}

fn follow_reference(
    session: &dyn Session,
    current: &NodeInfo,
    name: &str,
) -> Result<Option<NodeInfo>, ShellError> {
    let Some(property) = session.property(current.id, name)? else {
        return Ok(None);
    };
    if property.kind != PropertyType::Reference {
        return Ok(None);
    }
    let Some(value) = property.first_value() else {
        return Ok(None);
    };
    let target: NodeId = value.parse()?;
    session
        .node_by_id(target)
        .map(Some)
        .map_err(|_| ShellError::NotFound(format!("no such reference target: {name} -> {value}")))
}
