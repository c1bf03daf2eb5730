//! In-process repository backend.
//!
//! One tree shared by every session of the same [`MemoryRepository`]. When
//! opened from a file the tree is loaded from, and saved to, a JSON snapshot.
//! Mutations apply immediately; `save` makes the current tree the state that
//! `refresh(false)` reverts to.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::events::{ChangeEvent, ChangeListener, Dispatcher, EventKind, SubscriptionId};
use crate::path::{is_valid_name, join_path, last_segment, parent_path};
use crate::value::{NodeId, NodeInfo, Property, PropertyType};
use crate::{Credentials, RepoError, RepoResult, Repository, Session};

pub const PRIMARY_TYPE_PROPERTY: &str = "jcr:primaryType";
pub const MIXIN_TYPES_PROPERTY: &str = "jcr:mixinTypes";
pub const DEFAULT_NODE_TYPE: &str = "nt:unstructured";
pub const DEFAULT_WORKSPACE: &str = "default";

pub const PRIMARY_TYPES: &[&str] = &[
    "nt:base",
    "nt:unstructured",
    "nt:folder",
    "nt:file",
    "nt:resource",
];

pub const MIXIN_TYPES: &[&str] = &[
    "mix:referenceable",
    "mix:versionable",
    "mix:lockable",
    "mix:title",
    "mix:created",
];

const SNAPSHOT_FORMAT: &str = "arbor_snapshot_v1";

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone)]
struct StoredNode {
    id: NodeId,
    name: String,
    parent: Option<NodeId>,
    primary_type: String,
    mixins: Vec<String>,
    properties: BTreeMap<String, Property>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Tree {
    root: NodeId,
    nodes: HashMap<NodeId, StoredNode>,
}

impl Tree {
    fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            StoredNode {
                id: root,
                name: String::new(),
                parent: None,
                primary_type: "nt:base".to_string(),
                mixins: Vec::new(),
                properties: BTreeMap::new(),
                children: Vec::new(),
            },
        );
        Self { root, nodes }
    }

    fn get(&self, id: NodeId) -> RepoResult<&StoredNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| RepoError::ItemNotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: NodeId) -> RepoResult<&mut StoredNode> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| RepoError::ItemNotFound(id.to_string()))
    }

    fn path_of(&self, id: NodeId) -> RepoResult<String> {
        let mut segments = Vec::new();
        let mut cursor = self.get(id)?;
        while let Some(parent) = cursor.parent {
            segments.push(cursor.name.as_str());
            cursor = self.get(parent)?;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    fn info(&self, id: NodeId) -> RepoResult<NodeInfo> {
        let node = self.get(id)?;
        let path = self.path_of(id)?;
        let depth = if node.parent.is_none() {
            0
        } else {
            path.matches('/').count()
        };
        Ok(NodeInfo {
            id,
            name: last_segment(&path).to_string(),
            path,
            depth,
            primary_type: node.primary_type.clone(),
            mixins: node.mixins.clone(),
        })
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let parent = self.nodes.get(&parent)?;
        parent
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).map_or(false, |n| n.name == name))
    }

    fn lookup(&self, path: &str) -> Option<NodeId> {
        if !path.starts_with('/') {
            return None;
        }
        let mut cursor = self.root;
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            cursor = self.child_named(cursor, seg)?;
        }
        Some(cursor)
    }

    fn require(&self, path: &str) -> RepoResult<NodeId> {
        self.lookup(path)
            .ok_or_else(|| RepoError::PathNotFound(path.to_string()))
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    /// First property outside `subtree` that references a node inside it.
    fn external_referrer(&self, subtree: &HashSet<NodeId>) -> Option<String> {
        for node in self.nodes.values() {
            if subtree.contains(&node.id) {
                continue;
            }
            for prop in node.properties.values() {
                if prop.kind != PropertyType::Reference {
                    continue;
                }
                let hit = prop
                    .values
                    .iter()
                    .filter_map(|v| v.parse::<NodeId>().ok())
                    .any(|target| subtree.contains(&target));
                if hit {
                    let owner = self.path_of(node.id).unwrap_or_default();
                    return Some(join_path(&owner, &prop.name));
                }
            }
        }
        None
    }

    fn split_destination(&self, dest_path: &str) -> RepoResult<(NodeId, String)> {
        let parent = parent_path(dest_path)
            .ok_or_else(|| RepoError::Constraint(format!("invalid destination `{dest_path}`")))?;
        let name = last_segment(dest_path).to_string();
        if !is_valid_name(&name) {
            return Err(RepoError::Constraint(format!("invalid node name `{name}`")));
        }
        let parent_id = self.require(&parent)?;
        if self.child_named(parent_id, &name).is_some() {
            return Err(RepoError::ItemExists(dest_path.to_string()));
        }
        Ok((parent_id, name))
    }

    /// Every node keyed by absolute path.
    fn by_path(&self) -> BTreeMap<String, &StoredNode> {
        self.subtree(self.root)
            .into_iter()
            .filter_map(|id| {
                let node = self.nodes.get(&id)?;
                let path = self.path_of(id).ok()?;
                Some((path, node))
            })
            .collect()
    }

    /// Events that turn `self` into `target`, compared by path.
    fn diff(&self, target: &Tree) -> Vec<ChangeEvent> {
        let before = self.by_path();
        let after = target.by_path();
        let mut events = Vec::new();

        for path in before.keys().filter(|p| !after.contains_key(*p)) {
            events.push(ChangeEvent::new(EventKind::NodeRemoved, path.clone()));
        }
        for (path, node) in &after {
            let Some(old) = before.get(path) else {
                events.push(ChangeEvent::new(EventKind::NodeAdded, path.clone()));
                continue;
            };
            for name in old.properties.keys() {
                if !node.properties.contains_key(name) {
                    events.push(ChangeEvent::new(
                        EventKind::PropertyRemoved,
                        join_path(path, name),
                    ));
                }
            }
            for (name, prop) in &node.properties {
                let kind = match old.properties.get(name) {
                    None => EventKind::PropertyAdded,
                    Some(previous) if previous != prop => EventKind::PropertyChanged,
                    Some(_) => continue,
                };
                events.push(ChangeEvent::new(kind, join_path(path, name)));
            }
            if old.mixins != node.mixins {
                events.push(MemorySession::mixin_event(
                    old.mixins.len(),
                    node.mixins.len(),
                    path,
                ));
            }
        }
        events
    }

    fn deep_copy(&mut self, src: NodeId, parent: NodeId, name: String) -> RepoResult<NodeId> {
        let source = self.get(src)?.clone();
        let id = NodeId::new();
        self.nodes.insert(
            id,
            StoredNode {
                id,
                name,
                parent: Some(parent),
                primary_type: source.primary_type,
                mixins: source.mixins,
                properties: source.properties,
                children: Vec::new(),
            },
        );
        self.get_mut(parent)?.children.push(id);
        for child in source.children {
            let child_name = self.get(child)?.name.clone();
            self.deep_copy(child, id, child_name)?;
        }
        Ok(id)
    }

    fn to_snapshot(&self, id: NodeId) -> RepoResult<SnapshotNode> {
        let node = self.get(id)?;
        let children = node
            .children
            .iter()
            .map(|c| self.to_snapshot(*c))
            .collect::<RepoResult<Vec<_>>>()?;
        Ok(SnapshotNode {
            id: node.id,
            name: node.name.clone(),
            primary_type: node.primary_type.clone(),
            mixins: node.mixins.clone(),
            properties: node.properties.values().cloned().collect(),
            children,
        })
    }

    fn from_snapshot(snapshot: SnapshotNode) -> Self {
        let mut tree = Tree {
            root: snapshot.id,
            nodes: HashMap::new(),
        };
        tree.load_node(snapshot, None);
        tree
    }

    fn load_node(&mut self, snapshot: SnapshotNode, parent: Option<NodeId>) {
        let id = snapshot.id;
        let children: Vec<NodeId> = snapshot.children.iter().map(|c| c.id).collect();
        self.nodes.insert(
            id,
            StoredNode {
                id,
                name: snapshot.name,
                parent,
                primary_type: snapshot.primary_type,
                mixins: snapshot.mixins,
                properties: snapshot
                    .properties
                    .into_iter()
                    .map(|p| (p.name.clone(), p))
                    .collect(),
                children,
            },
        );
        for child in snapshot.children {
            self.load_node(child, Some(id));
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotNode {
    id: NodeId,
    name: String,
    primary_type: String,
    #[serde(default)]
    mixins: Vec<String>,
    #[serde(default)]
    properties: Vec<Property>,
    #[serde(default)]
    children: Vec<SnapshotNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format: String,
    root: SnapshotNode,
}

// ============================================================================
// Repository
// ============================================================================

struct Inner {
    name: String,
    tree: RwLock<Tree>,
    saved: Mutex<Tree>,
    users: RwLock<HashMap<String, String>>,
    store: Option<PathBuf>,
    dispatcher: Dispatcher,
}

/// Shared in-memory repository. Cloning yields another handle to the same tree.
#[derive(Clone)]
pub struct MemoryRepository {
    inner: Arc<Inner>,
}

impl MemoryRepository {
    /// An empty repository with the default `admin`/`admin` account.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tree(name.into(), Tree::new(), None)
    }

    /// Load the snapshot at `path`, or start empty if the file does not exist.
    /// `save` writes back to the same file.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tree = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&text)?;
            if snapshot.format != SNAPSHOT_FORMAT {
                return Err(RepoError::InvalidLocation(format!(
                    "{}: unsupported snapshot format `{}`",
                    path.display(),
                    snapshot.format
                )));
            }
            Tree::from_snapshot(snapshot.root)
        } else {
            Tree::new()
        };
        tracing::info!(path = %path.display(), nodes = tree.nodes.len(), "opened repository snapshot");
        Ok(Self::with_tree(path.display().to_string(), tree, Some(path)))
    }

    fn with_tree(name: String, tree: Tree, store: Option<PathBuf>) -> Self {
        let mut users = HashMap::new();
        users.insert("admin".to_string(), "admin".to_string());
        Self {
            inner: Arc::new(Inner {
                name,
                saved: Mutex::new(tree.clone()),
                tree: RwLock::new(tree),
                users: RwLock::new(users),
                store,
                dispatcher: Dispatcher::new(),
            }),
        }
    }

    pub fn add_user(&self, username: impl Into<String>, password: impl Into<String>) {
        self.inner
            .users
            .write()
            .insert(username.into(), password.into());
    }

    /// Block until every change batch published so far reached its listeners.
    pub fn wait_for_notifications(&self) {
        self.inner.dispatcher.flush();
    }

    pub fn listener_count(&self) -> usize {
        self.inner.dispatcher.listener_count()
    }
}

impl Repository for MemoryRepository {
    fn login(
        &self,
        credentials: &Credentials,
        workspace: Option<&str>,
    ) -> RepoResult<Arc<dyn Session>> {
        let workspace = workspace.unwrap_or(DEFAULT_WORKSPACE);
        if workspace != DEFAULT_WORKSPACE {
            return Err(RepoError::Login(format!("no such workspace `{workspace}`")));
        }
        let accepted = self
            .inner
            .users
            .read()
            .get(&credentials.username)
            .map_or(false, |p| *p == credentials.password);
        if !accepted {
            return Err(RepoError::Login(format!(
                "invalid credentials for `{}`",
                credentials.username
            )));
        }
        tracing::debug!(repository = %self.inner.name, user = %credentials.username, "session opened");
        Ok(Arc::new(MemorySession {
            repo: Arc::clone(&self.inner),
            user: credentials.username.clone(),
            workspace: workspace.to_string(),
            live: AtomicBool::new(true),
            subscriptions: Mutex::new(Vec::new()),
        }))
    }

    fn describe(&self) -> String {
        match &self.inner.store {
            Some(path) => format!("file:{}", path.display()),
            None => format!("memory:{}", self.inner.name),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

struct MemorySession {
    repo: Arc<Inner>,
    user: String,
    workspace: String,
    live: AtomicBool,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl MemorySession {
    fn ensure_live(&self) -> RepoResult<()> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RepoError::SessionClosed)
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Tree) -> RepoResult<T>) -> RepoResult<T> {
        self.ensure_live()?;
        let tree = self.repo.tree.read();
        f(&tree)
    }

    /// Apply `f` under the write lock, then publish its events.
    ///
    /// `f` must validate before it touches the tree so a failure leaves the
    /// tree unchanged.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Tree) -> RepoResult<(T, Vec<ChangeEvent>)>,
    ) -> RepoResult<T> {
        self.ensure_live()?;
        let (value, events) = {
            let mut tree = self.repo.tree.write();
            f(&mut tree)?
        };
        self.repo.dispatcher.publish(events);
        Ok(value)
    }

    fn mixin_event(before: usize, after: usize, owner: &str) -> ChangeEvent {
        let path = join_path(owner, MIXIN_TYPES_PROPERTY);
        let kind = match (before, after) {
            (0, _) => EventKind::PropertyAdded,
            (_, 0) => EventKind::PropertyRemoved,
            _ => EventKind::PropertyChanged,
        };
        ChangeEvent::new(kind, path)
    }
}

fn synthetic_properties(node: &StoredNode) -> Vec<Property> {
    let mut out = vec![Property::single(
        PRIMARY_TYPE_PROPERTY,
        PropertyType::Name,
        node.primary_type.clone(),
    )];
    if !node.mixins.is_empty() {
        out.push(Property::multi(
            MIXIN_TYPES_PROPERTY,
            PropertyType::Name,
            node.mixins.clone(),
        ));
    }
    out
}

fn is_protected(name: &str) -> bool {
    name == PRIMARY_TYPE_PROPERTY || name == MIXIN_TYPES_PROPERTY
}

impl Session for MemorySession {
    fn user(&self) -> &str {
        &self.user
    }

    fn workspace(&self) -> &str {
        &self.workspace
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn root(&self) -> RepoResult<NodeInfo> {
        self.read(|tree| tree.info(tree.root))
    }

    fn node_by_id(&self, id: NodeId) -> RepoResult<NodeInfo> {
        self.read(|tree| tree.info(id))
    }

    fn node_by_path(&self, path: &str) -> RepoResult<NodeInfo> {
        self.read(|tree| tree.info(tree.require(path)?))
    }

    fn children(&self, id: NodeId) -> RepoResult<Vec<NodeInfo>> {
        self.read(|tree| {
            tree.get(id)?
                .children
                .iter()
                .map(|c| tree.info(*c))
                .collect()
        })
    }

    fn properties(&self, id: NodeId) -> RepoResult<Vec<Property>> {
        self.read(|tree| {
            let node = tree.get(id)?;
            let mut props = synthetic_properties(node);
            props.extend(node.properties.values().cloned());
            props.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(props)
        })
    }

    fn property(&self, id: NodeId, name: &str) -> RepoResult<Option<Property>> {
        self.read(|tree| {
            let node = tree.get(id)?;
            if is_protected(name) {
                return Ok(synthetic_properties(node)
                    .into_iter()
                    .find(|p| p.name == name));
            }
            Ok(node.properties.get(name).cloned())
        })
    }

    fn add_node(&self, parent: NodeId, name: &str, primary_type: &str) -> RepoResult<NodeInfo> {
        self.mutate(|tree| {
            if !is_valid_name(name) {
                return Err(RepoError::Constraint(format!("invalid node name `{name}`")));
            }
            if !PRIMARY_TYPES.contains(&primary_type) {
                return Err(RepoError::NoSuchNodeType(primary_type.to_string()));
            }
            let parent_path = tree.path_of(parent)?;
            let path = join_path(&parent_path, name);
            if tree.child_named(parent, name).is_some() {
                return Err(RepoError::ItemExists(path));
            }
            let id = NodeId::new();
            tree.nodes.insert(
                id,
                StoredNode {
                    id,
                    name: name.to_string(),
                    parent: Some(parent),
                    primary_type: primary_type.to_string(),
                    mixins: Vec::new(),
                    properties: BTreeMap::new(),
                    children: Vec::new(),
                },
            );
            tree.get_mut(parent)?.children.push(id);
            let events = vec![
                ChangeEvent::new(EventKind::NodeAdded, path.clone()),
                ChangeEvent::new(EventKind::PropertyAdded, join_path(&path, PRIMARY_TYPE_PROPERTY)),
            ];
            Ok((tree.info(id)?, events))
        })
    }

    fn remove_node(&self, id: NodeId) -> RepoResult<()> {
        self.mutate(|tree| {
            let node = tree.get(id)?;
            let parent = node
                .parent
                .ok_or_else(|| RepoError::Constraint("cannot remove the root node".to_string()))?;
            let path = tree.path_of(id)?;
            let doomed: HashSet<NodeId> = tree.subtree(id).into_iter().collect();
            if let Some(referrer) = tree.external_referrer(&doomed) {
                return Err(RepoError::Constraint(format!(
                    "{path} is still referenced by {referrer}"
                )));
            }
            tree.get_mut(parent)?.children.retain(|c| *c != id);
            for gone in &doomed {
                tree.nodes.remove(gone);
            }
            Ok(((), vec![ChangeEvent::new(EventKind::NodeRemoved, path)]))
        })
    }

    fn move_node(&self, src_path: &str, dest_path: &str) -> RepoResult<()> {
        self.mutate(|tree| {
            let src = tree.require(src_path)?;
            let old_parent = tree
                .get(src)?
                .parent
                .ok_or_else(|| RepoError::Constraint("cannot move the root node".to_string()))?;
            let (new_parent, name) = tree.split_destination(dest_path)?;
            if tree.subtree(src).contains(&new_parent) {
                return Err(RepoError::Constraint(format!(
                    "cannot move {src_path} beneath itself"
                )));
            }
            let real_src = tree.path_of(src)?;
            tree.get_mut(old_parent)?.children.retain(|c| *c != src);
            tree.get_mut(new_parent)?.children.push(src);
            let node = tree.get_mut(src)?;
            node.parent = Some(new_parent);
            node.name = name;
            let real_dest = tree.path_of(src)?;
            let events = vec![
                ChangeEvent::new(EventKind::NodeRemoved, real_src),
                ChangeEvent::new(EventKind::NodeAdded, real_dest),
            ];
            Ok(((), events))
        })
    }

    fn copy_node(&self, src_path: &str, dest_path: &str) -> RepoResult<NodeInfo> {
        self.mutate(|tree| {
            let src = tree.require(src_path)?;
            if tree.get(src)?.parent.is_none() {
                return Err(RepoError::Constraint("cannot copy the root node".to_string()));
            }
            let (parent, name) = tree.split_destination(dest_path)?;
            if tree.subtree(src).contains(&parent) {
                return Err(RepoError::Constraint(format!(
                    "cannot copy {src_path} beneath itself"
                )));
            }
            let id = tree.deep_copy(src, parent, name)?;
            let info = tree.info(id)?;
            let events = vec![ChangeEvent::new(EventKind::NodeAdded, info.path.clone())];
            Ok((info, events))
        })
    }

    fn add_mixin(&self, id: NodeId, mixin: &str) -> RepoResult<()> {
        self.mutate(|tree| {
            if !MIXIN_TYPES.contains(&mixin) {
                return Err(RepoError::NoSuchNodeType(mixin.to_string()));
            }
            let path = tree.path_of(id)?;
            let node = tree.get_mut(id)?;
            if node.mixins.iter().any(|m| m == mixin) {
                return Ok(((), Vec::new()));
            }
            let before = node.mixins.len();
            node.mixins.push(mixin.to_string());
            let event = Self::mixin_event(before, node.mixins.len(), &path);
            Ok(((), vec![event]))
        })
    }

    fn remove_mixin(&self, id: NodeId, mixin: &str) -> RepoResult<()> {
        self.mutate(|tree| {
            let path = tree.path_of(id)?;
            let node = tree.get_mut(id)?;
            let before = node.mixins.len();
            if !node.mixins.iter().any(|m| m == mixin) {
                return Err(RepoError::NoSuchNodeType(format!(
                    "{mixin} is not assigned to {path}"
                )));
            }
            node.mixins.retain(|m| m != mixin);
            let event = Self::mixin_event(before, node.mixins.len(), &path);
            Ok(((), vec![event]))
        })
    }

    fn set_property(&self, id: NodeId, property: Property) -> RepoResult<()> {
        self.mutate(|tree| {
            if !is_valid_name(&property.name) {
                return Err(RepoError::Constraint(format!(
                    "invalid property name `{}`",
                    property.name
                )));
            }
            if is_protected(&property.name) {
                return Err(RepoError::Constraint(format!(
                    "{} is protected",
                    property.name
                )));
            }
            if !property.multiple && property.values.len() != 1 {
                return Err(RepoError::ValueFormat(format!(
                    "single-valued property `{}` needs exactly one value",
                    property.name
                )));
            }
            let mut values = Vec::with_capacity(property.values.len());
            for raw in &property.values {
                let value = property.kind.canonicalize(raw)?;
                if property.kind == PropertyType::Reference {
                    let target = value.parse::<NodeId>()?;
                    if !tree.nodes.contains_key(&target) {
                        return Err(RepoError::ItemNotFound(format!(
                            "reference target {target}"
                        )));
                    }
                }
                values.push(value);
            }
            let path = tree.path_of(id)?;
            let node = tree.get_mut(id)?;
            let kind = if node.properties.contains_key(&property.name) {
                EventKind::PropertyChanged
            } else {
                EventKind::PropertyAdded
            };
            let event = ChangeEvent::new(kind, join_path(&path, &property.name));
            node.properties
                .insert(property.name.clone(), Property { values, ..property });
            Ok(((), vec![event]))
        })
    }

    fn remove_property(&self, id: NodeId, name: &str) -> RepoResult<()> {
        self.mutate(|tree| {
            if is_protected(name) {
                return Err(RepoError::Constraint(format!("{name} is protected")));
            }
            let path = tree.path_of(id)?;
            let node = tree.get_mut(id)?;
            if node.properties.remove(name).is_none() {
                return Err(RepoError::PathNotFound(join_path(&path, name)));
            }
            let event = ChangeEvent::new(EventKind::PropertyRemoved, join_path(&path, name));
            Ok(((), vec![event]))
        })
    }

    fn save(&self) -> RepoResult<()> {
        self.ensure_live()?;
        let tree = self.repo.tree.read().clone();
        if let Some(path) = &self.repo.store {
            let snapshot = Snapshot {
                format: SNAPSHOT_FORMAT.to_string(),
                root: tree.to_snapshot(tree.root)?,
            };
            let json = serde_json::to_string_pretty(&snapshot)?;
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, json)?;
            fs::rename(&tmp, path)?;
            tracing::info!(path = %path.display(), "repository snapshot saved");
        }
        *self.repo.saved.lock() = tree;
        Ok(())
    }

    fn refresh(&self, keep_changes: bool) -> RepoResult<()> {
        self.ensure_live()?;
        if keep_changes {
            return Ok(());
        }
        let saved = self.repo.saved.lock().clone();
        let events = {
            let mut tree = self.repo.tree.write();
            let events = tree.diff(&saved);
            *tree = saved;
            events
        };
        tracing::info!(changes = events.len(), "discarded unsaved changes");
        self.repo.dispatcher.publish(events);
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> RepoResult<SubscriptionId> {
        self.ensure_live()?;
        let id = self.repo.dispatcher.subscribe(listener);
        self.subscriptions.lock().push(id);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> RepoResult<()> {
        self.subscriptions.lock().retain(|s| *s != id);
        if self.repo.dispatcher.unsubscribe(id) {
            Ok(())
        } else {
            Err(RepoError::ItemNotFound(format!("subscription {id:?}")))
        }
    }

    fn logout(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            return;
        }
        for id in self.subscriptions.lock().drain(..) {
            self.repo.dispatcher.unsubscribe(id);
        }
        tracing::debug!(user = %self.user, "session closed");
    }
}
