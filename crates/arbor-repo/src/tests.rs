//! Session behaviour of the in-memory backend.

use super::*;
use crate::memory::{MIXIN_TYPES_PROPERTY, PRIMARY_TYPE_PROPERTY};
use parking_lot::Mutex;
use tempfile::tempdir;

fn admin() -> Credentials {
    Credentials::new("admin", "admin")
}

fn session(repo: &MemoryRepository) -> Arc<dyn Session> {
    repo.login(&admin(), None).unwrap()
}

#[derive(Default)]
struct Collector {
    events: Mutex<Vec<ChangeEvent>>,
}

impl ChangeListener for Collector {
    fn on_changes(&self, events: &[ChangeEvent]) {
        self.events.lock().extend_from_slice(events);
    }
}

#[test]
fn login_rejects_bad_password_and_unknown_workspace() {
    let repo = MemoryRepository::new("t");
    assert!(matches!(
        repo.login(&Credentials::new("admin", "nope"), None),
        Err(RepoError::Login(_))
    ));
    assert!(matches!(
        repo.login(&admin(), Some("staging")),
        Err(RepoError::Login(_))
    ));
    repo.add_user("editor", "secret");
    assert!(repo
        .login(&Credentials::new("editor", "secret"), None)
        .is_ok());
}

#[test]
fn add_and_lookup_nodes() {
    let repo = MemoryRepository::new("t");
    let s = session(&repo);
    let root = s.root().unwrap();
    assert_eq!(root.path, "/");
    assert_eq!(root.name, "/");
    assert!(root.is_root());

    let a = s.add_node(root.id, "a", "nt:unstructured").unwrap();
    let b = s.add_node(a.id, "b", "nt:folder").unwrap();
    assert_eq!(b.path, "/a/b");
    assert_eq!(b.depth, 2);
    assert_eq!(s.node_by_path("/a/b").unwrap().id, b.id);
    assert!(matches!(
        s.node_by_path("/a/missing"),
        Err(RepoError::PathNotFound(_))
    ));
    assert!(matches!(
        s.add_node(root.id, "a", "nt:unstructured"),
        Err(RepoError::ItemExists(_))
    ));
    assert!(matches!(
        s.add_node(root.id, "c", "nt:bogus"),
        Err(RepoError::NoSuchNodeType(_))
    ));
}

#[test]
fn properties_include_synthetic_type_information() {
    let repo = MemoryRepository::new("t");
    let s = session(&repo);
    let root = s.root().unwrap();
    let a = s.add_node(root.id, "a", "nt:unstructured").unwrap();
    s.add_mixin(a.id, "mix:title").unwrap();
    s.set_property(a.id, Property::single("title", PropertyType::String, "Hello"))
        .unwrap();

    let names: Vec<String> = s
        .properties(a.id)
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec![MIXIN_TYPES_PROPERTY, PRIMARY_TYPE_PROPERTY, "title"]);

    assert!(matches!(
        s.set_property(a.id, Property::single(PRIMARY_TYPE_PROPERTY, PropertyType::Name, "x")),
        Err(RepoError::Constraint(_))
    ));
}

#[test]
fn reference_values_must_point_at_existing_nodes() {
    let repo = MemoryRepository::new("t");
    let s = session(&repo);
    let root = s.root().unwrap();
    let a = s.add_node(root.id, "a", "nt:unstructured").unwrap();
    let target = s.add_node(root.id, "target", "nt:unstructured").unwrap();

    s.set_property(
        a.id,
        Property::single("link", PropertyType::Reference, target.id.to_string()),
    )
    .unwrap();
    let dangling = NodeId::new().to_string();
    assert!(matches!(
        s.set_property(a.id, Property::single("bad", PropertyType::Reference, dangling)),
        Err(RepoError::ItemNotFound(_))
    ));

    // Referenced nodes cannot be removed out from under their referrers.
    assert!(matches!(
        s.remove_node(target.id),
        Err(RepoError::Constraint(_))
    ));
    s.remove_property(a.id, "link").unwrap();
    s.remove_node(target.id).unwrap();
}

#[test]
fn move_and_copy_keep_identity_rules() {
    let repo = MemoryRepository::new("t");
    let s = session(&repo);
    let root = s.root().unwrap();
    let a = s.add_node(root.id, "a", "nt:unstructured").unwrap();
    let b = s.add_node(a.id, "b", "nt:unstructured").unwrap();
    s.add_node(root.id, "dest", "nt:folder").unwrap();

    s.move_node("/a/b", "/dest/b2").unwrap();
    let moved = s.node_by_id(b.id).unwrap();
    assert_eq!(moved.path, "/dest/b2");

    assert!(matches!(
        s.move_node("/a", "/a/inner"),
        Err(RepoError::Constraint(_))
    ));

    let copy = s.copy_node("/dest", "/a/dest-copy").unwrap();
    assert_ne!(copy.id, s.node_by_path("/dest").unwrap().id);
    assert!(s.node_by_path("/a/dest-copy/b2").is_ok());
    assert_eq!(s.node_by_id(a.id).unwrap().path, "/a");
}

#[test]
fn failed_mutation_publishes_nothing() {
    let repo = MemoryRepository::new("t");
    let s = session(&repo);
    let collector = Arc::new(Collector::default());
    s.subscribe(collector.clone()).unwrap();
    let root = s.root().unwrap();

    assert!(s.add_node(root.id, "x", "nt:nope").is_err());
    repo.wait_for_notifications();
    assert!(collector.events.lock().is_empty());

    s.add_node(root.id, "x", "nt:unstructured").unwrap();
    repo.wait_for_notifications();
    let events = collector.events.lock();
    assert_eq!(events[0], ChangeEvent::new(EventKind::NodeAdded, "/x"));
}

#[test]
fn other_sessions_observe_changes() {
    let repo = MemoryRepository::new("t");
    let watcher = session(&repo);
    let writer = session(&repo);
    let collector = Arc::new(Collector::default());
    watcher.subscribe(collector.clone()).unwrap();

    let root = writer.root().unwrap();
    let n = writer.add_node(root.id, "n", "nt:unstructured").unwrap();
    writer
        .set_property(n.id, Property::single("p", PropertyType::Long, "7"))
        .unwrap();
    writer
        .set_property(n.id, Property::single("p", PropertyType::Long, "8"))
        .unwrap();
    writer.remove_property(n.id, "p").unwrap();
    repo.wait_for_notifications();

    let kinds: Vec<EventKind> = collector.events.lock().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::NodeAdded,
            EventKind::PropertyAdded,
            EventKind::PropertyAdded,
            EventKind::PropertyChanged,
            EventKind::PropertyRemoved,
        ]
    );
}

#[test]
fn logout_is_idempotent_and_drops_subscriptions() {
    let repo = MemoryRepository::new("t");
    let s = session(&repo);
    s.subscribe(Arc::new(Collector::default())).unwrap();
    assert_eq!(repo.listener_count(), 1);

    s.logout();
    s.logout();
    assert!(!s.is_live());
    assert_eq!(repo.listener_count(), 0);
    assert!(matches!(s.root(), Err(RepoError::SessionClosed)));
}

#[test]
fn snapshot_round_trip_and_refresh() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("content.json");

    let repo = MemoryRepository::open(&file).unwrap();
    let s = session(&repo);
    let root = s.root().unwrap();
    let docs = s.add_node(root.id, "docs", "nt:folder").unwrap();
    s.set_property(docs.id, Property::single("count", PropertyType::Long, "3"))
        .unwrap();
    s.save().unwrap();

    s.add_node(root.id, "scratch", "nt:unstructured").unwrap();
    s.refresh(false).unwrap();
    assert!(s.node_by_path("/scratch").is_err());

    let reopened = MemoryRepository::open(&file).unwrap();
    let s2 = session(&reopened);
    let docs2 = s2.node_by_path("/docs").unwrap();
    assert_eq!(docs2.id, docs.id);
    let count = s2.property(docs2.id, "count").unwrap().unwrap();
    assert_eq!(count.values, vec!["3"]);
}

#[test]
fn discarding_changes_publishes_the_reverting_events() {
    let repo = MemoryRepository::new("t");
    let s = session(&repo);
    let root = s.root().unwrap();
    let docs = s.add_node(root.id, "docs", "nt:folder").unwrap();
    s.set_property(docs.id, Property::single("count", PropertyType::Long, "3"))
        .unwrap();
    s.save().unwrap();

    s.add_node(root.id, "scratch", "nt:unstructured").unwrap();
    s.set_property(docs.id, Property::single("count", PropertyType::Long, "4"))
        .unwrap();
    s.set_property(docs.id, Property::single("title", PropertyType::String, "Docs"))
        .unwrap();
    s.add_mixin(docs.id, "mix:title").unwrap();
    repo.wait_for_notifications();

    let watcher = session(&repo);
    let collector = Arc::new(Collector::default());
    watcher.subscribe(collector.clone()).unwrap();

    s.refresh(true).unwrap();
    repo.wait_for_notifications();
    assert!(collector.events.lock().is_empty());

    s.refresh(false).unwrap();
    repo.wait_for_notifications();
    assert_eq!(
        *collector.events.lock(),
        vec![
            ChangeEvent::new(EventKind::NodeRemoved, "/scratch"),
            ChangeEvent::new(EventKind::PropertyRemoved, "/docs/title"),
            ChangeEvent::new(EventKind::PropertyChanged, "/docs/count"),
            ChangeEvent::new(EventKind::PropertyRemoved, format!("/docs/{MIXIN_TYPES_PROPERTY}")),
        ]
    );
}

#[test]
fn connector_resolves_locations() {
    let connector = LocationConnector::new();
    let first = connector.open("mem:shared").unwrap();
    let s = first.login(&admin(), None).unwrap();
    let root = s.root().unwrap();
    s.add_node(root.id, "kept", "nt:unstructured").unwrap();

    let again = connector.open("mem:shared").unwrap();
    let s2 = again.login(&admin(), None).unwrap();
    assert!(s2.node_by_path("/kept").is_ok());

    assert!(matches!(
        connector.open("rmi://localhost:1099/server"),
        Err(RepoError::InvalidLocation(_))
    ));
    assert!(matches!(connector.open("mem:"), Err(RepoError::InvalidLocation(_))));
}
