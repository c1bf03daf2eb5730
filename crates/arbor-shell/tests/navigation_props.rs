//! Property tests for path resolution and completion over generated trees.

use std::sync::Arc;

use arbor_repo::{Credentials, LocationConnector, MemoryRepository, Repository, Session};
use arbor_shell::{Completion, NameCompleter, Shell, ShellConfig};
use proptest::prelude::*;

const NAMES: &[&str] = &["a", "ab", "abc", "b", "ba", "c", "alpha", "beta"];

fn shell_with_children(children: &[String]) -> Shell {
    let repo = MemoryRepository::new("props");
    let session = repo
        .login(&Credentials::new("admin", "admin"), None)
        .unwrap();
    let root = session.root().unwrap();
    for name in children {
        let child = session.add_node(root.id, name, "nt:unstructured").unwrap();
        session.add_node(child.id, "leaf", "nt:unstructured").unwrap();
    }
    repo.wait_for_notifications();

    let connector = LocationConnector::new().with_repository("mem:props", repo);
    let config = ShellConfig {
        server: "mem:props".to_string(),
        show_timing: false,
        ..ShellConfig::default()
    };
    let shell = Shell::new(config, Arc::new(connector)).unwrap();
    assert!(shell.navigator().lock().connect());
    shell
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(".".to_string()),
        Just("..".to_string()),
        Just("leaf".to_string()),
        Just("".to_string()),
        proptest::sample::select(NAMES).prop_map(str::to_string),
    ]
}

fn path() -> impl Strategy<Value = String> {
    (any::<bool>(), prop::collection::vec(segment(), 0..5)).prop_map(|(absolute, segments)| {
        let joined = segments.join("/");
        if absolute {
            format!("/{joined}")
        } else {
            joined
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn resolution_is_deterministic_and_side_effect_free(
        children in proptest::sample::subsequence(NAMES, 0..NAMES.len()),
        start in proptest::sample::select(NAMES),
        target in path(),
    ) {
        let children: Vec<String> = children.into_iter().map(str::to_string).collect();
        let shell = shell_with_children(&children);
        let mut nav = shell.navigator().lock();
        let _ = nav.cd(&format!("/{start}"));

        let state = nav.state();
        let first = nav.resolve_path(&target).ok();
        let second = nav.resolve_path(&target).ok();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(nav.state(), state);

        let current = nav.resolve_path(".").unwrap();
        if let Some(node) = first {
            prop_assert_eq!(node.id == current.id, node.path == current.path);
        }
    }

    #[test]
    fn completion_returns_sorted_prefix_matches(
        children in proptest::sample::subsequence(NAMES, 1..NAMES.len()),
        prefix in "[a-c]{0,2}",
    ) {
        let children: Vec<String> = children.into_iter().map(str::to_string).collect();
        let shell = shell_with_children(&children);
        let nav = shell.navigator().lock();

        let mut expected: Vec<String> = children
            .iter()
            .filter(|name| name.starts_with(prefix.as_str()))
            .cloned()
            .collect();
        expected.sort();

        match NameCompleter::nodes().complete(&nav, &prefix, prefix.len()) {
            Completion::NoMatch => prop_assert!(expected.is_empty()),
            Completion::Candidates(candidates) if candidates.len() == 1 => {
                prop_assert_eq!(expected.len(), 1);
                prop_assert_eq!(candidates[0].clone(), format!("{}/", expected[0]));
            }
            Completion::Candidates(candidates) => prop_assert_eq!(candidates, expected),
        }
    }
}
