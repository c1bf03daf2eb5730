//! Drives the shell end to end against a snapshot-backed repository.

use std::sync::Arc;

use arbor_repo::{Credentials, LocationConnector, MemoryRepository, Repository, Session};
use arbor_shell::{ScriptReader, Shell, ShellConfig};

fn shell_for(location: &str) -> Shell {
    let config = ShellConfig {
        server: location.to_string(),
        show_timing: false,
        ..ShellConfig::default()
    };
    Shell::new(config, Arc::new(LocationConnector::new())).unwrap()
}

#[test]
fn saved_changes_survive_a_new_process() {
    let dir = tempfile::tempdir().unwrap();
    let location = format!("file:{}", dir.path().join("repo.json").display());

    let shell = shell_for(&location);
    let mut out = Vec::new();
    shell
        .repl()
        .run_script(
            [
                "nodeadd content nt:folder",
                "cd content",
                "nodeadd page",
                "cd page",
                "propset title Home",
                "valueadd tags start",
                "save",
            ],
            false,
            false,
            &mut out,
        )
        .unwrap();
    shell.navigator().lock().logout();

    // A fresh connector re-reads the snapshot from disk.
    let shell = shell_for(&location);
    let mut out = Vec::new();
    shell
        .repl()
        .run(
            &mut ScriptReader::new(["cd /content/page", "propget title tags", "exit"]),
            &mut out,
        )
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Home\n"), "{out}");
    assert!(out.contains("start\n"), "{out}");
    assert!(out.ends_with("Bye bye!\n"), "{out}");

    let repo = MemoryRepository::open(dir.path().join("repo.json")).unwrap();
    let session = repo
        .login(&Credentials::new("admin", "admin"), None)
        .unwrap();
    assert!(session.node_by_path("/content/page").is_ok());
}

#[test]
fn echoed_script_shows_prompt_and_line() {
    let shell = shell_for("mem:echo");
    let mut out = Vec::new();
    shell
        .repl()
        .run_script(["# setup", "nodeadd x", "cd x"], false, true, &mut out)
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("arbor:> nodeadd x\n"), "{out}");
    assert!(out.contains("admin:/> cd x\n"), "{out}");
    assert!(!out.contains("# setup"));
}

#[test]
fn unreachable_server_is_reported_not_fatal() {
    let shell = shell_for("gopher://nowhere");
    let mut out = Vec::new();
    let repl = shell.repl();
    let outcome = repl.handle_line("ls", &mut out).unwrap();
    assert!(outcome.is_failure());
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("invalid repository location"), "{out}");

    let outcome = repl.handle_line("server mem:ok", &mut Vec::new()).unwrap();
    assert!(!outcome.is_failure());
    assert!(!repl.handle_line("ls", &mut Vec::new()).unwrap().is_failure());
}
