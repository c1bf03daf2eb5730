//! Runs the `arbor` binary in script mode against a snapshot file.

use std::path::Path;
use std::process::{Command, Output};

fn arbor(repo: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_arbor"))
        .arg("--server")
        .arg(format!("file:{}", repo.display()))
        .arg("--no-timing")
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("ARBOR_SERVER")
        .env_remove("ARBOR_USER")
        .env_remove("ARBOR_PASSWORD")
        .output()
        .expect("failed to run arbor")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn commands_persist_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo.json");

    let first = arbor(
        &repo,
        &["-c", "nodeadd projects", "-c", "cd projects", "-c", "nodeadd arbor", "-c", "save"],
    );
    assert!(first.status.success(), "{}", stdout(&first));
    let out = stdout(&first);
    assert!(out.contains("Node 'arbor' added."), "{out}");
    assert!(out.ends_with("Bye bye!\n"), "{out}");

    let second = arbor(&repo, &["-q", "-c", "cd /projects", "-c", "ls"]);
    assert!(second.status.success());
    let out = stdout(&second);
    assert!(out.contains("arbor"), "{out}");
    assert!(out.contains("Total: 1"), "{out}");
    assert!(!out.contains("Bye bye!"), "{out}");
}

#[test]
fn failing_line_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo.json");

    let output = arbor(&repo, &["-c", "cd /missing", "-c", "nodeadd never"]);
    assert!(!output.status.success());
    let out = stdout(&output);
    assert!(out.contains("error:"), "{out}");
    assert!(!out.contains("Node 'never' added."), "{out}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 1"));
}

#[test]
fn continue_on_error_runs_remaining_lines() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo.json");

    let output = arbor(
        &repo,
        &["--continue-on-error", "-c", "cd /missing", "-c", "nodeadd later"],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("Node 'later' added."));
}

#[test]
fn script_file_lines_run_before_commands() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo.json");
    let script = dir.path().join("setup.arbor");
    std::fs::write(
        &script,
        "# build a small tree\nnodeadd docs\ncd docs\n\npropset title Guide\n",
    )
    .unwrap();

    let output = arbor(
        &repo,
        &["--script", script.to_str().unwrap(), "-c", "propget title"],
    );
    assert!(output.status.success(), "{}", stdout(&output));
    let out = stdout(&output);
    assert!(out.contains("arbor:> nodeadd docs"), "{out}");
    assert!(out.contains("admin:/docs> propset title Guide"), "{out}");
    assert!(out.contains("Guide\n"), "{out}");
}

#[test]
fn unknown_command_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo.json");

    let output = arbor(&repo, &["-c", "frobnicate"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("Unknown command: frobnicate"));
}

#[cfg(unix)]
#[test]
fn interrupt_runs_the_shutdown_sequence() {
    use std::io::{BufRead, BufReader, Read};
    use std::process::Stdio;

    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo.json");
    let mut child = Command::new(env!("CARGO_BIN_EXE_arbor"))
        .arg("--server")
        .arg(format!("file:{}", repo.display()))
        .arg("--connect")
        .arg("--history-file")
        .arg(dir.path().join("history"))
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start arbor");

    // The handler is installed before the banner is printed.
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut line = String::new();
    while !line.contains("Type `help`") {
        line.clear();
        assert!(stdout.read_line(&mut line).unwrap() > 0, "banner never printed");
    }

    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();
    let exit = child.wait().unwrap();
    assert_eq!(exit.code(), Some(130));
    assert!(rest.contains("Bye bye!"), "{rest}");
}
