mod store_common;

use std::sync::Arc;

use assert_cmd::Command;
use feedstore::sql::{HelperRegistry, SqlService};
use store_common::{store_feed, store_user};

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf8 stdout")
}

#[test]
fn test_cli_exits_with_success_on_help() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_feedstore"));
    cmd.arg("--help");
    assert!(stdout_of(&mut cmd).contains("Usage: feedstore"));
}

#[test]
fn test_cli_status_command() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_feedstore"));
    cmd.env_remove("FEEDSTORE_BACKEND")
        .args(["--command", "status"]);
    assert!(stdout_of(&mut cmd).contains("backend=sql users=0 feeds=0 subscriptions=0"));
}

#[test]
fn test_cli_status_on_graph_backend() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_feedstore"));
    cmd.args(["--backend", "graph", "status"]);
    assert!(stdout_of(&mut cmd).contains("backend=graph"));
}

#[test]
fn test_cli_lists_users_and_feeds_from_db() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cli.db");
    let connect = path.to_str().expect("path").to_string();
    {
        let service = SqlService::open(Arc::new(HelperRegistry::with_builtin()), "sqlite3", &connect)
            .expect("open");
        store_user(&service, "bob");
        store_feed(&service, "https://news.example.com/rss");
    }

    let mut users = Command::new(env!("CARGO_BIN_EXE_feedstore"));
    users.args(["--db", &connect, "--command", "users"]);
    assert!(stdout_of(&mut users).contains("bob admin=false active=true"));

    let mut feeds = Command::new(env!("CARGO_BIN_EXE_feedstore"));
    feeds.env("FEEDSTORE_CONNECT", &connect).arg("feeds");
    assert!(stdout_of(&mut feeds).contains("1:https://news.example.com/rss"));
}

#[test]
fn test_cli_rejects_unknown_backend() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_feedstore"));
    cmd.args(["--backend", "neo4j"]);
    let output = cmd.assert().code(2).get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&output).contains("unknown backend"));
}

#[test]
fn test_cli_rejects_unregistered_driver() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_feedstore"));
    cmd.args(["--driver", "postgres", "status"]);
    cmd.assert().code(2);
}
