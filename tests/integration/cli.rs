#[path = "common/mod.rs"]
mod common;

use std::{fs, path::Path};

use assert_cmd::Command;
use common::{install_launcher, is_process_alive, read_pid, wait_for_process_exit};
use predicates::boolean::PredicateBooleanExt;
use predicates::str::contains;
use red5wrapper::{
    pid::PidStore,
    test_utils::{env_lock, free_port},
};
use tempfile::tempdir;

fn red5w(app_root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("red5w"));
    cmd.current_dir(app_root)
        .env_remove("APP_ROOT")
        .env_remove("environment")
        .env("RUST_LOG", "warn")
        .arg("--log-level")
        .arg("warn");
    cmd
}

fn with_target<'a>(cmd: &'a mut Command, app_root: &Path, home: &Path, port: u16) -> &'a mut Command {
    cmd.arg("--app-root")
        .arg(app_root)
        .arg("--home")
        .arg(home)
        .arg("--port")
        .arg(port.to_string())
        .arg("--startup-wait")
        .arg("0")
}

#[test]
fn stop_and_status_are_safe_when_nothing_was_started() {
    let app = tempdir().expect("app root");
    let home = app.path().join("red5");
    let port = free_port();

    let mut stop = red5w(app.path());
    with_target(stop.arg("stop"), app.path(), &home, port)
        .assert()
        .success();

    let mut status = red5w(app.path());
    with_target(status.arg("status"), app.path(), &home, port)
        .assert()
        .success()
        .stdout(contains("red5 not running"));

    let mut pid = red5w(app.path());
    with_target(pid.arg("pid"), app.path(), &home, port)
        .assert()
        .failure();

    assert!(!PidStore::new(app.path(), &home).exists());
}

#[test]
fn start_status_stop_round_trip() {
    let _guard = env_lock();
    let app = tempdir().expect("app root");
    let home = app.path().join("red5");
    fs::create_dir_all(&home).expect("install dir");
    install_launcher(&home, "exec sleep 30");
    let port = free_port();

    let mut start = red5w(app.path());
    let output = with_target(start.arg("start"), app.path(), &home, port)
        .output()
        .expect("run start");
    assert!(output.status.success(), "start failed: {output:?}");
    let printed: u32 = String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .expect("start prints the pid");

    let store = PidStore::new(app.path(), &home);
    assert_eq!(read_pid(store.path()), printed);
    assert!(is_process_alive(printed));
    assert!(app.path().join("red5wrapper.log").exists());

    let mut pid = red5w(app.path());
    with_target(pid.arg("pid"), app.path(), &home, port)
        .assert()
        .success()
        .stdout(contains(printed.to_string()));

    let mut status = red5w(app.path());
    with_target(status.arg("status"), app.path(), &home, port)
        .assert()
        .success()
        .stdout(contains(format!("red5 running (pid {printed}")));

    let mut again = red5w(app.path());
    with_target(again.arg("start"), app.path(), &home, port)
        .assert()
        .failure()
        .stderr(contains("AlreadyRunning"));

    let mut stop = red5w(app.path());
    with_target(stop.arg("stop"), app.path(), &home, port)
        .assert()
        .success();

    wait_for_process_exit(printed);
    assert!(!store.path().exists());
}

#[test]
fn wrap_runs_the_command_and_cleans_up() {
    let _guard = env_lock();
    let app = tempdir().expect("app root");
    let home = app.path().join("red5");
    fs::create_dir_all(&home).expect("install dir");
    install_launcher(&home, "exec sleep 30");
    let port = free_port();

    let mut wrap = red5w(app.path());
    with_target(wrap.arg("wrap"), app.path(), &home, port)
        .arg("--")
        .arg("sh")
        .arg("-c")
        .arg("echo task saw $RED5_HOME; exit 3")
        .assert()
        .code(3)
        .stdout(contains("task saw"));

    assert!(!PidStore::new(app.path(), &home).exists());
}

#[test]
fn logs_prints_the_tail_of_the_log_file() {
    let app = tempdir().expect("app root");
    fs::write(app.path().join("red5wrapper.log"), "first\nsecond\nthird\n").expect("log");

    red5w(app.path())
        .arg("logs")
        .arg("--lines")
        .arg("2")
        .assert()
        .success()
        .stdout(contains("second\nthird").and(contains("first").not()));
}

#[test]
fn config_file_sections_are_honoured() {
    let app = tempdir().expect("app root");
    let port = free_port();
    fs::create_dir_all(app.path().join("config")).expect("config dir");
    fs::write(
        app.path().join("config/red5.yml"),
        format!(
            "default:\n  red5_home: /nowhere/default\nci:\n  red5_home: /nowhere/ci\n  red5_port: {port}\n"
        ),
    )
    .expect("config");

    red5w(app.path())
        .arg("status")
        .arg("--app-root")
        .arg(app.path())
        .arg("--environment")
        .arg("ci")
        .assert()
        .success()
        .stdout(contains("red5 not running"));

    // Writing a pid for the `ci` installation makes `pid` report it.
    PidStore::new(app.path(), Path::new("/nowhere/ci"))
        .write(999_999_999)
        .expect("write pid");
    red5w(app.path())
        .arg("pid")
        .arg("--app-root")
        .arg(app.path())
        .arg("--environment")
        .arg("ci")
        .assert()
        .success()
        .stdout(contains("999999999"));
}
