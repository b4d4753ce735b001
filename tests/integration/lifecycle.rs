//! Start/stop against real launcher processes.

#[path = "common/mod.rs"]
mod common;

use std::{fs, time::Duration};

use common::{
    install_launcher, is_process_alive, read_pid, wait_for_log_line, wait_for_process_exit,
};
use red5wrapper::{
    Readiness, Supervisor, TargetConfig, WrapperError,
    constants::LOG_FILE_NAME,
    test_utils::{env_lock, free_port},
};
use tempfile::tempdir;

fn sleeping_config(home: &std::path::Path, port: u16) -> TargetConfig {
    TargetConfig::new(home)
        .with_port(port)
        .with_startup_wait(Duration::ZERO)
        .with_poll_interval(Duration::from_millis(50))
}

#[test]
fn starts_records_and_stops_a_real_process() {
    let _guard = env_lock();
    let base = tempdir().expect("base dir");
    let install = tempdir().expect("install dir");
    let logs = tempdir().expect("log dir");
    install_launcher(install.path(), "echo \"red5 booting from $RED5_HOME\"\nexec sleep 30");

    let mut supervisor = Supervisor::new(base.path()).with_log_dir(logs.path());
    let config = sleeping_config(install.path(), free_port());
    supervisor.configure(config.clone()).expect("configure");
    supervisor.stop().expect("stop before start");

    assert_eq!(supervisor.start().expect("start"), Readiness::TimedOut);

    let store = supervisor.pid_store().expect("pid store").clone();
    let pid = supervisor.pid().expect("pid recorded");
    assert_eq!(read_pid(store.path()), pid);
    assert!(is_process_alive(pid));

    match supervisor.start() {
        Err(WrapperError::AlreadyRunning { pid: running }) => assert_eq!(running, pid),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }

    let log = wait_for_log_line(&logs.path().join(LOG_FILE_NAME), "red5 booting from");
    assert!(log.contains(&install.path().display().to_string()));

    supervisor.stop().expect("stop");
    wait_for_process_exit(pid);
    assert!(!store.path().exists());

    supervisor.stop().expect("second stop");
}

#[test]
fn another_supervisor_can_stop_the_instance() {
    let _guard = env_lock();
    let base = tempdir().expect("base dir");
    let install = tempdir().expect("install dir");
    let logs = tempdir().expect("log dir");
    install_launcher(install.path(), "exec sleep 30");
    let config = sleeping_config(install.path(), free_port());

    let mut starter = Supervisor::new(base.path()).with_log_dir(logs.path());
    starter.configure(config.clone()).expect("configure");
    starter.start().expect("start");
    let pid = starter.pid().expect("pid recorded");

    let mut stopper = Supervisor::new(base.path()).with_log_dir(logs.path());
    assert!(stopper.is_running(config.clone()).expect("status"));
    assert_eq!(stopper.pid_for(config.clone()).expect("pid"), Some(pid));

    stopper.configure(config.clone()).expect("configure").stop().expect("stop");
    wait_for_process_exit(pid);
    assert!(!stopper.is_running(config.clone()).expect("status"));
    assert_eq!(starter.pid(), None);

    // The dead pid no longer blocks a fresh start.
    starter.configure(config).expect("configure");
    starter.start().expect("restart");
    let fresh = starter.pid().expect("fresh pid");
    assert_ne!(fresh, pid);
    starter.stop().expect("stop");
    wait_for_process_exit(fresh);
}

#[test]
fn stale_pid_file_from_a_dead_process_is_replaced() {
    let _guard = env_lock();
    let base = tempdir().expect("base dir");
    let install = tempdir().expect("install dir");
    let logs = tempdir().expect("log dir");
    install_launcher(install.path(), "exec sleep 30");

    let mut dead = std::process::Command::new("true").spawn().expect("spawn true");
    let dead_pid = dead.id();
    dead.wait().expect("wait true");

    let mut supervisor = Supervisor::new(base.path()).with_log_dir(logs.path());
    supervisor
        .configure(sleeping_config(install.path(), free_port()))
        .expect("configure");
    supervisor.pid_store().expect("store").write(dead_pid).expect("write");

    supervisor.start().expect("start over stale pid");
    let pid = supervisor.pid().expect("pid recorded");
    assert_ne!(pid, dead_pid);
    assert!(is_process_alive(pid));

    supervisor.stop().expect("stop");
    wait_for_process_exit(pid);
}

#[test]
fn missing_launcher_leaves_no_pid_file() {
    let _guard = env_lock();
    let base = tempdir().expect("base dir");
    let install = tempdir().expect("install dir");

    let mut supervisor = Supervisor::new(base.path()).with_log_dir(base.path());
    supervisor
        .configure(sleeping_config(install.path(), free_port()))
        .expect("configure");

    let err = supervisor.start().expect_err("no red5.sh to run");
    assert!(matches!(err, WrapperError::ProcessStart { .. }));
    assert!(!supervisor.pid_store().expect("store").exists());
}

/// Needs python3 on PATH to serve the health page.
#[test]
#[ignore]
fn waits_until_the_health_page_answers() {
    let _guard = env_lock();
    let base = tempdir().expect("base dir");
    let install = tempdir().expect("install dir");
    let logs = tempdir().expect("log dir");
    let port = free_port();
    fs::write(install.path().join("login.html"), "<html>login</html>").expect("login page");
    install_launcher(
        install.path(),
        &format!("sleep 1\nexec python3 -m http.server {port} --bind 127.0.0.1"),
    );

    let mut supervisor = Supervisor::new(base.path()).with_log_dir(logs.path());
    supervisor
        .configure(
            TargetConfig::new(install.path())
                .with_port(port)
                .with_startup_wait(Duration::from_secs(20)),
        )
        .expect("configure");

    assert_eq!(supervisor.start().expect("start"), Readiness::Ready);
    let pid = supervisor.pid().expect("pid recorded");
    supervisor.stop().expect("stop");
    wait_for_process_exit(pid);
}
