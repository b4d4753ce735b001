//! Port, HTTP health, and process liveness probes.
//!
//! None of these return errors: every failure mode collapses to `false` so the
//! readiness loop can simply retry.
use std::{
    net::{Shutdown, SocketAddr, TcpStream},
    time::Duration,
};

use nix::{errno::Errno, sys::signal, unistd::Pid};
use reqwest::{StatusCode, blocking::Client};
use sysinfo::{ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::constants::{HEALTH_PATH, PROBE_TIMEOUT};

/// Returns true when something accepts TCP connections on `127.0.0.1:port`.
pub fn is_port_in_use(port: u16) -> bool {
    is_port_in_use_within(port, PROBE_TIMEOUT)
}

/// Same as [`is_port_in_use`] with an explicit connect timeout.
pub fn is_port_in_use_within(port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    match TcpStream::connect_timeout(&addr, timeout) {
        Ok(stream) => {
            let _ = stream.shutdown(Shutdown::Both);
            true
        }
        Err(err) => {
            debug!("Port {port} probe failed: {err}");
            false
        }
    }
}

/// Health check URL for the given port.
pub fn health_url(port: u16) -> String {
    format!("http://localhost:{port}/{HEALTH_PATH}")
}

/// Returns true only when the health endpoint answers with status 200.
pub fn is_responding(port: u16) -> bool {
    is_responding_within(port, PROBE_TIMEOUT)
}

/// Same as [`is_responding`] with an explicit request timeout.
pub fn is_responding_within(port: u16, timeout: Duration) -> bool {
    let client = match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(err) => {
            warn!("Unable to build health check client: {err}");
            return false;
        }
    };

    let url = health_url(port);
    match client.get(&url).send() {
        Ok(response) => {
            let status = response.status();
            debug!("Health check {url} answered {status}");
            status == StatusCode::OK
        }
        Err(err) => {
            debug!("Health check {url} failed: {err}");
            false
        }
    }
}

/// Readiness is an open port plus a healthy application layer.
pub fn is_ready(port: u16) -> bool {
    is_port_in_use(port) && is_responding(port)
}

/// Checks whether `pid` names a live OS process. Zombies count as exited.
pub fn is_pid_running(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::ESRCH) => false,
        // The process exists but belongs to someone else.
        Err(Errno::EPERM) => true,
        Err(err) => {
            warn!("Failed to query liveness of PID {pid}: {err}");
            false
        }
    }
}

fn is_zombie(pid: u32) -> bool {
    let target = sysinfo::Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    system
        .process(target)
        .is_some_and(|process| process.status() == ProcessStatus::Zombie)
}

/// A short description of a running process for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub name: String,
    pub memory_bytes: u64,
    pub run_time_secs: u64,
}

/// Looks up name, memory and uptime for `pid`, if the process exists.
pub fn describe_process(pid: u32) -> Option<ProcessSummary> {
    let target = sysinfo::Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    system.process(target).map(|process| ProcessSummary {
        name: process.name().to_string_lossy().into_owned(),
        memory_bytes: process.memory(),
        run_time_secs: process.run_time(),
    })
}
