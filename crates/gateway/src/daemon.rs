//! Daemon lifecycle (§4.9): `start`/`stop`/`status`/`restart` for running the
//! gateway detached from its launching terminal.
//!
//! `start` re-execs the current binary with `--foreground` as a new session
//! leader (`process_group(0)`), rather than `fork()`-ing directly — this
//! workspace denies `unsafe_code`, and `nix::unistd::fork` requires it. A
//! re-exec gives the same end state (a detached child owning its own stdio
//! redirected to a log file) without an unsafe block.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub uptime_secs: Option<u64>,
}

fn pid_file(home: &Path) -> PathBuf {
    home.join("gateway.pid")
}

fn started_at_file(home: &Path) -> PathBuf {
    home.join("gateway.started_at")
}

fn log_file(home: &Path) -> PathBuf {
    home.join("gateway.log")
}

/// Spawn a detached gateway process running `exe --foreground <extra_args>`,
/// tee'd stdout/stderr into `gateway.log`, and record its pid.
pub fn start(home: &Path, exe: &Path, extra_args: &[String]) -> Result<u32> {
    fs::create_dir_all(home).map_err(GatewayError::Io)?;

    if let Some(status) = read_status(home)?
        && status.running
    {
        return Err(GatewayError::conflict("gateway is already running"));
    }

    let log = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file(home))
        .map_err(GatewayError::Io)?;
    let log_err = log.try_clone().map_err(GatewayError::Io)?;

    let mut command = std::process::Command::new(exe);
    command.arg("--foreground").args(extra_args);
    command.stdin(std::process::Stdio::null());
    command.stdout(log);
    command.stderr(log_err);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command.spawn().map_err(GatewayError::Io)?;
    let pid = child.id();
    write_pid(home, pid)?;
    write_started_at(home)?;
    Ok(pid)
}

fn write_pid(home: &Path, pid: u32) -> Result<()> {
    let mut lock = FileLock::new(
        fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(pid_file(home))
            .map_err(GatewayError::Io)?,
    );
    let mut guard = lock.write().map_err(GatewayError::Io)?;
    guard.write_all(pid.to_string().as_bytes()).map_err(GatewayError::Io)?;
    Ok(())
}

fn read_pid(home: &Path) -> Result<Option<u32>> {
    let path = pid_file(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path).map_err(GatewayError::Io)?;
    Ok(contents.trim().parse().ok())
}

/// Records the epoch-seconds timestamp `start` was called at, so `status()`
/// can report uptime without the daemon process reporting it itself.
fn write_started_at(home: &Path) -> Result<()> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    fs::write(started_at_file(home), now.to_string()).map_err(GatewayError::Io)
}

fn read_started_at(home: &Path) -> Option<u64> {
    fs::read_to_string(started_at_file(home)).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

pub fn read_status(home: &Path) -> Result<Option<DaemonStatus>> {
    let Some(pid) = read_pid(home)? else {
        return Ok(None);
    };
    let running = process_alive(pid);
    let uptime_secs = running.then(|| read_started_at(home)).flatten().map(|started| {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now.saturating_sub(started)
    });
    Ok(Some(DaemonStatus {
        running,
        pid: running.then_some(pid),
        uptime_secs,
    }))
}

/// `stop()`: SIGTERM, poll up to 2s, SIGKILL if still alive.
#[cfg(unix)]
pub async fn stop(home: &Path) -> Result<()> {
    let Some(pid) = read_pid(home)? else {
        return Ok(());
    };
    let nix_pid = nix::unistd::Pid::from_raw(pid as i32);
    let _ = nix::sys::signal::kill(nix_pid, nix::sys::signal::Signal::SIGTERM);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if !process_alive(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if process_alive(pid) {
        let _ = nix::sys::signal::kill(nix_pid, nix::sys::signal::Signal::SIGKILL);
    }
    let _ = fs::remove_file(pid_file(home));
    let _ = fs::remove_file(started_at_file(home));
    Ok(())
}

#[cfg(not(unix))]
pub async fn stop(home: &Path) -> Result<()> {
    let _ = fs::remove_file(pid_file(home));
    let _ = fs::remove_file(started_at_file(home));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_none_without_a_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_status(dir.path()).unwrap().is_none());
    }

    #[test]
    fn status_reports_dead_for_a_stale_pid() {
        let dir = tempfile::tempdir().unwrap();
        write_pid(dir.path(), 999_999).unwrap();
        let status = read_status(dir.path()).unwrap().unwrap();
        assert!(!status.running);
    }

    #[test]
    fn status_reports_uptime_for_a_live_process() {
        let dir = tempfile::tempdir().unwrap();
        // Our own pid is always alive, and a safe stand-in for a real
        // daemon child in a test that can't spawn one.
        write_pid(dir.path(), std::process::id()).unwrap();
        write_started_at(dir.path()).unwrap();
        let status = read_status(dir.path()).unwrap().unwrap();
        assert!(status.running);
        assert!(status.uptime_secs.is_some());
    }
}
