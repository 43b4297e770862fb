use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Default location for the running proxy's PID file, used by the `stop`
/// and `status` CLI subcommands since there is no admin API.
pub fn default_path() -> PathBuf {
    std::env::var("PROXY_BALANCER_PID_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp/proxy-balancer.pid"))
}

pub fn write(path: &Path, pid: u32) -> Result<()> {
    std::fs::write(path, pid.to_string())
        .with_context(|| format!("writing pid file {}", path.display()))
}

pub fn read(path: &Path) -> Result<u32> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading pid file {}", path.display()))?;
    content
        .trim()
        .parse::<u32>()
        .with_context(|| format!("pid file {} does not contain a valid pid", path.display()))
}

pub fn remove(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove pid file {}: {}", path.display(), e);
        }
    }
}

/// True iff a process with this pid exists and is reachable (sends signal 0).
pub fn is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Sends SIGTERM to the process named in the pid file.
pub fn send_terminate(path: &Path) -> Result<()> {
    let pid = read(path)?;
    signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .with_context(|| format!("sending SIGTERM to pid {pid}"))?;
    Ok(())
}
