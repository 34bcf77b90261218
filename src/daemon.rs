// ABOUTME: Daemon mode support for running the mirror as a background service
// ABOUTME: Unix only (fork via daemonize); PID file and log live in ~/.folder-replicator/

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const DAEMON_DIR_NAME: &str = ".folder-replicator";

/// Get the directory for daemon state files, creating it if needed.
pub fn get_daemon_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to determine home directory")?;
    let daemon_dir = home.join(DAEMON_DIR_NAME);

    if !daemon_dir.exists() {
        fs::create_dir_all(&daemon_dir)
            .with_context(|| format!("Failed to create daemon directory: {:?}", daemon_dir))?;
    }

    Ok(daemon_dir)
}

pub fn get_pid_file_path() -> Result<PathBuf> {
    Ok(get_daemon_dir()?.join("mirror.pid"))
}

/// Log file receiving the daemon's stdout/stderr (diagnostics, not the
/// change log).
pub fn get_log_file_path() -> Result<PathBuf> {
    Ok(get_daemon_dir()?.join("daemon.log"))
}

/// Status information about the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<i32>,
    pub pid_file_exists: bool,
}

fn read_pid(pid_file: &Path) -> Result<Option<i32>> {
    if !pid_file.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(pid_file)
        .with_context(|| format!("Failed to read PID file: {:?}", pid_file))?;
    let pid: i32 = content
        .trim()
        .parse()
        .with_context(|| format!("Invalid PID in file: {}", content.trim()))?;

    Ok(Some(pid))
}

fn remove_pid_file(pid_file: &Path) -> Result<()> {
    if pid_file.exists() {
        fs::remove_file(pid_file)
            .with_context(|| format!("Failed to remove PID file: {:?}", pid_file))?;
    }
    Ok(())
}

#[cfg(unix)]
fn is_process_running(pid: i32) -> bool {
    // Signal 0 only checks that the process exists
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: i32) -> bool {
    false
}

fn status_for(pid_file: &Path) -> Result<DaemonStatus> {
    let pid_file_exists = pid_file.exists();
    let pid = read_pid(pid_file)?;
    let running = pid.map(is_process_running).unwrap_or(false);

    Ok(DaemonStatus {
        running,
        pid,
        pid_file_exists,
    })
}

/// Check the status of the daemon.
pub fn check_status() -> Result<DaemonStatus> {
    status_for(&get_pid_file_path()?)
}

/// Stop the running daemon. Returns false if none was running.
#[cfg(unix)]
pub fn stop_daemon() -> Result<bool> {
    use std::time::{Duration, Instant};

    let pid_file = get_pid_file_path()?;
    let status = status_for(&pid_file)?;

    let pid = match status.pid {
        Some(pid) if status.running => pid,
        _ => {
            if status.pid_file_exists {
                remove_pid_file(&pid_file)?;
                println!("Removed stale PID file (process was not running)");
            }
            return Ok(false);
        }
    };

    println!("Sending SIGTERM to daemon (PID: {})", pid);
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        anyhow::bail!(
            "Failed to send SIGTERM to process {}: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }

    // A pass in progress finishes before the daemon exits
    let start = Instant::now();
    let timeout = Duration::from_secs(10);
    while is_process_running(pid) {
        if start.elapsed() > timeout {
            println!("Process didn't exit within 10 seconds, sending SIGKILL");
            unsafe { libc::kill(pid, libc::SIGKILL) };
            std::thread::sleep(Duration::from_millis(500));
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    remove_pid_file(&pid_file)?;
    Ok(true)
}

#[cfg(not(unix))]
pub fn stop_daemon() -> Result<bool> {
    anyhow::bail!("Daemon mode is only supported on Unix platforms")
}

/// Detach the current process from the terminal (Unix).
///
/// Must be called before the tokio runtime starts: forking a process with
/// live runtime threads leaves the child without them.
#[cfg(unix)]
pub fn daemonize() -> Result<()> {
    use daemonize::Daemonize;
    use std::fs::OpenOptions;

    let pid_file = get_pid_file_path()?;
    let log_file = get_log_file_path()?;

    let status = status_for(&pid_file)?;
    if let (true, Some(pid)) = (status.running, status.pid) {
        anyhow::bail!(
            "Daemon is already running (PID: {}). Use --stop to stop it first.",
            pid
        );
    }
    if status.pid_file_exists {
        remove_pid_file(&pid_file)?;
    }

    let open_log = || {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open log file: {:?}", log_file))
    };
    let stdout = open_log()?;
    let stderr = open_log()?;

    println!("Starting daemon...");
    println!("PID file: {:?}", pid_file);
    println!("Log file: {:?}", log_file);

    // Keep the launch directory so relative source/replica paths still resolve
    let working_dir = std::env::current_dir().context("Failed to determine current directory")?;

    Daemonize::new()
        .pid_file(&pid_file)
        .chown_pid_file(true)
        .working_directory(working_dir)
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize process")?;

    Ok(())
}

#[cfg(not(unix))]
pub fn daemonize() -> Result<()> {
    anyhow::bail!("Daemon mode is only supported on Unix platforms")
}

/// Print daemon status and recent daemon log lines to stdout.
pub fn print_status() -> Result<()> {
    let status = check_status()?;
    let log_file = get_log_file_path()?;

    match status.pid {
        Some(pid) if status.running => {
            println!("Daemon status: RUNNING");
            println!("PID: {}", pid);
            println!("Log file: {:?}", log_file);

            if log_file.exists() {
                println!("\nRecent log entries:");
                println!("-------------------");
                let content = fs::read_to_string(&log_file)?;
                for line in tail_lines(&content, 10) {
                    println!("{}", line);
                }
            }
        }
        _ => {
            println!("Daemon status: NOT RUNNING");
            if status.pid_file_exists {
                println!(
                    "Note: Stale PID file exists (PID {} is not running)",
                    status.pid.unwrap_or(0)
                );
                println!("Run with --stop to clean up the stale PID file");
            }
        }
    }

    Ok(())
}

fn tail_lines(content: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].to_vec()
}

/// Clean up daemon resources (call on normal shutdown).
pub fn cleanup() -> Result<()> {
    let pid_file = get_pid_file_path()?;
    // Only remove the PID file if it belongs to this process
    if read_pid(&pid_file)? == Some(std::process::id() as i32) {
        remove_pid_file(&pid_file)?;
    }
    Ok(())
}
