//! Single-connection SSH plumbing: connect, run one command, read or write
//! one file over SFTP. Every helper takes the whole action timeout; there is
//! no retry and no reuse, the process exits after one action.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use shared::SshConfig;
use ssh2::Session;
use thiserror::Error;

/// stderr noise emitted by legitimate remote commands when no TTY is
/// allocated. Lines containing any of these are dropped before the
/// non-empty-stderr failure check.
const HARMLESS_STDERR: &[&str] = &[
    "stty: not a tty",
    "TERM environment variable not set",
    "Pseudo-terminal will not be allocated",
];

#[derive(Debug, Error)]
pub enum SshError {
    #[error("Host not found: {0}")]
    HostNotFound(String),
    #[error("Connection refused by {0}")]
    ConnectionRefused(String),
    #[error("Connection to {0} timed out")]
    ConnectTimeout(String),
    #[error("Authentication failed: check the SSH username and password")]
    AuthFailed,
    #[error("Remote command timed out after {0} seconds")]
    CommandTimeout(u64),
    #[error("{0}")]
    Other(String),
}

impl SshError {
    fn from_io(err: std::io::Error, host: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => Self::ConnectionRefused(host.to_string()),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                Self::ConnectTimeout(host.to_string())
            }
            _ => Self::Other(err.to_string()),
        }
    }
}

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    /// stderr with harmless TTY noise filtered out, `None` when nothing
    /// meaningful remains. Exit status is deliberately not consulted here.
    pub fn meaningful_stderr(&self) -> Option<String> {
        meaningful_stderr(&self.stderr)
    }
}

pub fn meaningful_stderr(stderr: &str) -> Option<String> {
    let remaining: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !HARMLESS_STDERR.iter().any(|noise| line.contains(noise)))
        .collect();
    if remaining.is_empty() {
        None
    } else {
        Some(remaining.join("\n"))
    }
}

/// Open a TCP connection, perform the SSH handshake and authenticate with a
/// password. The returned session has its blocking-call timeout set to the
/// action timeout.
pub fn connect(config: &SshConfig, timeout: Duration) -> Result<Session, SshError> {
    let addrs = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|_| SshError::HostNotFound(config.host.clone()))?;

    let connect_timeout = timeout.min(Duration::from_secs(10));
    let mut last_err = SshError::HostNotFound(config.host.clone());
    let mut tcp = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, connect_timeout) {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            }
            Err(e) => last_err = SshError::from_io(e, &config.host),
        }
    }
    let tcp = tcp.ok_or(last_err)?;

    let mut session = Session::new().map_err(|e| SshError::Other(e.to_string()))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis() as u32);
    session
        .handshake()
        .map_err(|e| classify_ssh_error(e, &config.host))?;
    session
        .userauth_password(&config.username, &config.password)
        .map_err(|_| SshError::AuthFailed)?;
    if !session.authenticated() {
        return Err(SshError::AuthFailed);
    }

    Ok(session)
}

fn classify_ssh_error(err: ssh2::Error, host: &str) -> SshError {
    let message = err.to_string();
    if message.to_lowercase().contains("timeout") || message.to_lowercase().contains("timed out") {
        SshError::ConnectTimeout(host.to_string())
    } else {
        SshError::Other(message)
    }
}

/// Run one command and collect its output. The timeout is enforced twice:
/// the session's blocking-call timeout aborts a stalled read, and a
/// wall-clock deadline catches streams that trickle output forever.
pub fn exec(session: &Session, command: &str, timeout: Duration) -> Result<CommandOutput, SshError> {
    let deadline = Instant::now() + timeout;
    let timed_out = |e: ssh2::Error| {
        let msg = e.to_string();
        if msg.to_lowercase().contains("timeout") || Instant::now() >= deadline {
            SshError::CommandTimeout(timeout.as_secs())
        } else {
            SshError::Other(msg)
        }
    };

    let mut channel = session.channel_session().map_err(timed_out)?;
    channel.exec(command).map_err(timed_out)?;

    let mut stdout = String::new();
    let mut stderr = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| read_error(e, deadline, timeout))?;
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| read_error(e, deadline, timeout))?;

    // Both streams drained and the channel closed: the command finished, so
    // hand back its output even if the wall clock ran out mid-drain.
    channel.wait_close().map_err(timed_out)?;
    let exit_status = channel.exit_status().unwrap_or(0);

    Ok(CommandOutput { stdout, stderr, exit_status })
}

fn read_error(err: std::io::Error, deadline: Instant, timeout: Duration) -> SshError {
    if Instant::now() >= deadline
        || matches!(err.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock)
    {
        SshError::CommandTimeout(timeout.as_secs())
    } else {
        SshError::Other(err.to_string())
    }
}

/// Read a remote file over SFTP. Any open failure is treated as "absent";
/// the caller substitutes its default in that case.
pub fn read_remote_file(session: &Session, path: &str) -> Result<Option<Vec<u8>>, SshError> {
    let sftp = session.sftp().map_err(|e| SshError::Other(e.to_string()))?;
    let mut file = match sftp.open(Path::new(path)) {
        Ok(f) => f,
        Err(_) => return Ok(None),
    };
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|e| SshError::Other(e.to_string()))?;
    Ok(Some(contents))
}

/// Write a remote file over SFTP, creating parent directories as needed.
pub fn write_remote_file(session: &Session, path: &str, contents: &[u8]) -> Result<(), SshError> {
    let sftp = session.sftp().map_err(|e| SshError::Other(e.to_string()))?;

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        let mut dir = PathBuf::new();
        for component in parent.components() {
            dir.push(component);
            if dir.as_os_str().is_empty() || dir == Path::new("/") {
                continue;
            }
            // Already-existing directories make mkdir fail; that is fine.
            let _ = sftp.mkdir(&dir, 0o755);
        }
    }

    let mut file = sftp
        .create(path)
        .map_err(|e| SshError::Other(format!("Failed to create {}: {e}", path.display())))?;
    file.write_all(contents)
        .map_err(|e| SshError::Other(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tty_warning_alone_is_not_a_failure() {
        assert_eq!(meaningful_stderr("stty: not a tty"), None);
        assert_eq!(meaningful_stderr("stty: not a tty\n"), None);
    }

    #[test]
    fn permission_denied_is_a_failure() {
        assert_eq!(
            meaningful_stderr("permission denied").as_deref(),
            Some("permission denied")
        );
    }

    #[test]
    fn noise_lines_are_dropped_but_real_errors_kept() {
        let stderr = "TERM environment variable not set\nstty: not a tty\nno such unit: frob.service\n";
        assert_eq!(
            meaningful_stderr(stderr).as_deref(),
            Some("no such unit: frob.service")
        );
    }

    #[test]
    fn blank_stderr_is_clean() {
        assert_eq!(meaningful_stderr(""), None);
        assert_eq!(meaningful_stderr("  \n\t\n"), None);
    }

    #[test]
    fn read_errors_past_the_deadline_count_as_timeouts() {
        let expired = Instant::now() - Duration::from_secs(1);
        let err = read_error(
            std::io::Error::new(std::io::ErrorKind::Other, "stream stalled"),
            expired,
            Duration::from_secs(15),
        );
        assert!(matches!(err, SshError::CommandTimeout(15)));

        let live = Instant::now() + Duration::from_secs(60);
        let err = read_error(
            std::io::Error::new(std::io::ErrorKind::Other, "stream stalled"),
            live,
            Duration::from_secs(15),
        );
        assert!(matches!(err, SshError::Other(_)));
    }
}
