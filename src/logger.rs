use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;

/// Observability sink for connection lifecycle events. The handler reports
/// everything here; implementations decide where it goes.
pub trait Logger: Send + Sync {
    fn connected(&self, _peer: SocketAddr) {}
    fn auth_ok(&self, _peer: SocketAddr, _user: &str, _department: &str) {}
    fn auth_failed(&self, _peer: SocketAddr, _reason: &str) {}
    fn transfer_done(&self, _peer: SocketAddr, _user: &str, _file: &str, _department: &str, _bytes: u64) {}
    fn transfer_failed(&self, _peer: SocketAddr, _user: &str, _reason: &str) {}
    fn warn(&self, _context: &str, _msg: &str) {}
    fn disconnected(&self, _peer: SocketAddr) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Logs every event to stderr, the daemon's console sink.
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn connected(&self, peer: SocketAddr) {
        eprintln!("connection from {peer}");
    }
    fn auth_ok(&self, peer: SocketAddr, user: &str, department: &str) {
        eprintln!("{peer} authenticated as '{user}' ({department})");
    }
    fn auth_failed(&self, peer: SocketAddr, reason: &str) {
        eprintln!("{peer} authentication failed: {reason}");
    }
    fn transfer_done(&self, peer: SocketAddr, user: &str, file: &str, department: &str, bytes: u64) {
        eprintln!("{peer} '{user}' stored '{file}' in {department} ({bytes} bytes)");
    }
    fn transfer_failed(&self, peer: SocketAddr, user: &str, reason: &str) {
        eprintln!("{peer} transfer failed for '{user}': {reason}");
    }
    fn warn(&self, context: &str, msg: &str) {
        eprintln!("warning: {context}: {msg}");
    }
    fn disconnected(&self, peer: SocketAddr) {
        eprintln!("connection closed with {peer}");
    }
}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
    }
}

impl Logger for TextLogger {
    fn connected(&self, peer: SocketAddr) {
        self.line(&format!("CONNECT peer={peer}"));
    }
    fn auth_ok(&self, peer: SocketAddr, user: &str, department: &str) {
        self.line(&format!("AUTH peer={peer} user={user} department={department}"));
    }
    fn auth_failed(&self, peer: SocketAddr, reason: &str) {
        self.line(&format!("AUTH_FAIL peer={peer} reason={reason}"));
    }
    fn transfer_done(&self, peer: SocketAddr, user: &str, file: &str, department: &str, bytes: u64) {
        self.line(&format!(
            "TRANSFER peer={peer} user={user} file={file} department={department} bytes={bytes}"
        ));
    }
    fn transfer_failed(&self, peer: SocketAddr, user: &str, reason: &str) {
        self.line(&format!("TRANSFER_FAIL peer={peer} user={user} reason={reason}"));
    }
    fn warn(&self, context: &str, msg: &str) {
        self.line(&format!("WARN ctx={context} msg={msg}"));
    }
    fn disconnected(&self, peer: SocketAddr) {
        self.line(&format!("CLOSE peer={peer}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_logger_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depotd.log");
        let logger = TextLogger::new(&path).unwrap();
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        logger.connected(peer);
        logger.auth_ok(peer, "alice", "Manufacturing");
        logger.disconnected(peer);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.contains("user=alice"));
    }
}
