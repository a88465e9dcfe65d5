//! The file-receive phase: department selector, authorization, destination
//! name, declared length, then exactly that many payload bytes.
//!
//! Only the final `/`-separated component of the client's declared path is
//! honored, so a declared `../../etc/passwd` lands as `passwd` inside the
//! session's department directory. The payload is written chunk by chunk
//! under the department's storage guard; a short read mid-payload aborts the
//! transfer and leaves the partial file on disk (no rollback), and the
//! attribution sidecar is only written once the payload is complete.

use crate::auth::Session;
use crate::department::Department;
use crate::protocol::{self, timeouts, CHUNK_SIZE, DEPARTMENT_MAX, PATH_MAX};
use crate::store::Depot;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    #[error("access to the {requested} department denied")]
    AccessDenied { requested: String },
    #[error("invalid department '{0}'")]
    InvalidDepartment(String),
    #[error("storage error: {0}")]
    Storage(#[source] io::Error),
}

impl TransferError {
    /// Response line for the peer, or `None` when the connection itself is
    /// the failure.
    pub fn peer_message(&self) -> Option<String> {
        match self {
            TransferError::Connection(_) => None,
            TransferError::AccessDenied { requested } => Some(format!(
                "Error: You don't have access to the {requested} department"
            )),
            TransferError::InvalidDepartment(_) => Some("Error: Invalid department".to_string()),
            TransferError::Storage(e) => Some(format!("Error: Cannot create file: {e}")),
        }
    }
}

/// Summary of one stored upload.
#[derive(Debug)]
pub struct TransferResult {
    pub file_name: String,
    pub department: Department,
    pub bytes: u64,
    pub path: PathBuf,
    /// Set when ownership could not be applied; the transfer still counts.
    pub ownership_warning: Option<String>,
}

impl TransferResult {
    pub fn success_message(&self) -> String {
        format!(
            "File '{}' successfully transferred to {} department",
            self.file_name, self.department
        )
    }
}

/// Final `/`-separated component of a declared path. Directory components
/// supplied by the client are discarded.
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Run the file-receive phase for an authenticated session.
pub async fn receive<S>(
    stream: &mut S,
    session: &Session,
    depot: &Depot,
) -> Result<TransferResult, TransferError>
where
    S: AsyncRead + Unpin,
{
    let selector = protocol::timed(
        timeouts::MESSAGE_MS,
        protocol::read_message_string(stream, DEPARTMENT_MAX),
    )
    .await?;

    // Authorization: the selector must name the session's own department.
    if selector != session.department.name() {
        return Err(TransferError::AccessDenied {
            requested: selector,
        });
    }
    let department = Department::from_name(&selector)
        .ok_or_else(|| TransferError::InvalidDepartment(selector.clone()))?;

    let declared = protocol::timed(
        timeouts::MESSAGE_MS,
        protocol::read_message_string(stream, PATH_MAX),
    )
    .await?;
    let name = base_name(&declared);
    if name.is_empty() {
        return Err(TransferError::Storage(io::Error::new(
            io::ErrorKind::InvalidInput,
            "declared path has no file name",
        )));
    }

    let length =
        protocol::timed(timeouts::MESSAGE_MS, protocol::read_payload_len(stream)).await? as u64;
    let dest = depot.destination(department, name);

    // Storage guard: create, write, attribute runs exclusively per
    // department, released by drop on every exit path.
    let _guard = depot.lock(department).await;

    let mut file = File::create(&dest).map_err(TransferError::Storage)?;
    let deadline = timeouts::payload_deadline_ms(length);
    let copy = async {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut remaining = length;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = stream.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(TransferError::Connection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed mid-payload",
                )));
            }
            file.write_all(&buf[..n]).map_err(TransferError::Storage)?;
            remaining -= n as u64;
        }
        Ok(())
    };
    match tokio::time::timeout(Duration::from_millis(deadline), copy).await {
        Ok(res) => res?,
        Err(_) => {
            return Err(TransferError::Connection(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("payload timeout ({deadline} ms)"),
            )))
        }
    }
    drop(file);

    let ownership_warning = depot
        .finalize(&dest, &session.username, session.uid)
        .map_err(TransferError::Storage)?;

    Ok(TransferResult {
        file_name: name.to_string(),
        department,
        bytes: length,
        path: dest,
        ownership_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{write_message, write_payload_len};
    use crate::store::sidecar_path;
    use tokio::io::AsyncWriteExt;

    fn session(department: Department) -> Session {
        Session {
            peer: "127.0.0.1:50000".parse().unwrap(),
            username: "alice".to_string(),
            uid: test_uid(),
            department,
        }
    }

    fn depot_with_dirs() -> (tempfile::TempDir, Depot) {
        let dir = tempfile::tempdir().unwrap();
        let depot = Depot::new(dir.path());
        for dept in Department::ALL {
            std::fs::create_dir_all(depot.department_dir(dept)).unwrap();
        }
        (dir, depot)
    }

    #[test]
    fn base_name_discards_directories() {
        assert_eq!(base_name("../../etc/passwd"), "passwd");
        assert_eq!(base_name("/var/tmp/a.bin"), "a.bin");
        assert_eq!(base_name("report.pdf"), "report.pdf");
        assert_eq!(base_name("docs/"), "");
    }

    #[tokio::test]
    async fn stores_payload_and_attribution() {
        let (_dir, depot) = depot_with_dirs();
        let session = session(Department::Manufacturing);
        let payload = b"drawing data".to_vec();

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, b"Manufacturing").await.unwrap();
        write_message(&mut client, b"cad/drawings/part.dxf").await.unwrap();
        write_payload_len(&mut client, payload.len() as u32).await.unwrap();
        client.write_all(&payload).await.unwrap();

        let result = receive(&mut server, &session, &depot).await.unwrap();
        assert_eq!(result.file_name, "part.dxf");
        assert_eq!(result.bytes, payload.len() as u64);
        assert_eq!(
            result.success_message(),
            "File 'part.dxf' successfully transferred to Manufacturing department"
        );

        let stored = std::fs::read(&result.path).unwrap();
        assert_eq!(stored, payload);
        let owner = std::fs::read(sidecar_path(&result.path)).unwrap();
        assert_eq!(owner, b"alice");
    }

    #[tokio::test]
    async fn department_mismatch_creates_nothing() {
        let (_dir, depot) = depot_with_dirs();
        let session = session(Department::Manufacturing);

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, b"Distribution").await.unwrap();

        let err = receive(&mut server, &session, &depot).await.unwrap_err();
        assert!(matches!(err, TransferError::AccessDenied { .. }));
        assert_eq!(
            err.peer_message().unwrap(),
            "Error: You don't have access to the Distribution department"
        );

        for dept in Department::ALL {
            let entries: Vec<_> = std::fs::read_dir(depot.department_dir(dept))
                .unwrap()
                .collect();
            assert!(entries.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_selector_is_denied_not_stored() {
        let (_dir, depot) = depot_with_dirs();
        let session = session(Department::Manufacturing);

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, b"Accounting").await.unwrap();

        let err = receive(&mut server, &session, &depot).await.unwrap_err();
        assert!(matches!(err, TransferError::AccessDenied { ref requested } if requested == "Accounting"));
    }

    #[tokio::test]
    async fn traversal_is_confined_to_department_dir() {
        let (_dir, depot) = depot_with_dirs();
        let session = session(Department::Distribution);

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, b"Distribution").await.unwrap();
        write_message(&mut client, b"../../etc/passwd").await.unwrap();
        write_payload_len(&mut client, 4).await.unwrap();
        client.write_all(b"data").await.unwrap();

        let result = receive(&mut server, &session, &depot).await.unwrap();
        assert_eq!(
            result.path,
            depot.destination(Department::Distribution, "passwd")
        );
        assert!(result.path.starts_with(depot.department_dir(Department::Distribution)));
    }

    #[tokio::test]
    async fn short_payload_fails_and_leaves_partial_file() {
        let (_dir, depot) = depot_with_dirs();
        let session = session(Department::Manufacturing);

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, b"Manufacturing").await.unwrap();
        write_message(&mut client, b"big.bin").await.unwrap();
        write_payload_len(&mut client, 100).await.unwrap();
        client.write_all(b"only-sixteen-byt").await.unwrap();
        drop(client);

        let err = receive(&mut server, &session, &depot).await.unwrap_err();
        assert!(matches!(err, TransferError::Connection(_)));
        assert!(err.peer_message().is_none());

        let partial = depot.destination(Department::Manufacturing, "big.bin");
        assert_eq!(std::fs::read(&partial).unwrap().len(), 16);
        assert!(!sidecar_path(&partial).exists());
    }

    #[tokio::test]
    async fn empty_basename_is_a_storage_error() {
        let (_dir, depot) = depot_with_dirs();
        let session = session(Department::Manufacturing);

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, b"Manufacturing").await.unwrap();
        write_message(&mut client, b"docs/").await.unwrap();

        let err = receive(&mut server, &session, &depot).await.unwrap_err();
        assert!(matches!(err, TransferError::Storage(_)));
    }

    #[tokio::test]
    async fn zero_length_payload_stores_empty_file() {
        let (_dir, depot) = depot_with_dirs();
        let session = session(Department::Manufacturing);

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_message(&mut client, b"Manufacturing").await.unwrap();
        write_message(&mut client, b"empty.txt").await.unwrap();
        write_payload_len(&mut client, 0).await.unwrap();

        let result = receive(&mut server, &session, &depot).await.unwrap();
        assert_eq!(result.bytes, 0);
        assert_eq!(std::fs::read(&result.path).unwrap().len(), 0);
        assert_eq!(std::fs::read(sidecar_path(&result.path)).unwrap(), b"alice");
    }

    #[cfg(unix)]
    fn test_uid() -> u32 {
        unsafe { libc::getuid() }
    }

    #[cfg(not(unix))]
    fn test_uid() -> u32 {
        0
    }
}
