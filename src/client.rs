//! Client-side protocol operations: connect, authenticate, stream one file.
//!
//! Responses are returned verbatim; the caller decides what a failure line
//! means for its exit status.

use crate::department::Department;
use crate::protocol::{
    self, CHUNK_SIZE, PASSWORD_MAX, PATH_MAX, RESPONSE_MAX, USERNAME_MAX,
};
use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("connect to {host}:{port}"))?;
        let _ = stream.set_nodelay(true);
        Ok(Client { stream })
    }

    /// Send the identity and credential messages and return the server's
    /// authentication response line.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<String> {
        if username.len() > USERNAME_MAX {
            bail!("username longer than {USERNAME_MAX} bytes");
        }
        if password.len() > PASSWORD_MAX {
            bail!("password longer than {PASSWORD_MAX} bytes");
        }
        protocol::write_message(&mut self.stream, username.as_bytes()).await?;
        protocol::write_message(&mut self.stream, password.as_bytes()).await?;
        protocol::read_message_string(&mut self.stream, RESPONSE_MAX)
            .await
            .context("read authentication response")
    }

    /// Stream a file from disk, declaring its own path, and return the
    /// server's result line.
    pub async fn send_file(&mut self, department: Department, path: &Path) -> Result<String> {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot access file '{}'", path.display()))?;
        if !meta.is_file() {
            bail!("'{}' is not a regular file", path.display());
        }
        if meta.len() > u32::MAX as u64 {
            bail!("'{}' is too large for a single transfer", path.display());
        }
        let declared = path.to_string_lossy();
        if declared.len() > PATH_MAX {
            bail!("file path longer than {PATH_MAX} bytes");
        }

        self.send_header(department.name(), &declared, meta.len() as u32)
            .await?;

        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open '{}'", path.display()))?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.stream.write_all(&buf[..n]).await?;
        }

        self.read_result().await
    }

    /// Send an in-memory payload under an arbitrary selector and declared
    /// path. Exercises the server's authorization and path handling without
    /// touching disk; the selector is sent as given, valid or not.
    pub async fn send_bytes(
        &mut self,
        selector: &str,
        declared_path: &str,
        payload: &[u8],
    ) -> Result<String> {
        self.send_header(selector, declared_path, payload.len() as u32)
            .await?;
        self.stream.write_all(payload).await?;
        self.read_result().await
    }

    async fn send_header(&mut self, selector: &str, declared: &str, len: u32) -> Result<()> {
        protocol::write_message(&mut self.stream, selector.as_bytes()).await?;
        protocol::write_message(&mut self.stream, declared.as_bytes()).await?;
        protocol::write_payload_len(&mut self.stream, len).await?;
        Ok(())
    }

    async fn read_result(&mut self) -> Result<String> {
        protocol::read_message_string(&mut self.stream, RESPONSE_MAX)
            .await
            .context("read transfer response")
    }
}
