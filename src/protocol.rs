//! Wire format for the depot transfer protocol.
//!
//! One connection carries one upload, as a strict sequence of framed
//! messages: identity, credential, auth result, department selector,
//! destination path, payload length, payload bytes, transfer result.
//!
//! Every string message is framed as a 2-byte big-endian length prefix
//! followed by that many bytes. The payload is announced by a 4-byte
//! big-endian length and then sent raw. Peers never rely on read timing to
//! find message boundaries.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Per-message caps, enforced on both ends.
pub const USERNAME_MAX: usize = 31;
pub const PASSWORD_MAX: usize = 31;
pub const DEPARTMENT_MAX: usize = 32;
pub const PATH_MAX: usize = 255;
pub const RESPONSE_MAX: usize = 512;

/// Chunk size for streaming the payload.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Centralized timeout constants for the daemon's reads and writes.
pub mod timeouts {
    /// Deadline for a single framed message (ms). Generous because the
    /// client may be prompting a human between messages.
    pub const MESSAGE_MS: u64 = 60_000;

    /// Base deadline for the payload phase (ms).
    pub const PAYLOAD_BASE_MS: u64 = 10_000;

    /// Additional payload deadline per MB (ms).
    pub const PER_MB_MS: u64 = 100;

    /// Deadline for writing a response (ms).
    pub const WRITE_MS: u64 = 10_000;

    /// Payload deadline scaled by declared size (ms).
    pub fn payload_deadline_ms(len: u64) -> u64 {
        let mb = (len + 1_048_575) / 1_048_576;
        PAYLOAD_BASE_MS + mb * PER_MB_MS
    }
}

/// Write one framed message: u16 big-endian length, then the bytes.
pub async fn write_message<S>(stream: &mut S, msg: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    debug_assert!(msg.len() <= u16::MAX as usize);
    stream.write_all(&(msg.len() as u16).to_be_bytes()).await?;
    if !msg.is_empty() {
        stream.write_all(msg).await?;
    }
    Ok(())
}

/// Read one framed message, rejecting frames longer than `max`.
///
/// EOF on the length prefix surfaces as `UnexpectedEof`; an over-cap length
/// means the stream is malformed and the connection is unusable.
pub async fn read_message<S>(stream: &mut S, max: usize) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 2];
    stream.read_exact(&mut prefix).await?;
    let len = u16::from_be_bytes(prefix) as usize;
    if len > max {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {len} bytes exceeds cap of {max}"),
        ));
    }
    let mut buf = vec![0u8; len];
    if len > 0 {
        stream.read_exact(&mut buf).await?;
    }
    Ok(buf)
}

/// Read one framed message and require valid UTF-8.
pub async fn read_message_string<S>(stream: &mut S, max: usize) -> io::Result<String>
where
    S: AsyncRead + Unpin,
{
    let bytes = read_message(stream, max).await?;
    String::from_utf8(bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "message is not valid UTF-8"))
}

/// Read the 4-byte big-endian payload length.
pub async fn read_payload_len<S>(stream: &mut S) -> io::Result<u32>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

/// Write the 4-byte big-endian payload length.
pub async fn write_payload_len<S>(stream: &mut S, len: u32) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&len.to_be_bytes()).await
}

/// Apply a deadline to an I/O future, mapping expiry to `TimedOut`.
pub async fn timed<T, F>(ms: u64, fut: F) -> io::Result<T>
where
    F: std::future::Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(Duration::from_millis(ms), fut).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("I/O timeout ({ms} ms)"),
        )),
    }
}
