//! Authentication: two framed reads, identity resolution, department
//! assignment.
//!
//! The credential message is read to keep the wire sequence aligned and then
//! discarded without verification; any password is accepted for a username
//! the identity provider resolves. Credential checking is deliberately out
//! of scope here, not an oversight (see DESIGN.md).

use crate::department::Department;
use crate::identity::IdentityProvider;
use crate::protocol::{self, timeouts};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),
    #[error("user '{0}' not found")]
    UnknownUser(String),
    #[error("user '{0}' is not a member of any department group")]
    NoDepartment(String),
}

impl AuthError {
    /// Response line for the peer, or `None` when the connection itself is
    /// the failure and nothing can usefully be sent.
    pub fn peer_message(&self) -> Option<&'static str> {
        match self {
            AuthError::Connection(_) => None,
            AuthError::UnknownUser(_) => Some("Authentication failed: User not found"),
            AuthError::NoDepartment(_) => {
                Some("Authentication failed: User not in required groups")
            }
        }
    }
}

/// Authenticated state bound to one live connection. Owned exclusively by
/// the connection's handler; the department never changes once set.
#[derive(Debug, Clone)]
pub struct Session {
    pub peer: SocketAddr,
    pub username: String,
    pub uid: u32,
    pub department: Department,
}

impl Session {
    pub fn success_message(&self) -> String {
        format!("Authentication successful. Department: {}", self.department)
    }
}

/// Run the authentication phase on a fresh connection.
///
/// Reads the identity and credential messages, resolves the identity, and
/// binds the connection to exactly one department: the sole matching group's
/// department, or the first in [`Department::ALL`] priority order when the
/// user belongs to several (a deterministic tie-break, not an error).
pub async fn authenticate<S>(
    stream: &mut S,
    peer: SocketAddr,
    directory: &dyn IdentityProvider,
) -> Result<Session, AuthError>
where
    S: AsyncRead + Unpin,
{
    let username = protocol::timed(
        timeouts::MESSAGE_MS,
        protocol::read_message_string(stream, protocol::USERNAME_MAX),
    )
    .await?;
    let _credential = protocol::timed(
        timeouts::MESSAGE_MS,
        protocol::read_message(stream, protocol::PASSWORD_MAX),
    )
    .await?;

    let user = directory
        .resolve_user(&username)
        .ok_or_else(|| AuthError::UnknownUser(username.clone()))?;

    let groups = directory.group_memberships(&username);
    let department = Department::ALL
        .iter()
        .copied()
        .find(|d| groups.iter().any(|g| g == d.group()))
        .ok_or_else(|| AuthError::NoDepartment(username.clone()))?;

    Ok(Session {
        peer,
        username: user.name,
        uid: user.uid,
        department,
    })
}
