//! Accept loop and per-connection handling.
//!
//! The accept loop is single-task and never blocks on a worker: every
//! accepted socket gets its own spawned task that runs authentication, then
//! the file-receive phase, then closes. A connection's failure is handled
//! entirely inside its own handler and never terminates the server. The
//! handler is also the single place that writes responses to the peer, so
//! every terminal outcome produces at most one response line, best-effort.

use crate::auth;
use crate::identity::IdentityProvider;
use crate::log::{TransferLog, TransferLogEntry, TransferStatus};
use crate::logger::Logger;
use crate::protocol::{self, timeouts};
use crate::store::Depot;
use crate::transfer::{self, TransferError};
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpSocket, TcpStream};

/// Soft cap on simultaneously pending accepts.
const LISTEN_BACKLOG: u32 = 64;

/// Bind and serve until the task is dropped or the listener dies.
pub async fn serve(
    bind: &str,
    root: &Path,
    directory: Arc<dyn IdentityProvider>,
    logger: Arc<dyn Logger>,
) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("parse bind address {bind}"))?;
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr).with_context(|| format!("bind {bind}"))?;
    let listener = socket.listen(LISTEN_BACKLOG)?;
    eprintln!("depotd listening on {} root={}", bind, root.display());

    let depot = Arc::new(Depot::new(root));
    let translog = Arc::new(TransferLog::new(root));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                logger.warn("accept", &e.to_string());
                continue;
            }
        };
        let _ = stream.set_nodelay(true);
        let depot = depot.clone();
        let directory = directory.clone();
        let logger = logger.clone();
        let translog = translog.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, depot, directory, logger, translog).await;
        });
    }
}

/// One connection end-to-end: authenticate, receive, notify, close.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    depot: Arc<Depot>,
    directory: Arc<dyn IdentityProvider>,
    logger: Arc<dyn Logger>,
    translog: Arc<TransferLog>,
) {
    logger.connected(peer);

    let session = match auth::authenticate(&mut stream, peer, directory.as_ref()).await {
        Ok(session) => session,
        Err(e) => {
            if let Some(msg) = e.peer_message() {
                let _ = send_response(&mut stream, msg).await;
            }
            logger.auth_failed(peer, &e.to_string());
            logger.disconnected(peer);
            return;
        }
    };
    logger.auth_ok(peer, &session.username, session.department.name());
    if send_response(&mut stream, &session.success_message())
        .await
        .is_err()
    {
        logger.disconnected(peer);
        return;
    }

    let mut entry = TransferLogEntry::now(peer.to_string(), session.username.clone());
    entry.department = Some(session.department);
    match transfer::receive(&mut stream, &session, &depot).await {
        Ok(result) => {
            if let Some(warning) = &result.ownership_warning {
                logger.warn("ownership", warning);
            }
            let _ = send_response(&mut stream, &result.success_message()).await;
            logger.transfer_done(
                peer,
                &session.username,
                &result.file_name,
                result.department.name(),
                result.bytes,
            );
            entry.file_name = Some(result.file_name);
            entry.bytes = result.bytes;
            entry.status = TransferStatus::Completed;
        }
        Err(e) => {
            if let Some(msg) = e.peer_message() {
                let _ = send_response(&mut stream, &msg).await;
            }
            logger.transfer_failed(peer, &session.username, &e.to_string());
            entry.status = match e {
                TransferError::AccessDenied { .. } => TransferStatus::Denied,
                _ => TransferStatus::Failed,
            };
            entry.error = Some(e.to_string());
        }
    }
    if let Err(e) = translog.add_entry(entry) {
        logger.warn("transfer log", &e.to_string());
    }
    logger.disconnected(peer);
}

async fn send_response(stream: &mut TcpStream, msg: &str) -> io::Result<()> {
    protocol::timed(
        timeouts::WRITE_MS,
        protocol::write_message(stream, msg.as_bytes()),
    )
    .await
}
