//! Unix socket server feeding server events into the sync client.
//!
//! Listens on the socket from [`ipc::socket_path`] for newline-delimited JSON
//! events. Lines are dispatched in arrival order per connection; unknown kinds
//! and malformed lines are skipped.

use crate::api::ServerApi;
use crate::client::SyncClient;
use crate::event::Event;
use crate::ipc;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, info, trace, warn};

/// Start the Unix socket server on the default path.
pub async fn start<A: ServerApi + 'static>(client: SyncClient<A>) {
    serve(&ipc::socket_path(), client).await;
}

/// Remove any stale socket file, bind to `path` and accept connections until
/// the task is dropped.
pub async fn serve<A: ServerApi + 'static>(path: &Path, client: SyncClient<A>) {
    // Remove stale socket if it exists
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!("Failed to remove stale socket {}: {}", path.display(), e);
        return;
    }

    let listener = match UnixListener::bind(path) {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind Unix socket {}: {}", path.display(), e);
            return;
        }
    };

    info!("event socket listening on {}", path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let client = client.clone();
                tokio::spawn(async move {
                    let count = feed(BufReader::new(stream), &client).await;
                    debug!(count, "event connection closed");
                });
            }
            Err(e) => {
                warn!("Failed to accept socket connection: {}", e);
            }
        }
    }
}

/// Dispatch every event line from `reader`. Returns how many were applied.
pub async fn feed<R, A>(reader: R, client: &SyncClient<A>) -> usize
where
    R: AsyncBufRead + Unpin,
    A: ServerApi + 'static,
{
    let mut lines = reader.lines();
    let mut applied = 0;
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match Event::parse(&line) {
            Ok(Some(event)) => {
                debug!(kind = event.kind(), "ipc event");
                client.handle_event(event);
                applied += 1;
            }
            Ok(None) => trace!("skipping unhandled event kind (line: {})", line),
            Err(e) => trace!("Failed to parse event: {} (line: {})", e, line),
        }
    }
    applied
}
