//! Local event intake socket.
//!
//! Server events are delivered to a running client as newline-delimited JSON
//! on a Unix socket, one `{"type": ..., "properties": ...}` object per line.
//! This module only provides the shared socket path.

use std::path::PathBuf;

/// Default socket path for the client.
pub fn socket_path() -> PathBuf {
    std::env::temp_dir().join("arctic.sock")
}
