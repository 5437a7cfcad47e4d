//! Ephemeral port allocation.

use std::io;
use std::net::TcpListener;

/// Return a port that was free at the moment of the call.
///
/// The listener is dropped before returning, so another process may take the
/// port before the cluster binds it.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
