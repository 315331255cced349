//! Socket options applied to every stream connection

use std::io;
use std::time::Duration;

use contracts::KeepaliveConfig;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

/// Disable Nagle and enable TCP keep-alive so half-open peers get torn down
pub(crate) fn configure_stream(stream: &TcpStream, keepalive: &KeepaliveConfig) -> io::Result<()> {
    stream.set_nodelay(true)?;

    if !keepalive.enabled {
        return Ok(());
    }

    let params = TcpKeepalive::new().with_time(Duration::from_secs(keepalive.idle_secs));
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    let params = params.with_interval(Duration::from_secs(keepalive.interval_secs));
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    let params = params.with_retries(keepalive.count);

    SockRef::from(stream).set_tcp_keepalive(&params)
}
