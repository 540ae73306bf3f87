/// Connectivity probe used to retry queued sends when the network comes back

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// True when a TCP connection to `host:port` opens within the timeout
pub async fn is_reachable(addr: String) -> bool {
    match timeout(PROBE_TIMEOUT, TcpStream::connect(addr.as_str())).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Probe of {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("Probe of {} timed out", addr);
            false
        }
    }
}

/// Tracks online/offline across probes and reports the offline -> online edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    online: Option<bool>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}

impl Connectivity {
    pub fn new() -> Self {
        Self { online: None }
    }

    pub fn is_online(&self) -> Option<bool> {
        self.online
    }

    /// Record a probe result. Returns true when this probe brought us back online.
    /// The very first probe only sets the baseline.
    pub fn observe(&mut self, online: bool) -> bool {
        let came_back = self.online == Some(false) && online;
        self.online = Some(online);
        came_back
    }
}
