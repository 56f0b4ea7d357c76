//! One-shot reachability probe.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tokio::{net::TcpStream, time::timeout};

use crate::repository::Reachability;

/// Opens a single TCP connection to the project host and drops it.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Probe the host of `url`, using the scheme's default port when none is given.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_string();
        let port = parsed.port_or_known_default()?;
        Some(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl Reachability for TcpProbe {
    async fn is_network_reachable(&self) -> bool {
        let addr = (self.host.as_str(), self.port);
        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::info!("probe {}:{} failed: {e}", self.host, self.port);
                false
            }
            Err(_) => {
                tracing::info!("probe {}:{} timed out", self.host, self.port);
                false
            }
        }
    }
}
