use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;

use super::Connectivity;
use crate::error::{Error, Result};

/// Online state pushed by the host (a network-change callback, a UI toggle).
///
/// Subscribers see every change, which is what the processor's
/// connectivity listener consumes.
#[derive(Debug, Clone)]
pub struct ManualConnectivity {
    sender: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ManualConnectivity {
    async fn is_online(&self) -> bool {
        self.current()
    }
}

/// Treats the API host as reachable when a TCP connection opens in time
#[derive(Debug, Clone)]
pub struct ProbeConnectivity {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ProbeConnectivity {
    pub fn for_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(base_url)
            .map_err(|error| Error::InvalidInput(format!("Invalid API URL '{base_url}': {error}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidInput(format!("API URL '{base_url}' has no host")))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidInput(format!("API URL '{base_url}' has no port")))?;
        Ok(Self {
            host,
            port,
            timeout,
        })
    }
}

impl Connectivity for ProbeConnectivity {
    async fn is_online(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::debug!(host = %self.host, port = self.port, "API host unreachable: {}", error);
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.host, port = self.port, "API host probe timed out");
                false
            }
        }
    }
}
