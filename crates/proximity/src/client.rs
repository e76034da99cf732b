use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use moim_protocol::{AttendanceAssertion, SERVICE_NAME, SERVICE_UUID};

use crate::error::TransportError;
use crate::radio::RadioAdapter;
use crate::registry::PairedRegistry;

/// クライアント設定オプション
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Name filter matched against paired endpoints during discovery.
    pub service_name: String,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    pub fn with_service_name(mut self, value: &str) -> Self {
        self.service_name = value.to_string();
        self
    }

    pub fn with_connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    pub fn with_write_timeout(mut self, value: Duration) -> Self {
        self.write_timeout = value;
        self
    }
}

/// Sending side of the proximity exchange.
///
/// `send` is one blocking round: discover a paired host, connect, write one
/// line, close. There is deliberately no retry here; a caller wanting retry
/// must loop externally.
pub struct ProximityClient {
    registry: PairedRegistry,
    radio: Arc<dyn RadioAdapter>,
    options: ClientOptions,
}

impl ProximityClient {
    pub fn new(registry: PairedRegistry, radio: Arc<dyn RadioAdapter>, options: ClientOptions) -> Self {
        Self {
            registry,
            radio,
            options,
        }
    }

    /// Send one attendance assertion to the discovered host.
    ///
    /// Fails fast with `RadioDisabled`/`PermissionDenied` before discovery,
    /// `HostNotFound` when no paired endpoint matches, and
    /// `ConnectionFailed` for connect/write problems. The socket is closed
    /// on every exit path.
    pub async fn send(
        &self,
        study_id: &str,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<(), TransportError> {
        if !self.radio.is_enabled() {
            return Err(TransportError::RadioDisabled);
        }
        if !self.radio.is_connect_permitted() {
            return Err(TransportError::PermissionDenied);
        }

        debug!(
            "discovering paired endpoint matching '{}'",
            self.options.service_name
        );
        let endpoint = self
            .registry
            .find_service(&self.options.service_name, SERVICE_UUID)
            .await
            .ok_or(TransportError::HostNotFound)?;

        info!("sending check-in to '{}' at {}", endpoint.name, endpoint.addr);
        let mut stream = timeout(self.options.connect_timeout, TcpStream::connect(endpoint.addr))
            .await
            .map_err(|_| TransportError::ConnectionFailed("connect timed out".to_string()))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let assertion = AttendanceAssertion::new(study_id, meeting_id, user_id);
        let mut line = moim_protocol::encode(&assertion)?;
        line.push('\n');

        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        timeout(self.options.write_timeout, write)
            .await
            .map_err(|_| TransportError::ConnectionFailed("write timed out".to_string()))?
            .map_err(|e: std::io::Error| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("check-in line sent, socket closed");
        Ok(())
    }
}
