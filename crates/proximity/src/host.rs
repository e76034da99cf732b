use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use moim_protocol::{MAX_LINE_BYTES, SERVICE_NAME, SERVICE_UUID};

use crate::error::TransportError;
use crate::radio::RadioAdapter;
use crate::registry::{PairedEndpoint, PairedRegistry};
use crate::sink::AssertionSink;

/// ホスト状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Unbound,
    Listening,
    Stopped,
}

/// TransportHost設定オプション
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Name the host advertises for discovery filtering.
    pub service_name: String,
    /// Per-connection read deadline so one misbehaving client cannot stall
    /// the sequential accept loop indefinitely.
    pub read_timeout: Duration,
    /// Hard cap on one wire line, terminator included.
    pub max_line_bytes: usize,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            read_timeout: Duration::from_secs(10),
            max_line_bytes: MAX_LINE_BYTES,
        }
    }
}

impl HostOptions {
    pub fn with_service_name(mut self, value: &str) -> Self {
        self.service_name = value.to_string();
        self
    }

    pub fn with_read_timeout(mut self, value: Duration) -> Self {
        self.read_timeout = value;
        self
    }
}

/// Listening side of the proximity exchange.
///
/// States: `Unbound -> Listening -> Stopped`, with a per-connection
/// accept/read/dispatch/close cycle while listening. The accept loop is
/// strictly sequential by design: a new connection is not accepted until
/// the previous one has been fully read, dispatched, and closed. The loop
/// runs in one supervised task whose lifetime is tied to this host; there
/// is no detached per-connection task to outlive a `stop()`.
pub struct TransportHost {
    registry: PairedRegistry,
    radio: Arc<dyn RadioAdapter>,
    options: HostOptions,
    state: Arc<RwLock<HostState>>,
    state_change: broadcast::Sender<HostState>,
    // Replaced with a fresh Notify on every start so a stale stop permit
    // cannot leak into a restarted accept loop.
    shutdown: Mutex<Arc<Notify>>,
    task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Arc<RwLock<Option<SocketAddr>>>,
}

impl TransportHost {
    pub fn new(registry: PairedRegistry, radio: Arc<dyn RadioAdapter>, options: HostOptions) -> Self {
        let (state_change_tx, _) = broadcast::channel(16);
        Self {
            registry,
            radio,
            options,
            state: Arc::new(RwLock::new(HostState::Unbound)),
            state_change: state_change_tx,
            shutdown: Mutex::new(Arc::new(Notify::new())),
            task: Mutex::new(None),
            local_addr: Arc::new(RwLock::new(None)),
        }
    }

    /// 現在の状態を取得
    pub async fn state(&self) -> HostState {
        *self.state.read().await
    }

    /// 状態変更の通知を受け取るためのレシーバーを取得
    pub fn on_state_change(&self) -> broadcast::Receiver<HostState> {
        self.state_change.subscribe()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    /// Bind the service endpoint and enter `Listening`.
    ///
    /// Fails with `RadioDisabled`/`PermissionDenied` before touching the
    /// network, and with `TransportUnavailable` if the platform refuses the
    /// bind; a bind-time failure leaves the host `Stopped` without ever
    /// entering `Listening`.
    pub async fn start(
        &self,
        bind_addr: SocketAddr,
        sink: Arc<dyn AssertionSink>,
    ) -> Result<SocketAddr, TransportError> {
        if *self.state.read().await == HostState::Listening {
            return Err(TransportError::TransportUnavailable(
                "host is already listening".to_string(),
            ));
        }
        if !self.radio.is_enabled() {
            return Err(TransportError::RadioDisabled);
        }
        if !self.radio.is_connect_permitted() {
            return Err(TransportError::PermissionDenied);
        }

        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                Self::set_state_internal(
                    self.state.clone(),
                    self.state_change.clone(),
                    HostState::Stopped,
                )
                .await;
                return Err(TransportError::TransportUnavailable(format!(
                    "bind failed: {}",
                    e
                )));
            }
        };
        let addr = listener
            .local_addr()
            .map_err(|e| TransportError::TransportUnavailable(e.to_string()))?;

        self.registry
            .register(PairedEndpoint {
                name: self.options.service_name.clone(),
                service_uuid: SERVICE_UUID,
                addr,
            })
            .await;
        *self.local_addr.write().await = Some(addr);

        let shutdown = Arc::new(Notify::new());
        *self.shutdown.lock().await = shutdown.clone();

        Self::set_state_internal(
            self.state.clone(),
            self.state_change.clone(),
            HostState::Listening,
        )
        .await;
        info!(
            "proximity host listening on {} as '{}'",
            addr, self.options.service_name
        );

        let state_arc = self.state.clone();
        let state_change_tx = self.state_change.clone();
        let options = self.options.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        debug!("accept loop: stop requested");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            trace!("accepted connection from {}", peer);
                            // Awaited inline: the next accept happens only
                            // after this exchange is fully finished.
                            handle_exchange(stream, peer, &*sink, &options).await;
                        }
                        Err(e) => warn!("accept failed: {}", e),
                    }
                }
            }
            Self::set_state_internal(state_arc, state_change_tx, HostState::Stopped).await;
            debug!("accept loop exited");
        });
        *self.task.lock().await = Some(handle);

        Ok(addr)
    }

    /// Stop listening and release the endpoint. Idempotent.
    ///
    /// Unblocks a pending accept; an already accepted in-flight exchange is
    /// allowed to finish before the loop task exits.
    pub async fn stop(&self) {
        self.shutdown.lock().await.notify_one();
        if let Some(handle) = self.task.lock().await.take() {
            if handle.await.is_err() {
                warn!("accept loop task panicked");
            }
        }
        if let Some(addr) = self.local_addr.write().await.take() {
            self.registry.deregister(addr).await;
            info!("proximity host on {} stopped", addr);
        }
        Self::set_state_internal(
            self.state.clone(),
            self.state_change.clone(),
            HostState::Stopped,
        )
        .await;
    }

    async fn set_state_internal(
        state: Arc<RwLock<HostState>>,
        state_change_tx: broadcast::Sender<HostState>,
        next: HostState,
    ) {
        let mut current = state.write().await;
        if *current != next {
            debug!("host state changing from {:?} to {:?}", *current, next);
            *current = next;
            // Ignore send error if no receivers are listening.
            let _ = state_change_tx.send(next);
        }
    }
}

/// One full exchange: read one bounded line, decode, dispatch.
///
/// The socket is scoped to this call, so every return path closes it. Any
/// failure here is terminal for this exchange only; the accept loop keeps
/// listening.
async fn handle_exchange(
    stream: TcpStream,
    peer: SocketAddr,
    sink: &dyn AssertionSink,
    options: &HostOptions,
) {
    let mut reader = BufReader::new(stream).take(options.max_line_bytes as u64 + 1);
    let mut line = String::new();

    let read = timeout(options.read_timeout, reader.read_line(&mut line)).await;
    let n = match read {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            warn!("read from {} failed: {}", peer, e);
            return;
        }
        Err(_) => {
            warn!("read from {} timed out", peer);
            return;
        }
    };
    if n == 0 {
        debug!("{} closed without sending a line", peer);
        return;
    }
    if n > options.max_line_bytes {
        warn!(
            "dropping exchange from {}: {}",
            peer,
            TransportError::PayloadTooLarge
        );
        return;
    }

    let assertion = match moim_protocol::decode(&line) {
        Ok(assertion) => assertion,
        Err(e) => {
            // No response goes back: the protocol is one-directional.
            warn!("dropping exchange from {}: {}", peer, e);
            return;
        }
    };

    debug!(
        "dispatching assertion from {}: study={} meeting={} user={}",
        peer, assertion.study_id, assertion.meeting_id, assertion.user_id
    );
    if let Err(e) = sink.dispatch(assertion).await {
        error!("dispatch failed for {}: {:#}", peer, e);
    }
}
