use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moim_protocol::AttendanceAssertion;
use moim_proximity::{
    AlwaysOnRadio, AssertionSink, ClientOptions, HostOptions, HostState, PairedRegistry,
    ProximityClient, RadioAdapter, TransportError, TransportHost,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn host(registry: &PairedRegistry) -> TransportHost {
    let _ = pretty_env_logger::try_init();
    TransportHost::new(
        registry.clone(),
        Arc::new(AlwaysOnRadio),
        HostOptions::default().with_read_timeout(Duration::from_secs(2)),
    )
}

fn client(registry: &PairedRegistry) -> ProximityClient {
    ProximityClient::new(
        registry.clone(),
        Arc::new(AlwaysOnRadio),
        ClientOptions::default().with_connect_timeout(Duration::from_secs(2)),
    )
}

#[derive(Default)]
struct CollectingSink {
    seen: Mutex<Vec<AttendanceAssertion>>,
}

#[async_trait]
impl AssertionSink for CollectingSink {
    async fn dispatch(&self, assertion: AttendanceAssertion) -> anyhow::Result<()> {
        self.seen.lock().await.push(assertion);
        Ok(())
    }
}

async fn wait_for_count(sink: &CollectingSink, expected: usize) {
    timeout(Duration::from_secs(2), async {
        loop {
            if sink.seen.lock().await.len() >= expected {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for dispatched assertions");
}

#[tokio::test]
async fn host_receives_one_assertion() {
    let registry = PairedRegistry::new();
    let host = host(&registry);
    let sink = Arc::new(CollectingSink::default());

    host.start(loopback(), sink.clone()).await.unwrap();
    assert_eq!(host.state().await, HostState::Listening);

    client(&registry).send("S1", "M1", "U1").await.unwrap();
    wait_for_count(&sink, 1).await;

    let seen = sink.seen.lock().await;
    assert_eq!(seen[0], AttendanceAssertion::new("S1", "M1", "U1"));
    drop(seen);

    host.stop().await;
    assert_eq!(host.state().await, HostState::Stopped);
}

#[tokio::test]
async fn state_changes_are_broadcast() {
    let registry = PairedRegistry::new();
    let host = host(&registry);
    let mut state_rx = host.on_state_change();
    assert_eq!(host.state().await, HostState::Unbound);

    host.start(loopback(), Arc::new(CollectingSink::default()))
        .await
        .unwrap();
    assert_eq!(state_rx.recv().await.unwrap(), HostState::Listening);

    host.stop().await;
    assert_eq!(state_rx.recv().await.unwrap(), HostState::Stopped);
}

struct OverlapSink {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    dispatched: AtomicUsize,
}

impl OverlapSink {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            dispatched: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssertionSink for OverlapSink {
    async fn dispatch(&self, _assertion: AttendanceAssertion) -> anyhow::Result<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        sleep(Duration::from_millis(100)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn accept_loop_is_strictly_sequential() {
    let registry = PairedRegistry::new();
    let host = host(&registry);
    let sink = Arc::new(OverlapSink::new());

    host.start(loopback(), sink.clone()).await.unwrap();

    // Two clients connect back-to-back; each exchange must be fully
    // processed before the next is accepted.
    let a = client(&registry);
    let b = client(&registry);
    let (ra, rb) = tokio::join!(a.send("S1", "M1", "U1"), b.send("S1", "M1", "U2"));
    ra.unwrap();
    rb.unwrap();

    timeout(Duration::from_secs(2), async {
        while sink.dispatched.load(Ordering::SeqCst) < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both exchanges should be dispatched");

    assert_eq!(sink.max_in_flight.load(Ordering::SeqCst), 1);
    host.stop().await;
}

#[tokio::test]
async fn oversized_payload_is_dropped_and_loop_continues() {
    let registry = PairedRegistry::new();
    let host = host(&registry);
    let sink = Arc::new(CollectingSink::default());
    let addr = host.start(loopback(), sink.clone()).await.unwrap();

    // 5000 bytes with no terminator: over the 4 KiB line cap.
    let mut raw = TcpStream::connect(addr).await.unwrap();
    raw.write_all(&vec![b'a'; 5000]).await.unwrap();
    raw.shutdown().await.unwrap();
    drop(raw);

    // The host must still be listening and serve the next client.
    client(&registry).send("S1", "M1", "U1").await.unwrap();
    wait_for_count(&sink, 1).await;
    assert_eq!(sink.seen.lock().await.len(), 1);

    host.stop().await;
}

#[tokio::test]
async fn malformed_payload_is_dropped_and_loop_continues() {
    let registry = PairedRegistry::new();
    let host = host(&registry);
    let sink = Arc::new(CollectingSink::default());
    let addr = host.start(loopback(), sink.clone()).await.unwrap();

    let mut raw = TcpStream::connect(addr).await.unwrap();
    raw.write_all(b"not json\n").await.unwrap();
    raw.shutdown().await.unwrap();
    drop(raw);

    client(&registry).send("S1", "M1", "U1").await.unwrap();
    wait_for_count(&sink, 1).await;
    assert_eq!(sink.seen.lock().await.len(), 1);

    host.stop().await;
}

#[tokio::test]
async fn stop_unblocks_pending_accept_and_is_idempotent() {
    let registry = PairedRegistry::new();
    let host = host(&registry);
    host.start(loopback(), Arc::new(CollectingSink::default()))
        .await
        .unwrap();

    // No client ever connects; stop must still return promptly.
    timeout(Duration::from_secs(1), host.stop())
        .await
        .expect("stop should unblock the pending accept");
    assert_eq!(host.state().await, HostState::Stopped);

    // Second stop is a no-op.
    timeout(Duration::from_secs(1), host.stop()).await.unwrap();

    // The endpoint was released, so discovery now fails.
    let err = client(&registry).send("S1", "M1", "U1").await.unwrap_err();
    assert!(matches!(err, TransportError::HostNotFound));
}

#[tokio::test]
async fn host_can_be_restarted_after_stop() {
    let registry = PairedRegistry::new();
    let host = host(&registry);
    let sink = Arc::new(CollectingSink::default());

    host.start(loopback(), sink.clone()).await.unwrap();
    host.stop().await;

    host.start(loopback(), sink.clone()).await.unwrap();
    client(&registry).send("S2", "M2", "U2").await.unwrap();
    wait_for_count(&sink, 1).await;

    host.stop().await;
}

struct DisabledRadio;

impl RadioAdapter for DisabledRadio {
    fn is_enabled(&self) -> bool {
        false
    }

    fn is_connect_permitted(&self) -> bool {
        true
    }
}

struct UnpermittedRadio;

impl RadioAdapter for UnpermittedRadio {
    fn is_enabled(&self) -> bool {
        true
    }

    fn is_connect_permitted(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn radio_and_permission_failures_are_distinct() {
    let registry = PairedRegistry::new();

    let host = TransportHost::new(
        registry.clone(),
        Arc::new(DisabledRadio),
        HostOptions::default(),
    );
    let err = host
        .start(loopback(), Arc::new(CollectingSink::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::RadioDisabled));

    let client = ProximityClient::new(
        registry.clone(),
        Arc::new(UnpermittedRadio),
        ClientOptions::default(),
    );
    let err = client.send("S1", "M1", "U1").await.unwrap_err();
    assert!(matches!(err, TransportError::PermissionDenied));
}

#[tokio::test]
async fn discovery_fails_without_a_matching_host() {
    let registry = PairedRegistry::new();
    let err = client(&registry).send("S1", "M1", "U1").await.unwrap_err();
    assert!(matches!(err, TransportError::HostNotFound));
}
