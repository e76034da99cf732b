use async_trait::async_trait;
use moim_protocol::AttendanceAssertion;

/// Where decoded assertions go: the seam between the transport host and the
/// attendance commit path.
///
/// The protocol is fire-and-forget, so a sink failure is logged by the host
/// and never answered back to the client.
#[async_trait]
pub trait AssertionSink: Send + Sync {
    async fn dispatch(&self, assertion: AttendanceAssertion) -> anyhow::Result<()>;
}
