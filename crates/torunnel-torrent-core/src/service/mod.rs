//! Session trait implemented by transfer engine adapters.

use async_trait::async_trait;

use crate::error::{TransferError, TransferResult};
use crate::model::{SessionHandle, TransferDescriptor, TransferStatus};

/// Capability that starts a transfer and reports its status on demand.
///
/// Implementations own the peer-to-peer machinery; callers only observe
/// progress through [`TransferSession::poll`].
#[async_trait]
pub trait TransferSession: Send + Sync {
    /// Begin retrieving the content into the descriptor's destination root.
    async fn begin(&self, descriptor: &TransferDescriptor) -> TransferResult<SessionHandle>;

    /// Fetch a fresh status snapshot for a transfer started by [`Self::begin`].
    async fn poll(&self, handle: &SessionHandle) -> TransferResult<TransferStatus>;

    /// Stop participating in the swarm; default implementation reports lack of support.
    async fn stop(&self, handle: &SessionHandle) -> TransferResult<()> {
        let _ = handle;
        Err(TransferError::Unsupported { operation: "stop" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torunnel_events::LifecycleState;
    use uuid::Uuid;

    struct StubSession;

    #[async_trait]
    impl TransferSession for StubSession {
        async fn begin(&self, _descriptor: &TransferDescriptor) -> TransferResult<SessionHandle> {
            Ok(SessionHandle {
                id: Uuid::nil(),
                reference: "stub".into(),
            })
        }

        async fn poll(&self, _handle: &SessionHandle) -> TransferResult<TransferStatus> {
            Ok(TransferStatus {
                state: LifecycleState::Seeding,
                ..TransferStatus::default()
            })
        }
    }

    #[tokio::test]
    async fn stop_defaults_to_unsupported() {
        let session = StubSession;
        let descriptor = TransferDescriptor::magnet(
            "magnet:?xt=urn:btih:5b635ca35e4d2847a83709033333333333333333",
            "/tmp/dl",
        )
        .expect("valid magnet");
        let handle = session.begin(&descriptor).await.expect("begin");
        let status = session.poll(&handle).await.expect("poll");
        assert!(status.state.is_terminal());
        assert!(matches!(
            session.stop(&handle).await,
            Err(TransferError::Unsupported { operation: "stop" })
        ));
    }
}
