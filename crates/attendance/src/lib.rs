//! Attendance commit path: turns a validated assertion into a presence
//! update against the shared store.
//!
//! The host consults an independently-established check-in session for the
//! asserted (study, meeting) before mutating anything; the client's bare
//! identity triple is all that travels on the wire. The presence update is
//! idempotent: re-sending the same assertion never double-counts.

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;

use moim_protocol::AttendanceAssertion;
use moim_proximity::AssertionSink;
use moim_store::{paths, CheckinSession, DocumentStore, PresenceRecord, StoreError};

/// エラー型
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Why an assertion was rejected without any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No open check-in session exists for the asserted study/meeting.
    CodeMismatch,
}

/// Outcome of one commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// Presence was recorded and both counters advanced by one.
    Committed,
    /// The member was already marked present; nothing changed.
    AlreadyPresent,
    /// The assertion was rejected; nothing changed.
    Rejected(RejectReason),
}

/// Commits validated assertions to the member's presence record.
#[derive(Clone)]
pub struct AttendanceCommit {
    store: DocumentStore,
}

impl AttendanceCommit {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Validate and commit one assertion.
    ///
    /// On a valid open session, one store transaction marks the member
    /// present and advances `currentCount`/`totalCount` — unless the member
    /// is already present, in which case the counters are left untouched.
    /// Store write conflicts are absorbed by the store's own transaction
    /// retry and never surface here.
    pub async fn commit(
        &self,
        assertion: &AttendanceAssertion,
    ) -> Result<CommitResult, AttendanceError> {
        let session_path = paths::session(&assertion.study_id, &assertion.meeting_id);
        let session: Option<CheckinSession> = self.store.get_as(&session_path).await?;
        match session {
            Some(session) if session.open => {}
            _ => return Ok(CommitResult::Rejected(RejectReason::CodeMismatch)),
        }

        let member_path = paths::member(&assertion.study_id, &assertion.user_id);
        let outcome = self
            .store
            .run_transaction(|tx| {
                let mut record: PresenceRecord =
                    tx.get_as(&member_path)?.unwrap_or_default();
                if record.is_present {
                    return Ok(CommitResult::AlreadyPresent);
                }
                record.is_present = true;
                record.current_count += 1;
                record.total_count += 1;
                tx.set(&member_path, &record)?;
                Ok(CommitResult::Committed)
            })
            .await?;
        Ok(outcome)
    }
}

#[async_trait]
impl AssertionSink for AttendanceCommit {
    async fn dispatch(&self, assertion: AttendanceAssertion) -> anyhow::Result<()> {
        match self.commit(&assertion).await? {
            CommitResult::Committed => info!(
                "attendance committed: study={} meeting={} user={}",
                assertion.study_id, assertion.meeting_id, assertion.user_id
            ),
            CommitResult::AlreadyPresent => info!(
                "attendance already recorded: study={} user={}",
                assertion.study_id, assertion.user_id
            ),
            CommitResult::Rejected(reason) => warn!(
                "attendance rejected ({:?}): study={} meeting={} user={}",
                reason, assertion.study_id, assertion.meeting_id, assertion.user_id
            ),
        }
        Ok(())
    }
}
