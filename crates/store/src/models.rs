//! Typed views of the documents the attendance core reads and writes.
//!
//! Field names serialize in camelCase to match the app's existing documents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-(study, member) running attendance tally.
///
/// Created implicitly with defaults the first time a member document is
/// read. Invariant: `current_count <= total_count`. Mutated only inside the
/// attendance commit transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceRecord {
    pub is_present: bool,
    pub current_count: u64,
    pub total_count: u64,
}

/// Per-(meeting, member) attendance mark, read by the settlement job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingAttendanceRecord {
    pub is_present: bool,
}

/// Per-study settlement state. `settlement_completed` transitions
/// `false -> true` exactly once; a settled study is never reprocessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyDocument {
    pub end_date: NaiveDate,
    #[serde(default)]
    pub settlement_completed: bool,
    #[serde(default)]
    pub participant_ids: BTreeSet<String>,
}

/// Per-user reward balances and badge set.
///
/// Written concurrently by the attendance commit path and the settlement
/// job; all mutations must go through a store transaction. Badge insertion
/// is idempotent by construction (set semantics).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRewardProfile {
    pub ink: i64,
    pub pen: i64,
    pub completed_studies_count: u64,
    pub perfect_attendance_count: u64,
    pub earned_badge_ids: BTreeSet<String>,
}

/// The independently-established check-in session the host consults before
/// committing an assertion. The numeric code belongs to the out-of-band
/// entry flow; it never travels over the proximity socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinSession {
    pub code: u32,
    pub open: bool,
}
