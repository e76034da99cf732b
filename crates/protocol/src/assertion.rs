use serde::{Deserialize, Serialize};

/// The unsigned claim of presence a client device sends to the host.
///
/// Transient by design: it exists only for the duration of one socket
/// exchange and carries no identity beyond the three ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceAssertion {
    pub study_id: String,
    pub meeting_id: String,
    pub user_id: String,
}

impl AttendanceAssertion {
    pub fn new(
        study_id: impl Into<String>,
        meeting_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            study_id: study_id.into(),
            meeting_id: meeting_id.into(),
            user_id: user_id.into(),
        }
    }
}
