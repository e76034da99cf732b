//! Document path builders for the collections the attendance core touches.

/// Top-level studies collection.
pub const STUDIES: &str = "studies";

/// Top-level users collection.
pub const USERS: &str = "users";

pub fn study(study_id: &str) -> String {
    format!("studies/{}", study_id)
}

pub fn member(study_id: &str, user_id: &str) -> String {
    format!("studies/{}/members/{}", study_id, user_id)
}

pub fn meetings(study_id: &str) -> String {
    format!("studies/{}/meetings", study_id)
}

pub fn meeting(study_id: &str, meeting_id: &str) -> String {
    format!("studies/{}/meetings/{}", study_id, meeting_id)
}

pub fn meeting_attendance(study_id: &str, meeting_id: &str, user_id: &str) -> String {
    format!("studies/{}/meetings/{}/attendance/{}", study_id, meeting_id, user_id)
}

pub fn session(study_id: &str, meeting_id: &str) -> String {
    format!("studies/{}/sessions/{}", study_id, meeting_id)
}

pub fn user(user_id: &str) -> String {
    format!("users/{}", user_id)
}
