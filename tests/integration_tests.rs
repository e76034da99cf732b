use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moim_rust::Moim;
use moim_store::{paths, CheckinSession, MeetingAttendanceRecord, PresenceRecord, StudyDocument, UserRewardProfile};
use tokio::time::{sleep, timeout};

async fn open_session(moim: &Moim, study_id: &str, meeting_id: &str, code: u32) {
    let _ = pretty_env_logger::try_init();
    moim.store
        .set(
            &paths::session(study_id, meeting_id),
            &CheckinSession { code, open: true },
        )
        .await
        .unwrap();
}

/// Poll until the member's presence record appears, or give up.
async fn wait_for_presence(moim: &Moim, study_id: &str, user_id: &str) -> PresenceRecord {
    timeout(Duration::from_secs(3), async {
        loop {
            if let Some(record) = moim
                .store
                .get_as::<PresenceRecord>(&paths::member(study_id, user_id))
                .await
                .unwrap()
            {
                return record;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("presence record should have been committed")
}

/// One full proximity check-in: the host listens, a nearby client sends its
/// identity triple, and the member's presence record lands in the store.
#[tokio::test]
async fn proximity_check_in_end_to_end() {
    let moim = Moim::new();
    open_session(&moim, "S1", "M1", 4217).await;

    let host = moim.proximity_host();
    host.start("127.0.0.1:0".parse().unwrap(), Arc::new(moim.attendance()))
        .await
        .unwrap();

    moim.proximity_client()
        .send("S1", "M1", "U1")
        .await
        .unwrap();

    let record = wait_for_presence(&moim, "S1", "U1").await;
    assert!(record.is_present);
    assert_eq!(record.current_count, 1);
    assert_eq!(record.total_count, 1);

    host.stop().await;
}

#[tokio::test]
async fn back_to_back_check_ins_both_commit() {
    let moim = Moim::new();
    open_session(&moim, "S1", "M1", 4217).await;

    let host = moim.proximity_host();
    host.start("127.0.0.1:0".parse().unwrap(), Arc::new(moim.attendance()))
        .await
        .unwrap();

    let client = moim.proximity_client();
    client.send("S1", "M1", "U1").await.unwrap();
    client.send("S1", "M1", "U2").await.unwrap();

    let u1 = wait_for_presence(&moim, "S1", "U1").await;
    let u2 = wait_for_presence(&moim, "S1", "U2").await;
    assert!(u1.is_present);
    assert!(u2.is_present);

    host.stop().await;
}

#[tokio::test]
async fn resent_assertion_never_double_counts() {
    let moim = Moim::new();
    open_session(&moim, "S1", "M1", 4217).await;

    let host = moim.proximity_host();
    host.start("127.0.0.1:0".parse().unwrap(), Arc::new(moim.attendance()))
        .await
        .unwrap();

    let client = moim.proximity_client();
    client.send("S1", "M1", "U1").await.unwrap();
    wait_for_presence(&moim, "S1", "U1").await;
    client.send("S1", "M1", "U1").await.unwrap();

    // Give the second exchange time to be (not) applied.
    sleep(Duration::from_millis(100)).await;
    let record = wait_for_presence(&moim, "S1", "U1").await;
    assert_eq!(record.current_count, 1);
    assert_eq!(record.total_count, 1);

    host.stop().await;
}

#[tokio::test]
async fn check_in_without_open_session_commits_nothing() {
    let moim = Moim::new();

    let host = moim.proximity_host();
    host.start("127.0.0.1:0".parse().unwrap(), Arc::new(moim.attendance()))
        .await
        .unwrap();

    moim.proximity_client()
        .send("S1", "M1", "U1")
        .await
        .unwrap();

    sleep(Duration::from_millis(100)).await;
    assert!(moim
        .store
        .get(&paths::member("S1", "U1"))
        .await
        .unwrap()
        .is_none());

    host.stop().await;
}

/// Check-in during the study, then the daily settlement after it ends.
#[tokio::test]
async fn check_in_then_daily_settlement() {
    let moim = Moim::new();
    let end_date: NaiveDate = "2025-05-31".parse().unwrap();
    moim.store
        .set(
            &paths::study("S1"),
            &StudyDocument {
                end_date,
                settlement_completed: false,
                participant_ids: ["U1".to_string()].into(),
            },
        )
        .await
        .unwrap();
    moim.store
        .set(&paths::meeting("S1", "M1"), &serde_json::json!({}))
        .await
        .unwrap();
    moim.store
        .set(&paths::user("U1"), &UserRewardProfile::default())
        .await
        .unwrap();
    open_session(&moim, "S1", "M1", 4217).await;

    let host = moim.proximity_host();
    host.start("127.0.0.1:0".parse().unwrap(), Arc::new(moim.attendance()))
        .await
        .unwrap();
    moim.proximity_client()
        .send("S1", "M1", "U1")
        .await
        .unwrap();
    wait_for_presence(&moim, "S1", "U1").await;
    host.stop().await;

    // The meeting-level mark is written when the meeting closes.
    moim.store
        .set(
            &paths::meeting_attendance("S1", "M1", "U1"),
            &MeetingAttendanceRecord { is_present: true },
        )
        .await
        .unwrap();

    let summary = moim
        .settlement()
        .run_daily("2025-06-01".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(summary.studies_settled, 1);
    assert_eq!(summary.users_credited, 1);

    let profile: UserRewardProfile = moim
        .store
        .get_as(&paths::user("U1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.ink, 10);
    assert_eq!(profile.pen, 2);
    assert_eq!(profile.completed_studies_count, 1);
}
