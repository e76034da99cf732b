//! Daily study settlement: computes per-participant attendance rates for
//! every study past its end date, credits reward currencies, unlocks
//! badges, and marks the study settled.
//!
//! The job and the attendance commit path are concurrent writers to the
//! same user documents, so every per-user update happens inside one store
//! transaction that reads the current document first.

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use thiserror::Error;

use moim_store::{
    paths, DocumentStore, MeetingAttendanceRecord, StoreError, StudyDocument, UserRewardProfile,
};

mod rewards;
mod scheduler;

pub use rewards::{
    reward_for_rate, BADGE_FIRST_STUDY, BADGE_FIVE_STUDIES, BADGE_PERFECT_ATTENDANCE,
};
pub use scheduler::{ScheduleOptions, SettlementScheduler};

/// エラー型
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// What one settlement run did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementSummary {
    pub studies_settled: usize,
    pub users_credited: usize,
    pub users_skipped: usize,
    pub user_failures: usize,
}

/// The settlement batch job.
#[derive(Clone)]
pub struct SettlementJob {
    store: DocumentStore,
}

impl SettlementJob {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Process every study whose end date is strictly before `now` and
    /// which has not been settled yet.
    ///
    /// Per-user failures are logged and never abort a study's participant
    /// loop; once the loop completes the study is marked settled
    /// regardless. A fatal failure before the mark-settled step leaves the
    /// study eligible for the next run (at-least-once semantics).
    pub async fn run_daily(&self, now: NaiveDate) -> Result<SettlementSummary, SettlementError> {
        let eligible = self
            .store
            .collection(paths::STUDIES)
            .lt("endDate", now.to_string())
            .eq("settlementCompleted", false)
            .execute()
            .await?;
        info!(
            "settlement run for {}: {} eligible studies",
            now,
            eligible.len()
        );

        let mut summary = SettlementSummary::default();
        for (study_id, doc) in eligible {
            let study: StudyDocument = match serde_json::from_value(doc) {
                Ok(study) => study,
                Err(e) => {
                    error!("skipping study {}: unreadable document: {}", study_id, e);
                    continue;
                }
            };
            self.settle_study(&study_id, &study, &mut summary).await?;
        }
        info!("settlement run finished: {:?}", summary);
        Ok(summary)
    }

    async fn settle_study(
        &self,
        study_id: &str,
        study: &StudyDocument,
        summary: &mut SettlementSummary,
    ) -> Result<(), SettlementError> {
        let meetings = self.store.list_collection(&paths::meetings(study_id)).await?;
        let meeting_ids: Vec<String> = meetings.into_iter().map(|(id, _)| id).collect();

        if meeting_ids.is_empty() {
            // No meetings means no basis to compute attendance: settle the
            // study without touching anyone's rewards.
            debug!("study {} has no meetings, settling without rewards", study_id);
            self.mark_settled(study_id).await?;
            summary.studies_settled += 1;
            return Ok(());
        }

        for user_id in &study.participant_ids {
            match self.settle_participant(study_id, user_id, &meeting_ids).await {
                Ok(true) => summary.users_credited += 1,
                Ok(false) => {
                    debug!("user {} has no profile, skipped", user_id);
                    summary.users_skipped += 1;
                }
                Err(e) => {
                    // Isolated: the rest of the study's participants are
                    // still processed and the study is still settled.
                    error!(
                        "settlement for user {} in study {} failed: {}",
                        user_id, study_id, e
                    );
                    summary.user_failures += 1;
                }
            }
        }

        self.mark_settled(study_id).await?;
        summary.studies_settled += 1;
        Ok(())
    }

    /// Credit one participant. Returns `Ok(false)` if the user document
    /// does not exist (skipped silently per contract).
    async fn settle_participant(
        &self,
        study_id: &str,
        user_id: &str,
        meeting_ids: &[String],
    ) -> Result<bool, SettlementError> {
        let mut present = 0usize;
        for meeting_id in meeting_ids {
            let record: Option<MeetingAttendanceRecord> = self
                .store
                .get_as(&paths::meeting_attendance(study_id, meeting_id, user_id))
                .await?;
            if record.map(|r| r.is_present).unwrap_or(false) {
                present += 1;
            }
        }
        let rate = present as f64 / meeting_ids.len() as f64;
        let (ink, pen) = reward_for_rate(rate);
        debug!(
            "user {} in study {}: {}/{} meetings, rate {:.4}, reward ({}, {})",
            user_id,
            study_id,
            present,
            meeting_ids.len(),
            rate,
            ink,
            pen
        );

        let user_path = paths::user(user_id);
        let credited = self
            .store
            .run_transaction(|tx| {
                let mut profile: UserRewardProfile = match tx.get_as(&user_path)? {
                    Some(profile) => profile,
                    None => return Ok(false),
                };
                profile.completed_studies_count += 1;
                if rate >= 1.0 {
                    profile.perfect_attendance_count += 1;
                    profile
                        .earned_badge_ids
                        .insert(BADGE_PERFECT_ATTENDANCE.to_string());
                }
                profile.ink += ink;
                profile.pen += pen;
                if profile.completed_studies_count == 1 {
                    profile.earned_badge_ids.insert(BADGE_FIRST_STUDY.to_string());
                }
                if profile.completed_studies_count == 5 {
                    profile.earned_badge_ids.insert(BADGE_FIVE_STUDIES.to_string());
                }
                tx.set(&user_path, &profile)?;
                Ok(true)
            })
            .await?;
        Ok(credited)
    }

    async fn mark_settled(&self, study_id: &str) -> Result<(), SettlementError> {
        let study_path = paths::study(study_id);
        self.store
            .run_transaction(|tx| {
                let mut study: StudyDocument = match tx.get_as(&study_path)? {
                    Some(study) => study,
                    None => {
                        warn!("study {} disappeared before settling", study_path);
                        return Ok(());
                    }
                };
                study.settlement_completed = true;
                tx.set(&study_path, &study)
            })
            .await?;
        Ok(())
    }
}
