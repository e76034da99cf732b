use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::SettlementJob;

/// スケジューラ設定オプション
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    /// UTC time of day at which the daily run fires.
    pub run_at: NaiveTime,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            run_at: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
        }
    }
}

impl ScheduleOptions {
    pub fn with_run_at(mut self, value: NaiveTime) -> Self {
        self.run_at = value;
        self
    }
}

/// Fires [`SettlementJob::run_daily`] once per calendar day.
///
/// The job task is supervised: it is spawned by `start()` and cancelled by
/// `stop()`, which also unblocks a sleeping tick. A last-run-date guard
/// keeps the job to at most one run per day even if the timer fires twice.
pub struct SettlementScheduler {
    job: Arc<SettlementJob>,
    options: ScheduleOptions,
    // Fresh Notify per start, as in the transport host.
    shutdown: Mutex<Arc<Notify>>,
    task: Mutex<Option<JoinHandle<()>>>,
    last_run: Arc<Mutex<Option<NaiveDate>>>,
}

impl SettlementScheduler {
    pub fn new(job: SettlementJob, options: ScheduleOptions) -> Self {
        Self {
            job: Arc::new(job),
            options,
            shutdown: Mutex::new(Arc::new(Notify::new())),
            task: Mutex::new(None),
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the daily loop. Restartable after `stop()`.
    pub async fn start(&self) {
        let shutdown = Arc::new(Notify::new());
        *self.shutdown.lock().await = shutdown.clone();

        let job = self.job.clone();
        let run_at = self.options.run_at;
        let last_run = self.last_run.clone();

        let handle = tokio::spawn(async move {
            loop {
                let wait = duration_until(Utc::now(), run_at);
                debug!("next settlement run in {:?}", wait);
                tokio::select! {
                    _ = shutdown.notified() => {
                        debug!("settlement scheduler: stop requested");
                        break;
                    }
                    _ = sleep(wait) => {
                        let today = Utc::now().date_naive();
                        {
                            let mut guard = last_run.lock().await;
                            if *guard == Some(today) {
                                debug!("settlement already ran on {}, skipping", today);
                                continue;
                            }
                            *guard = Some(today);
                        }
                        info!("starting daily settlement for {}", today);
                        match job.run_daily(today).await {
                            Ok(summary) => info!("daily settlement finished: {:?}", summary),
                            Err(e) => error!("daily settlement failed: {}", e),
                        }
                    }
                }
            }
        });
        *self.task.lock().await = Some(handle);
    }

    /// Stop the loop. Idempotent; unblocks a sleeping tick.
    pub async fn stop(&self) {
        self.shutdown.lock().await.notify_one();
        if let Some(handle) = self.task.lock().await.take() {
            if handle.await.is_err() {
                warn!("settlement scheduler task panicked");
            }
        }
    }
}

/// Time until the next occurrence of `run_at`, strictly in the future.
fn duration_until(now: DateTime<Utc>, run_at: NaiveTime) -> Duration {
    let mut next = now.date_naive().and_time(run_at).and_utc();
    if next <= now {
        next = next + chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
