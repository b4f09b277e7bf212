//! Explicit job scheduler.
//!
//! `main` registers each [`Job`] with a [`Schedule`] and calls
//! [`Scheduler::start`]. Every job gets its own timer task; each run is
//! executed on a blocking thread and guarded so that a run is skipped while
//! the previous one is still active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::jobs::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed period. With `run_at_startup` the first run happens right away,
    /// otherwise after one period.
    Every {
        period: Duration,
        run_at_startup: bool,
    },
    /// Once a day at the given local wall-clock time.
    DailyAt(NaiveTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// The previous run had not finished yet.
    Skipped,
}

struct Entry {
    job: Arc<dyn Job>,
    schedule: Schedule,
    running: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, job: impl Job, schedule: Schedule) -> Self {
        self.entries.push(Entry {
            job: Arc::new(job),
            schedule,
            running: Arc::new(AtomicBool::new(false)),
        });
        self
    }

    /// Spawn one timer task per job. Must be called inside a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let tasks = self
            .entries
            .into_iter()
            .map(|entry| {
                info!(job = entry.job.name(), schedule = ?entry.schedule, "Scheduling job");
                match entry.schedule {
                    Schedule::Every {
                        period,
                        run_at_startup,
                    } => tokio::spawn(run_every(entry.job, entry.running, period, run_at_startup)),
                    Schedule::DailyAt(at) => {
                        tokio::spawn(run_daily(entry.job, entry.running, at))
                    }
                }
            })
            .collect();

        SchedulerHandle { tasks }
    }
}

pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop all timers. A run already executing on a blocking thread is
    /// allowed to finish.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("Scheduler stopped");
    }
}

async fn run_every(
    job: Arc<dyn Job>,
    running: Arc<AtomicBool>,
    period: Duration,
    run_at_startup: bool,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick completes immediately.
    if !run_at_startup {
        interval.tick().await;
    }

    loop {
        interval.tick().await;
        tokio::spawn(run_guarded(job.clone(), running.clone()));
    }
}

async fn run_daily(job: Arc<dyn Job>, running: Arc<AtomicBool>, at: NaiveTime) {
    loop {
        let now = Local::now();
        let next = next_daily_run(&now, at);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!(job = job.name(), next = %next, "Waiting for next daily run");

        tokio::time::sleep(wait).await;
        tokio::spawn(run_guarded(job.clone(), running.clone()));
    }
}

/// Resets the single-flight flag even if the run is cancelled.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run `job` once on a blocking thread unless a previous run still holds
/// `running`. Errors and panics are logged, never propagated.
pub async fn run_guarded(job: Arc<dyn Job>, running: Arc<AtomicBool>) -> RunOutcome {
    if running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        warn!(job = job.name(), "Previous run still active, skipping");
        return RunOutcome::Skipped;
    }
    let _guard = RunningGuard(running);

    let name = job.name();
    debug!(job = name, "Job started");

    match tokio::task::spawn_blocking(move || job.run()).await {
        Ok(Ok(())) => {
            debug!(job = name, "Job completed");
            RunOutcome::Completed
        }
        Ok(Err(e)) => {
            error!(job = name, error = ?e, "Job failed");
            RunOutcome::Failed
        }
        Err(e) => {
            error!(job = name, error = %e, "Job panicked");
            RunOutcome::Failed
        }
    }
}

/// The first occurrence of wall-clock time `at` strictly after `now`, in
/// `now`'s time zone. Days on which `at` does not exist (DST gap) are
/// skipped.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    (0..=2)
        .filter_map(|days| today.checked_add_days(Days::new(days)))
        .filter_map(|date| tz.from_local_datetime(&date.and_time(at)).earliest())
        .find(|candidate| candidate > now)
        .unwrap_or_else(|| now.clone() + chrono::Duration::days(1))
}
