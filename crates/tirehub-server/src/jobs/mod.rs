//! Background jobs driven by the [`Scheduler`](crate::scheduler::Scheduler).

pub mod archival;
pub mod sweep;

pub use archival::ArchivalJob;
pub use sweep::SweepJob;

/// A unit of background work.
///
/// `run` executes on a blocking thread. Errors are logged by the scheduler
/// and the job is simply tried again on its next tick.
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn run(&self) -> anyhow::Result<()>;
}
