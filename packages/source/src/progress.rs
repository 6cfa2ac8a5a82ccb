//! Progress reporting for long-running pipeline stages.
//!
//! A stage announces how many units it will process, names each unit as it
//! starts (a traffic-count year, for instance) and reports each one done.
//! The CLI renders this as a terminal bar; tests and library callers use
//! [`NullProgress`].

use std::sync::Arc;

/// Sink for one stage's progress.
///
/// Must be `Send + Sync`: route partitions report from blocking worker
/// tasks.
pub trait StageProgress: Send + Sync {
    /// The stage is starting with `units` items of work.
    fn start(&self, units: u64);

    /// Work on `item` has begun.
    fn working_on(&self, item: &str);

    /// One item is finished, whether it succeeded or not.
    fn done_one(&self);

    /// The stage is over.
    fn finish(&self, summary: &str);
}

/// Discards every update.
pub struct NullProgress;

impl StageProgress for NullProgress {
    fn start(&self, _units: u64) {}
    fn working_on(&self, _item: &str) {}
    fn done_one(&self) {}
    fn finish(&self, _summary: &str) {}
}

/// Shared [`NullProgress`] for callers that do not render progress.
#[must_use]
pub fn null_progress() -> Arc<dyn StageProgress> {
    Arc::new(NullProgress)
}
