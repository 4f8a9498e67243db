//! The crate's error type (ยง7 error class 3: scheduler runaway, plus fallible-entry-point
//! errors). Misuse warnings (ยง7 class 2) are *not* represented here — they are diagnostics, not
//! errors, per ยง7's own text, and are emitted via [`crate::dev_warn`] instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactivityError {
    /// A job was re-enqueued more than 100 times during a single flush pass. Per ยง4.8/ยง7, this
    /// is fatal rather than silently dropped, since it almost always indicates an effect
    /// unconditionally mutating state it also depends on.
    #[error(
        "maximum recursive updates exceeded: a job was enqueued more than {limit} times in one \
         flush pass; this is almost always caused by mutating reactive state unconditionally \
         inside an effect, computed getter, or watcher"
    )]
    SchedulerRunaway { limit: u32 },
}
