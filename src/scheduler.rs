//! The microtask-batched scheduler (ยง4.8): a FIFO job queue with dedup, a post-flush callback
//! queue, and a per-job recursion-limit guard.
//!
//! Grounded on `other_examples/.../reinhardt-web.../runtime.rs`'s pluggable
//! `OnceLock<SchedulerFn>` + `schedule_update`/`flush_updates` shape for the "pending flag plus
//! pluggable backend" structure, and on the inherited crate's own optional `wasm-bindgen`
//! dependency (via its sibling `sycamore-futures` package) for the `async-scheduler` feature's
//! real-microtask backend.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::ReactivityError;

const RECURSION_LIMIT: u32 = 100;

type Job = Rc<dyn Fn()>;

thread_local! {
    static JOB_QUEUE: RefCell<Vec<Job>> = const { RefCell::new(Vec::new()) };
    static POST_FLUSH_QUEUE: RefCell<Vec<Job>> = const { RefCell::new(Vec::new()) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    static RECURSION_COUNTS: RefCell<HashMap<usize, u32>> = RefCell::new(HashMap::new());
    static AUTO_FLUSH: Cell<bool> = const { Cell::new(true) };
    #[cfg(feature = "async-scheduler")]
    static ASYNC_ENABLED: Cell<bool> = const { Cell::new(false) };
}

/// When disabled, `queue_job`/`queue_post_flush_cb` no longer trigger an immediate synchronous
/// flush; the caller must invoke [`flush_jobs`] itself. Enabled by default. Useful for batching
/// several mutations (and for tests that want to inspect [`flush_jobs`]'s `Result` directly
/// instead of having it swallowed by the implicit flush).
pub fn set_auto_flush(enabled: bool) {
    AUTO_FLUSH.with(|a| a.set(enabled));
}

fn job_id(job: &Job) -> usize {
    Rc::as_ptr(job) as *const () as usize
}

fn contains(queue: &[Job], job: &Job) -> bool {
    queue.iter().any(|j| job_id(j) == job_id(job))
}

/// Appends `job` to the job queue if not already present, and requests a flush.
pub fn queue_job(job: Job) {
    JOB_QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if !contains(&q, &job) {
            q.push(job);
        }
    });
    request_flush();
}

/// Appends `cb` to the post-flush callback queue, and requests a flush.
pub fn queue_post_flush_cb(cb: Job) {
    POST_FLUSH_QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if !contains(&q, &cb) {
            q.push(cb);
        }
    });
    request_flush();
}

fn request_flush() {
    #[cfg(feature = "async-scheduler")]
    {
        if ASYNC_ENABLED.with(|a| a.get()) {
            if !FLUSHING.with(|f| f.get()) {
                spawn_flush();
            }
            return;
        }
    }
    // Default backend: flush synchronously. If a flush is already in progress further up the
    // call stack, do nothing — its own drain loop re-checks both queues until they are empty, so
    // the entries just queued will be picked up there.
    if AUTO_FLUSH.with(|a| a.get()) && !FLUSHING.with(|f| f.get()) {
        let _ = flush_jobs();
    }
}

#[cfg(feature = "async-scheduler")]
fn spawn_flush() {
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async {
            let _ = flush_jobs();
        });
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        tokio::task::spawn_local(async {
            let _ = flush_jobs();
        });
    }
}

/// Opt into the real-microtask scheduler backend. Only available with the `async-scheduler`
/// feature; requires the caller to be running inside an executor that supports spawning
/// non-`Send` local tasks (`wasm_bindgen_futures` on `wasm32`, a `tokio::task::LocalSet`
/// elsewhere).
#[cfg(feature = "async-scheduler")]
pub fn set_async_scheduler(enabled: bool) {
    ASYNC_ENABLED.with(|a| a.set(enabled));
}

/// Dequeues jobs FIFO and invokes each; once the job queue drains, dedupes and runs the
/// post-flush callback queue; recurses until both are empty. A per-job recursion counter fails
/// with [`ReactivityError::SchedulerRunaway`] after 100 re-enqueues of the same job during one
/// pass.
pub fn flush_jobs() -> Result<(), ReactivityError> {
    if FLUSHING.with(|f| f.get()) {
        return Ok(());
    }
    FLUSHING.with(|f| f.set(true));
    RECURSION_COUNTS.with(|c| c.borrow_mut().clear());

    let result = drain();

    FLUSHING.with(|f| f.set(false));
    result
}

fn drain() -> Result<(), ReactivityError> {
    loop {
        loop {
            let job = JOB_QUEUE.with(|q| {
                let mut q = q.borrow_mut();
                if q.is_empty() {
                    None
                } else {
                    Some(q.remove(0))
                }
            });
            let Some(job) = job else { break };

            let count = RECURSION_COUNTS.with(|c| {
                let mut c = c.borrow_mut();
                let entry = c.entry(job_id(&job)).or_insert(0);
                *entry += 1;
                *entry
            });
            if count > RECURSION_LIMIT {
                JOB_QUEUE.with(|q| q.borrow_mut().clear());
                POST_FLUSH_QUEUE.with(|q| q.borrow_mut().clear());
                return Err(ReactivityError::SchedulerRunaway { limit: RECURSION_LIMIT });
            }
            job();
        }

        let cbs = POST_FLUSH_QUEUE.with(|q| std::mem::take(&mut *q.borrow_mut()));
        let mut deduped: Vec<Job> = Vec::new();
        for cb in cbs {
            if !contains(&deduped, &cb) {
                deduped.push(cb);
            }
        }
        for cb in deduped {
            cb();
        }

        let more = JOB_QUEUE.with(|q| !q.borrow().is_empty())
            || POST_FLUSH_QUEUE.with(|q| !q.borrow().is_empty());
        if !more {
            return Ok(());
        }
    }
}

/// Explicitly run the post-flush callback queue without waiting for the job queue, useful for
/// tests that want to observe post-flush effects synchronously.
pub fn flush_post_flush_cbs() {
    let cbs = POST_FLUSH_QUEUE.with(|q| std::mem::take(&mut *q.borrow_mut()));
    for cb in cbs {
        cb();
    }
}

/// A future that resolves once a scheduled callback has run. The default synchronous backend
/// flushes before `next_tick` returns in the common case, so this resolves immediately; under
/// the `async-scheduler` backend it resolves once the spawned flush task reaches it.
pub struct NextTick {
    done: Rc<Cell<bool>>,
}

impl Future for NextTick {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.done.get() {
            Poll::Ready(())
        } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// `nextTick(fn?) -> promise-like`: schedules `f` (if given) as a post-flush callback and
/// returns a future that resolves once it has run.
pub fn next_tick(f: Option<impl FnOnce() + 'static>) -> NextTick {
    let done = Rc::new(Cell::new(false));
    let done2 = done.clone();
    let f = RefCell::new(f);
    queue_post_flush_cb(Rc::new(move || {
        if let Some(f) = f.borrow_mut().take() {
            f();
        }
        done2.set(true);
    }));
    NextTick { done }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn job_enqueued_twice_runs_once() {
        let count = Rc::new(StdRefCell::new(0));
        let count2 = count.clone();
        let job: Job = Rc::new(move || *count2.borrow_mut() += 1);
        queue_job(job.clone());
        queue_job(job);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn post_flush_callback_runs_after_jobs() {
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let log2 = log.clone();
        let log3 = log.clone();
        queue_post_flush_cb(Rc::new(move || log2.borrow_mut().push("post")));
        queue_job(Rc::new(move || log3.borrow_mut().push("job")));
        assert_eq!(*log.borrow(), vec!["job", "post"]);
    }

    #[test]
    fn job_enqueued_a_few_times_does_not_error() {
        let stable: Job = Rc::new(|| {});
        for _ in 0..5 {
            queue_job(stable.clone());
        }
        assert!(flush_jobs().is_ok());
    }

    #[test]
    fn self_reenqueuing_job_errors_past_the_recursion_limit() {
        // A job that re-enqueues itself unconditionally every time it runs simulates an effect
        // that mutates state it also depends on with no escape hatch. Auto-flush is disabled so
        // the scheduling side effect of the first `queue_job` call does not race the explicit
        // `flush_jobs` call below.
        set_auto_flush(false);
        let slot: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));
        let slot2 = slot.clone();
        let job: Job = Rc::new(move || {
            let this = slot2.borrow().clone().unwrap();
            queue_job(this);
        });
        *slot.borrow_mut() = Some(job.clone());
        queue_job(job);
        let result = flush_jobs();
        set_auto_flush(true);
        assert!(matches!(
            result,
            Err(ReactivityError::SchedulerRunaway { limit: 100 })
        ));
    }
}
