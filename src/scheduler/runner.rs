//! # Run a single delayed job.
//!
//! Waits out the job's delay, acquires a worker slot, executes the body once and
//! publishes lifecycle events to the [`Bus`](crate::events::Bus).
//!
//! ## Event flow
//! ```text
//! sleep(delay) ──► acquire permit ──► JobStarting ──► job.run()
//!                                                       ├─ Ok     ──► JobCompleted
//!                                                       ├─ Err    ──► JobFailed
//!                                                       └─ panic  ──► JobPanicked
//!
//! abort token fired while sleeping / waiting for a permit ──► JobAborted
//! ```
//!
//! ## Rules
//! - Publishes **exactly one** terminal event per job.
//! - The permit is taken **after** the delay; sleeping jobs never occupy a slot.
//! - No retry: errors and panics end the job.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::{select, time};
use tracing::{debug, error, warn};

use super::job::JobRef;
use super::pool::Shared;
use crate::events::{Event, EventKind};
use crate::subscribers::panic_message;

/// Executes `job` after `delay`.
pub(super) async fn run_job(job: JobRef, delay: Duration, shared: Arc<Shared>) {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    select! {
        _ = &mut sleep => {}
        _ = shared.abort.cancelled() => {
            publish_aborted(&shared, &job);
            return;
        }
    }

    let _permit = match &shared.semaphore {
        Some(sem) => {
            let permit_future = sem.clone().acquire_owned();
            tokio::pin!(permit_future);

            select! {
                res = &mut permit_future => match res {
                    Ok(permit) => Some(permit),
                    Err(_closed) => {
                        publish_aborted(&shared, &job);
                        return;
                    }
                },
                _ = shared.abort.cancelled() => {
                    publish_aborted(&shared, &job);
                    return;
                }
            }
        }
        None => None,
    };

    debug!(job = job.name(), machine = ?job.machine(), "job starting");
    shared.bus.publish(tagged(Event::new(EventKind::JobStarting), &job));

    match AssertUnwindSafe(job.run()).catch_unwind().await {
        Ok(Ok(())) => {
            shared
                .bus
                .publish(tagged(Event::new(EventKind::JobCompleted), &job));
        }
        Ok(Err(e)) => {
            error!(job = job.name(), label = e.as_label(), error = %e, "job failed; abandoned");
            shared.bus.publish(
                tagged(Event::new(EventKind::JobFailed), &job).with_reason(e.to_string()),
            );
        }
        Err(panic_err) => {
            let info = panic_message(panic_err.as_ref());
            error!(job = job.name(), %info, "job panicked; abandoned");
            shared
                .bus
                .publish(tagged(Event::new(EventKind::JobPanicked), &job).with_reason(info));
        }
    }
}

/// Attaches job name and machine to an event.
pub(super) fn tagged(ev: Event, job: &JobRef) -> Event {
    let ev = ev.with_job(job.name());
    match job.machine() {
        Some(id) => ev.with_machine(id),
        None => ev,
    }
}

fn publish_aborted(shared: &Shared, job: &JobRef) {
    warn!(job = job.name(), "job aborted before it ran");
    shared
        .bus
        .publish(tagged(Event::new(EventKind::JobAborted), job));
}
