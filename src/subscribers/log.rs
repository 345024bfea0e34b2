//! # LogWriter: event renderer
//!
//! A subscriber that renders every [`Event`] through `tracing`, one line per event,
//! at a level matching its severity.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  machinevisor: [scheduled] job="start:1" delay_ms=12034 machine=1
//! INFO  machinevisor: [status] machine=1 status=RUNNING
//! WARN  machinevisor: [rejected] machine=3 action="Stop" reason="status is not RUNNING"
//! ERROR machinevisor: [failed] job="stop:4" reason="store failure: ..."
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let job = e.job.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        let action = e.action.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::JobScheduled => {
                info!(target: "machinevisor", "[scheduled] job={job:?} delay_ms={:?} machine={:?}", e.delay_ms, e.machine);
            }
            EventKind::JobStarting => {
                debug!(target: "machinevisor", "[starting] job={job:?}");
            }
            EventKind::JobCompleted => {
                debug!(target: "machinevisor", "[completed] job={job:?}");
            }
            EventKind::JobFailed => {
                error!(target: "machinevisor", "[failed] job={job:?} reason={reason:?}");
            }
            EventKind::JobPanicked => {
                error!(target: "machinevisor", "[panicked] job={job:?} info={reason:?}");
            }
            EventKind::JobAborted => {
                warn!(target: "machinevisor", "[aborted] job={job:?}");
            }
            EventKind::StatusChanged => {
                let status = e.status.map(|s| s.as_str()).unwrap_or("-");
                info!(target: "machinevisor", "[status] machine={:?} status={status}", e.machine);
            }
            EventKind::TransitionRejected => {
                warn!(target: "machinevisor", "[rejected] machine={:?} action={action:?} reason={reason:?}", e.machine);
            }
            EventKind::ScheduleIgnored => {
                info!(target: "machinevisor", "[schedule-ignored] machine={:?} action={action:?} reason={reason:?}", e.machine);
            }
            EventKind::ShutdownRequested => {
                info!(target: "machinevisor", "[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "machinevisor", "[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                warn!(target: "machinevisor", "[grace-exceeded]");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "machinevisor", "[subscriber-overflow] subscriber={job} reason={reason:?}");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "machinevisor", "[subscriber-panicked] subscriber={job} info={reason:?}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
