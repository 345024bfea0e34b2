//! # Lifecycle orchestrator.
//!
//! [`MachineService`] is the public face of the engine. It accepts transition requests,
//! turns them into scheduler jobs, and at fire time re-reads the machine, applies the
//! lifecycle rules and commits, notifies or records the rejection.
//!
//! ## Execution of a transition job
//! ```text
//! registry.update(id):
//!   ├─ machine missing        ─► no-op
//!   ├─ Accept, START / STOP   ─► commit ─► notify
//!   ├─ Accept, RESTART        ─► commit STOPPED ─► notify ─► chain settle job
//!   │                                └─ settle job: commit RUNNING if still active ─► notify
//!   └─ Reject
//!        ├─ Scheduled origin  ─► ErrorLog record + TransitionRejected event
//!        └─ Direct origin     ─► dropped
//! ```
//!
//! ## Rules
//! - Callers only get a synchronous acknowledgement ([`Submission`]); outcomes are
//!   observable through notifications and the error log.
//! - Every job re-reads the machine inside the registry lock before deciding.
//! - No ordering between jobs for the same machine; the last commit wins.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::MachineServiceBuilder;
use super::dispatch::Dispatcher;
use crate::config::Config;
use crate::error::{RuntimeError, ServiceError, SubmitError, TaskError};
use crate::error_log::ErrorLog;
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::{Decision, Rejection, decide, decide_retire};
use crate::model::{
    Action, ErrorMessage, Machine, MachineFilter, MachineId, MachineStatus, NewMachine,
};
use crate::registry::Registry;
use crate::scheduler::{JobFn, JobRef, Scheduler, Submission, wait_for_shutdown_signal};
use crate::subscribers::SubscriberSet;

/// Input format of [`MachineService::schedule_transition_local`].
const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a transition request came from.
///
/// Decides what happens to a rejection: scheduled requests leave an error record,
/// direct ones are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Interactive request from a user.
    Direct,
    /// Request fired by a future-dated schedule.
    Scheduled,
}

/// Result of [`MachineService::destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    /// The machine is now deactivated.
    Retired,
    /// Nothing changed; the machine was not stopped.
    Refused(Rejection),
}

pub(super) struct Core {
    pub(super) registry: Registry,
    pub(super) errors: ErrorLog,
    pub(super) scheduler: Scheduler,
    pub(super) dispatcher: Dispatcher,
    pub(super) bus: Bus,
    pub(super) listener: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// Machine lifecycle service.
///
/// Cheap to clone; clones share registry, scheduler and subscribers.
#[derive(Clone)]
pub struct MachineService {
    core: Arc<Core>,
}

impl MachineService {
    /// Returns a builder for a service using `cfg`.
    pub fn builder(cfg: Config) -> MachineServiceBuilder {
        MachineServiceBuilder::new(cfg)
    }

    /// Builds a service with an in-memory store and no subscribers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: Config) -> Self {
        Self::builder(cfg).build()
    }

    pub(super) fn from_core(core: Core) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Receiver of every runtime event published after this call.
    ///
    /// Diagnostic view: a receiver that falls behind the bus capacity misses events.
    /// Use a [`Subscribe`](crate::Subscribe) implementation for guaranteed status changes.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.core.bus.subscribe()
    }

    /// Jobs armed or running.
    pub fn pending(&self) -> usize {
        self.core.scheduler.pending()
    }

    // === Transitions ===

    /// Requests `action` on machine `id` after a short random delay.
    ///
    /// The machine must exist now; whether the action is legal is decided when the
    /// job fires.
    pub async fn request_transition(
        &self,
        id: MachineId,
        action: Action,
        origin: Origin,
    ) -> Result<Submission, ServiceError> {
        if self.core.registry.get(id).await?.is_none() {
            return Err(ServiceError::MachineNotFound { id });
        }

        let core = Arc::clone(&self.core);
        let job: JobRef = Arc::new(
            JobFn::new(job_name(action.as_str(), id), move || {
                let core = Arc::clone(&core);
                async move { core.execute(id, action, origin, action.as_str()).await }
            })
            .for_machine(id),
        );
        let delay = self.core.scheduler.submit_jittered(job)?;
        debug!(machine = id, action = action.as_str(), ?origin, ?delay, "transition requested");
        Ok(Submission::Queued { delay })
    }

    /// Schedules `action` (`"Start"`, `"Stop"` or `"Restart"`) on machine `id` at `at`.
    ///
    /// A fire time that is not in the future is ignored: no job, no error record.
    /// Rejections at fire time are recorded in the error log under `action` as given.
    /// An unknown action label makes the job a no-op.
    pub async fn schedule_transition(
        &self,
        id: MachineId,
        at: DateTime<Utc>,
        action: &str,
    ) -> Result<Submission, ServiceError> {
        let label: Arc<str> = Arc::from(action);
        let core = Arc::clone(&self.core);
        let job_label = Arc::clone(&label);
        let job: JobRef = Arc::new(
            JobFn::new(job_name(&format!("scheduled-{label}"), id), move || {
                let core = Arc::clone(&core);
                let label = Arc::clone(&job_label);
                async move {
                    let Some(action) = Action::from_label(&label) else {
                        warn!(machine = id, action = %label, "unknown scheduled action; ignored");
                        return Ok(());
                    };
                    core.execute(id, action, Origin::Scheduled, &label).await
                }
            })
            .for_machine(id),
        );

        let submission = self.core.scheduler.submit_at(at, job)?;
        match submission {
            Submission::Queued { delay } => {
                info!(machine = id, action = %label, %at, ?delay, "transition scheduled");
            }
            Submission::Ignored(reason) => {
                self.core.bus.publish(
                    Event::new(EventKind::ScheduleIgnored)
                        .with_machine(id)
                        .with_action(label)
                        .with_reason(reason.as_str()),
                );
            }
        }
        Ok(submission)
    }

    /// [`schedule_transition`](Self::schedule_transition) with the fire time given as a
    /// local date (`yyyy-MM-dd`) and time (`HH:mm:ss`).
    pub async fn schedule_transition_local(
        &self,
        id: MachineId,
        date: &str,
        time: &str,
        action: &str,
    ) -> Result<Submission, ServiceError> {
        let at = parse_local(date, time)?;
        self.schedule_transition(id, at, action).await
    }

    /// Retires a stopped machine immediately.
    ///
    /// A machine that is not stopped is left untouched and no error is recorded.
    pub async fn destroy(&self, id: MachineId) -> Result<Retirement, ServiceError> {
        let outcome = self
            .core
            .registry
            .update(id, |m| match decide_retire(m.status) {
                Ok(()) => {
                    m.active = false;
                    Retirement::Retired
                }
                Err(rejection) => Retirement::Refused(rejection),
            })
            .await?
            .ok_or(ServiceError::MachineNotFound { id })?;

        match outcome {
            Retirement::Retired => info!(machine = id, "machine retired"),
            Retirement::Refused(r) => debug!(machine = id, reason = %r, "retire refused"),
        }
        Ok(outcome)
    }

    /// Current status of machine `id`.
    pub async fn find_status(&self, id: MachineId) -> Result<MachineStatus, ServiceError> {
        Ok(self.find_machine(id).await?.status)
    }

    // === Machine management ===

    /// Full record of machine `id`.
    pub async fn find_machine(&self, id: MachineId) -> Result<Machine, ServiceError> {
        self.core
            .registry
            .get(id)
            .await?
            .ok_or(ServiceError::MachineNotFound { id })
    }

    /// Creates a stopped, active machine dated today.
    pub async fn create_machine(
        &self,
        name: impl Into<String>,
        owner: impl Into<String>,
    ) -> Result<Machine, ServiceError> {
        let today = Utc::now().date_naive();
        let machine = self
            .core
            .registry
            .create(NewMachine::new(name, owner, today))
            .await?;
        info!(machine = machine.id, owner = %machine.owner, "machine created");
        Ok(machine)
    }

    pub async fn machines_by_owner(&self, owner: &str) -> Result<Vec<Machine>, ServiceError> {
        Ok(self.core.registry.list_by_owner(owner).await?)
    }

    /// Machines of `filter.owner` matching every criterion of `filter`.
    pub async fn search(&self, filter: &MachineFilter) -> Result<Vec<Machine>, ServiceError> {
        let mut machines = self.core.registry.list_by_owner(&filter.owner).await?;
        machines.retain(|m| filter.matches(m));
        Ok(machines)
    }

    /// Error history of machine `id`, oldest first.
    pub async fn errors_for(&self, id: MachineId) -> Result<Vec<ErrorMessage>, ServiceError> {
        Ok(self.core.errors.for_machine(id).await?)
    }

    // === Lifecycle ===

    /// Stops accepting requests, drains in-flight jobs within the grace period and
    /// flushes subscribers.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let res = self.core.scheduler.shutdown().await;
        if let Some((stop, handle)) = self.core.listener.lock().await.take() {
            stop.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "event listener ended abnormally");
            }
        }
        res
    }

    /// Waits for a termination signal, then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        match wait_for_shutdown_signal().await {
            Ok(signal) => info!(signal, "shutdown signal received"),
            Err(e) => warn!(error = %e, "signal listener failed; shutting down now"),
        }
        self.shutdown().await
    }
}

impl Core {
    /// Re-reads machine `id`, decides `action` and applies the outcome.
    async fn execute(
        self: &Arc<Self>,
        id: MachineId,
        action: Action,
        origin: Origin,
        label: &str,
    ) -> Result<(), TaskError> {
        let decision = self
            .registry
            .update(id, |m| {
                let decision = decide(m.status, m.active, action);
                if let Decision::Accept(next) = decision {
                    m.status = if action.is_two_phase() {
                        MachineStatus::Stopped
                    } else {
                        next
                    };
                }
                decision
            })
            .await?;

        match decision {
            None => {
                debug!(machine = id, action = label, "machine no longer exists; skipped");
            }
            Some(Decision::Accept(next)) if action.is_two_phase() => {
                self.dispatcher.notify(id, MachineStatus::Stopped);
                let core = Arc::clone(self);
                let settle: JobRef = Arc::new(
                    JobFn::new(job_name("settle", id), move || {
                        let core = Arc::clone(&core);
                        async move { core.settle(id, next).await }
                    })
                    .for_machine(id),
                );
                let delay = self.scheduler.chain_settle(settle);
                debug!(machine = id, ?delay, "restart settling");
            }
            Some(Decision::Accept(next)) => {
                self.dispatcher.notify(id, next);
            }
            Some(Decision::Reject(rejection)) => match origin {
                Origin::Scheduled => {
                    let record = self.errors.record_rejection(id, label, rejection).await?;
                    warn!(machine = id, action = label, reason = %rejection, error_id = record.id, "scheduled transition rejected");
                    self.bus.publish(
                        Event::new(EventKind::TransitionRejected)
                            .with_machine(id)
                            .with_action(label)
                            .with_reason(rejection.to_string()),
                    );
                }
                Origin::Direct => {
                    debug!(machine = id, action = label, reason = %rejection, "transition rejected; dropped");
                }
            },
        }
        Ok(())
    }

    /// Second phase of a restart: commits `status` unless the machine was retired.
    async fn settle(&self, id: MachineId, status: MachineStatus) -> Result<(), TaskError> {
        let committed = self
            .registry
            .update(id, |m| {
                if !m.active || m.status == status {
                    return false;
                }
                m.status = status;
                true
            })
            .await?;

        match committed {
            Some(true) => self.dispatcher.notify(id, status),
            Some(false) => debug!(machine = id, "restart not completed; machine retired or already up"),
            None => debug!(machine = id, "machine vanished during restart"),
        }
        Ok(())
    }
}

/// Forwards bus events to the subscriber set until `stop` fires, then flushes.
pub(super) fn spawn_listener(
    mut feed: mpsc::UnboundedReceiver<Event>,
    mut rx: broadcast::Receiver<Event>,
    subs: SubscriberSet,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                Some(ev) = feed.recv() => subs.deliver(ev),
                res = rx.recv() => match res {
                    Ok(ev) => forward_diagnostic(&subs, &ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged; diagnostic events lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = stop.cancelled() => break,
            }
        }
        while let Ok(ev) = feed.try_recv() {
            subs.deliver(ev);
        }
        while let Ok(ev) = rx.try_recv() {
            forward_diagnostic(&subs, &ev);
        }
        subs.shutdown().await;
    })
}

/// Status changes reach subscribers through the feed; their bus copies are skipped.
fn forward_diagnostic(subs: &SubscriberSet, ev: &Event) {
    if ev.kind != EventKind::StatusChanged {
        subs.emit(ev);
    }
}

fn job_name(kind: &str, id: MachineId) -> String {
    format!("{}:{id}", kind.to_lowercase())
}

fn parse_local(date: &str, time: &str) -> Result<DateTime<Utc>, SubmitError> {
    let input = format!("{date} {time}");
    let naive = NaiveDateTime::parse_from_str(&input, LOCAL_FORMAT).map_err(|e| {
        SubmitError::InvalidSchedule {
            input: input.clone(),
            reason: e.to_string(),
        }
    })?;
    match Local.from_local_datetime(&naive).single() {
        Some(local) => Ok(local.with_timezone(&Utc)),
        None => Err(SubmitError::InvalidSchedule {
            input,
            reason: "ambiguous or nonexistent local time".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::DelayWindow;
    use std::time::Duration;
    use tokio::time::sleep;

    fn cfg() -> Config {
        Config {
            jitter: DelayWindow::fixed(Duration::from_secs(10)),
            settle: DelayWindow::fixed(Duration::from_secs(5)),
            ..Config::default()
        }
    }

    #[test]
    fn local_input_must_match_format() {
        assert!(parse_local("2030-01-02", "03:04:05").is_ok());
        let err = parse_local("02/01/2030", "03:04").unwrap_err();
        assert_eq!(err.as_label(), "submit_invalid_schedule");
    }

    #[test]
    fn job_names_are_lowercase() {
        assert_eq!(job_name("START", 4), "start:4");
        assert_eq!(job_name("scheduled-Stop", 4), "scheduled-stop:4");
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_machine_is_refused_synchronously() {
        let svc = MachineService::new(cfg());
        let err = svc
            .request_transition(9, Action::Start, Origin::Direct)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(svc.find_status(9).await.unwrap_err().is_not_found());
        assert!(svc.destroy(9).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_start_round_trip() {
        let svc = MachineService::new(cfg());
        let m = svc.create_machine("db", "ana").await.unwrap();

        svc.request_transition(m.id, Action::Start, Origin::Direct)
            .await
            .unwrap();
        sleep(Duration::from_secs(11)).await;
        assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Running);

        svc.request_transition(m.id, Action::Stop, Origin::Direct)
            .await
            .unwrap();
        sleep(Duration::from_secs(11)).await;
        assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);
        svc.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_commits_stopped_then_running() {
        let svc = MachineService::new(cfg());
        let m = svc.create_machine("db", "ana").await.unwrap();
        svc.request_transition(m.id, Action::Start, Origin::Direct)
            .await
            .unwrap();
        sleep(Duration::from_secs(11)).await;

        let mut rx = svc.events();
        svc.request_transition(m.id, Action::Restart, Origin::Direct)
            .await
            .unwrap();
        sleep(Duration::from_secs(12)).await;
        assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Running);

        let mut statuses = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::StatusChanged {
                statuses.push(ev.status.unwrap());
            }
        }
        assert_eq!(statuses, vec![MachineStatus::Stopped, MachineStatus::Running]);
        svc.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retiring_between_restart_phases_keeps_machine_stopped() {
        let svc = MachineService::new(cfg());
        let m = svc.create_machine("db", "ana").await.unwrap();
        svc.request_transition(m.id, Action::Start, Origin::Direct)
            .await
            .unwrap();
        sleep(Duration::from_secs(11)).await;
        svc.request_transition(m.id, Action::Restart, Origin::Direct)
            .await
            .unwrap();
        sleep(Duration::from_secs(12)).await;

        assert_eq!(svc.destroy(m.id).await.unwrap(), Retirement::Retired);
        sleep(Duration::from_secs(5)).await;

        let after = svc.find_machine(m.id).await.unwrap();
        assert_eq!(after.status, MachineStatus::Stopped);
        assert!(!after.active);
        svc.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_requires_stopped_machine() {
        let svc = MachineService::new(cfg());
        let m = svc.create_machine("db", "ana").await.unwrap();
        svc.request_transition(m.id, Action::Start, Origin::Direct)
            .await
            .unwrap();
        sleep(Duration::from_secs(11)).await;

        let out = svc.destroy(m.id).await.unwrap();
        assert!(matches!(out, Retirement::Refused(Rejection::StatusMismatch { .. })));
        assert!(svc.find_machine(m.id).await.unwrap().active);
        assert!(svc.errors_for(m.id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_scheduled_label_is_a_no_op() {
        let svc = MachineService::new(cfg());
        let m = svc.create_machine("db", "ana").await.unwrap();
        let out = svc
            .schedule_transition(m.id, Utc::now() + chrono::Duration::seconds(2), "Reboot")
            .await
            .unwrap();
        assert!(out.is_queued());
        sleep(Duration::from_secs(3)).await;

        assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);
        assert!(svc.errors_for(m.id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn requests_after_shutdown_are_refused() {
        let svc = MachineService::new(cfg());
        let m = svc.create_machine("db", "ana").await.unwrap();
        svc.shutdown().await.unwrap();

        let err = svc
            .request_transition(m.id, Action::Start, Origin::Direct)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Submit(SubmitError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn search_filters_owner_machines() {
        let svc = MachineService::new(cfg());
        svc.create_machine("Web-1", "ana").await.unwrap();
        svc.create_machine("db", "ana").await.unwrap();
        svc.create_machine("web-2", "bob").await.unwrap();

        let hits = svc
            .search(&MachineFilter::for_owner("ana").with_name("WEB"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Web-1");
        assert_eq!(svc.machines_by_owner("ana").await.unwrap().len(), 2);
    }
}
