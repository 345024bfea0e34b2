//! End-to-end lifecycle scenarios against the in-memory store.
//!
//! Tokio time is paused: jitter (10–15 s) and settle (5–10 s) delays elapse virtually.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use machinevisor::{
    Action, Config, DelayWindow, Event, EventKind, IgnoredReason, MachineId, MachineService,
    MachineStatus, Origin, Retirement, Submission, Subscribe,
};
use tokio::time::{Instant, sleep};

/// Collects every event it sees.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn status_changes(&self, machine: MachineId) -> Vec<MachineStatus> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == EventKind::StatusChanged && e.machine == Some(machine))
            .filter_map(|e| e.status)
            .collect()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Counts status changes, optionally taking `pause` per change.
#[derive(Default)]
struct Tally {
    changes: AtomicUsize,
    pause: Option<Duration>,
}

#[async_trait]
impl Subscribe for Tally {
    async fn on_event(&self, event: &Event) {
        if event.kind != EventKind::StatusChanged {
            return;
        }
        if let Some(pause) = self.pause {
            sleep(pause).await;
        }
        self.changes.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "tally"
    }

    fn queue_capacity(&self) -> usize {
        4
    }
}

fn service() -> (MachineService, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
    let svc = MachineService::builder(Config::default())
        .with_subscribers(subs)
        .build();
    (svc, recorder)
}

async fn running_machine(svc: &MachineService) -> MachineId {
    let m = svc.create_machine("web", "ana").await.unwrap();
    svc.request_transition(m.id, Action::Start, Origin::Direct)
        .await
        .unwrap();
    sleep(Duration::from_secs(15)).await;
    assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Running);
    m.id
}

#[tokio::test(start_paused = true)]
async fn start_commits_after_jitter_and_notifies_once() {
    let (svc, rec) = service();
    let m1 = svc.create_machine("m1", "ana").await.unwrap();
    assert_eq!(m1.status, MachineStatus::Stopped);

    let ack = svc
        .request_transition(m1.id, Action::Start, Origin::Direct)
        .await
        .unwrap();
    let Submission::Queued { delay } = ack else {
        panic!("start was not queued: {ack:?}");
    };
    assert!(delay >= Duration::from_secs(10) && delay < Duration::from_secs(15));

    sleep(Duration::from_secs(9)).await;
    assert_eq!(svc.find_status(m1.id).await.unwrap(), MachineStatus::Stopped);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(svc.find_status(m1.id).await.unwrap(), MachineStatus::Running);

    svc.shutdown().await.unwrap();
    assert_eq!(rec.status_changes(m1.id), vec![MachineStatus::Running]);
}

#[tokio::test(start_paused = true)]
async fn past_due_schedule_is_ignored() {
    let (svc, rec) = service();
    let m2 = running_machine(&svc).await;

    let ack = svc
        .schedule_transition(m2, Utc::now() - chrono::Duration::seconds(1), "Stop")
        .await
        .unwrap();
    assert_eq!(ack, Submission::Ignored(IgnoredReason::PastDue));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(svc.find_status(m2).await.unwrap(), MachineStatus::Running);
    assert!(svc.errors_for(m2).await.unwrap().is_empty());

    svc.shutdown().await.unwrap();
    assert_eq!(rec.count(EventKind::ScheduleIgnored), 1);
}

#[tokio::test(start_paused = true)]
async fn scheduled_rejection_writes_one_error_record() {
    let (svc, rec) = service();
    let m3 = svc.create_machine("m3", "ana").await.unwrap();

    let ack = svc
        .schedule_transition(m3.id, Utc::now() + chrono::Duration::seconds(2), "Stop")
        .await
        .unwrap();
    assert!(ack.is_queued());

    sleep(Duration::from_secs(3)).await;
    let errors = svc.errors_for(m3.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].machine, m3.id);
    assert_eq!(errors[0].action, "Stop");
    assert_eq!(errors[0].message, "status is not RUNNING");
    assert_eq!(svc.find_status(m3.id).await.unwrap(), MachineStatus::Stopped);

    svc.shutdown().await.unwrap();
    assert_eq!(rec.count(EventKind::TransitionRejected), 1);
    assert!(rec.status_changes(m3.id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduled_start_succeeds_and_notifies() {
    let (svc, rec) = service();
    let m = svc.create_machine("cron", "ana").await.unwrap();

    svc.schedule_transition(m.id, Utc::now() + chrono::Duration::seconds(60), "Start")
        .await
        .unwrap();
    sleep(Duration::from_secs(59)).await;
    assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Running);

    svc.shutdown().await.unwrap();
    assert_eq!(rec.status_changes(m.id), vec![MachineStatus::Running]);
    assert!(svc.errors_for(m.id).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn direct_rejection_leaves_no_trace() {
    let (svc, rec) = service();
    let m = svc.create_machine("idle", "ana").await.unwrap();

    svc.request_transition(m.id, Action::Stop, Origin::Direct)
        .await
        .unwrap();
    svc.request_transition(m.id, Action::Restart, Origin::Direct)
        .await
        .unwrap();
    sleep(Duration::from_secs(30)).await;

    assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);
    assert!(svc.errors_for(m.id).await.unwrap().is_empty());

    svc.shutdown().await.unwrap();
    assert!(rec.status_changes(m.id).is_empty());
    assert_eq!(rec.count(EventKind::TransitionRejected), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_passes_through_stopped_with_settle_pause() {
    let (svc, rec) = service();
    let id = running_machine(&svc).await;

    svc.request_transition(id, Action::Restart, Origin::Direct)
        .await
        .unwrap();

    let begin = Instant::now();
    let mut stopped_at = None;
    let mut running_at = None;
    while begin.elapsed() < Duration::from_secs(30) && running_at.is_none() {
        sleep(Duration::from_millis(100)).await;
        match (svc.find_status(id).await.unwrap(), stopped_at) {
            (MachineStatus::Stopped, None) => stopped_at = Some(Instant::now()),
            (MachineStatus::Running, Some(_)) => running_at = Some(Instant::now()),
            _ => {}
        }
    }

    let stopped_at = stopped_at.expect("restart never committed STOPPED");
    let running_at = running_at.expect("restart never committed RUNNING");
    let settle = running_at - stopped_at;
    assert!(settle >= Duration::from_millis(4_900), "settle too short: {settle:?}");
    assert!(settle <= Duration::from_millis(10_100), "settle too long: {settle:?}");

    svc.shutdown().await.unwrap();
    assert_eq!(
        rec.status_changes(id),
        vec![
            MachineStatus::Running,
            MachineStatus::Stopped,
            MachineStatus::Running
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn retired_machine_rejects_everything() {
    let (svc, rec) = service();
    let m = svc.create_machine("old", "ana").await.unwrap();

    assert_eq!(svc.destroy(m.id).await.unwrap(), Retirement::Retired);
    assert!(!svc.find_machine(m.id).await.unwrap().active);

    svc.request_transition(m.id, Action::Start, Origin::Direct)
        .await
        .unwrap();
    svc.schedule_transition(m.id, Utc::now() + chrono::Duration::seconds(20), "Start")
        .await
        .unwrap();
    sleep(Duration::from_secs(25)).await;

    assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);
    let errors = svc.errors_for(m.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].action, "Start");
    assert_eq!(errors[0].message, "machine is deactivated");

    svc.shutdown().await.unwrap();
    assert!(rec.status_changes(m.id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn destroy_of_running_machine_is_silent() {
    let (svc, _rec) = service();
    let id = running_machine(&svc).await;

    assert!(matches!(
        svc.destroy(id).await.unwrap(),
        Retirement::Refused(_)
    ));
    let m = svc.find_machine(id).await.unwrap();
    assert!(m.active);
    assert_eq!(m.status, MachineStatus::Running);
    assert!(svc.errors_for(id).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn local_schedule_in_the_past_is_ignored() {
    let (svc, _rec) = service();
    let m = svc.create_machine("db", "ana").await.unwrap();

    let ack = svc
        .schedule_transition_local(m.id, "2000-01-01", "00:00:00", "Start")
        .await
        .unwrap();
    assert_eq!(ack, Submission::Ignored(IgnoredReason::PastDue));
    assert_eq!(svc.pending(), 0);

    let err = svc
        .schedule_transition_local(m.id, "01/01/2000", "noon", "Start")
        .await
        .unwrap_err();
    assert_eq!(err.as_label(), "submit_invalid_schedule");
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_restart() {
    let (svc, rec) = service();
    let id = running_machine(&svc).await;

    svc.request_transition(id, Action::Restart, Origin::Direct)
        .await
        .unwrap();
    svc.shutdown().await.unwrap();

    assert_eq!(svc.find_status(id).await.unwrap(), MachineStatus::Running);
    assert_eq!(rec.count(EventKind::AllStoppedWithin), 1);
    assert_eq!(
        rec.status_changes(id),
        vec![
            MachineStatus::Running,
            MachineStatus::Stopped,
            MachineStatus::Running
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn scheduled_origin_rejection_records_canonical_action() {
    let (svc, rec) = service();
    let m = svc.create_machine("batch", "ana").await.unwrap();

    svc.request_transition(m.id, Action::Stop, Origin::Scheduled)
        .await
        .unwrap();
    sleep(Duration::from_secs(15)).await;

    let errors = svc.errors_for(m.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].action, "STOP");
    assert_eq!(errors[0].message, "status is not RUNNING");
    assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);

    svc.shutdown().await.unwrap();
    assert_eq!(rec.count(EventKind::TransitionRejected), 1);
    assert!(rec.status_changes(m.id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduled_restart_stops_then_runs() {
    let (svc, rec) = service();
    let id = running_machine(&svc).await;

    let ack = svc
        .schedule_transition(id, Utc::now() + chrono::Duration::seconds(5), "Restart")
        .await
        .unwrap();
    assert!(ack.is_queued());

    sleep(Duration::from_secs(6)).await;
    assert_eq!(svc.find_status(id).await.unwrap(), MachineStatus::Stopped);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(svc.find_status(id).await.unwrap(), MachineStatus::Running);

    svc.shutdown().await.unwrap();
    assert_eq!(
        rec.status_changes(id),
        vec![
            MachineStatus::Running,
            MachineStatus::Stopped,
            MachineStatus::Running
        ]
    );
    assert!(svc.errors_for(id).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduled_restart_of_stopped_machine_is_recorded() {
    let (svc, rec) = service();
    let m = svc.create_machine("cold", "ana").await.unwrap();

    svc.schedule_transition(m.id, Utc::now() + chrono::Duration::seconds(5), "Restart")
        .await
        .unwrap();
    sleep(Duration::from_secs(20)).await;

    let errors = svc.errors_for(m.id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].action, "Restart");
    assert_eq!(errors[0].message, "status is not RUNNING");
    assert_eq!(svc.find_status(m.id).await.unwrap(), MachineStatus::Stopped);

    svc.shutdown().await.unwrap();
    assert!(rec.status_changes(m.id).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_commit_is_notified_under_load() {
    const MACHINES: usize = 3_000;

    let tally = Arc::new(Tally::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![tally.clone()];
    let mut cfg = Config::default();
    cfg.jitter = DelayWindow::fixed(Duration::from_millis(1));
    cfg.bus_capacity = 8;
    let svc = MachineService::builder(cfg).with_subscribers(subs).build();

    let mut ids = Vec::with_capacity(MACHINES);
    for i in 0..MACHINES {
        ids.push(svc.create_machine(format!("vm-{i}"), "load").await.unwrap().id);
    }
    for &id in &ids {
        svc.request_transition(id, Action::Start, Origin::Direct)
            .await
            .unwrap();
    }
    svc.shutdown().await.unwrap();

    for &id in &ids {
        assert_eq!(svc.find_status(id).await.unwrap(), MachineStatus::Running);
    }
    assert_eq!(tally.changes.load(Ordering::SeqCst), MACHINES);
}

#[tokio::test(start_paused = true)]
async fn slow_subscriber_still_sees_every_commit() {
    const MACHINES: usize = 3_000;

    let tally = Arc::new(Tally {
        pause: Some(Duration::from_millis(1)),
        ..Tally::default()
    });
    let subs: Vec<Arc<dyn Subscribe>> = vec![tally.clone()];
    let mut cfg = Config::default();
    cfg.bus_capacity = 8;
    let svc = MachineService::builder(cfg).with_subscribers(subs).build();

    let at = Utc::now() + chrono::Duration::seconds(5);
    for i in 0..MACHINES {
        let m = svc.create_machine(format!("vm-{i}"), "load").await.unwrap();
        assert!(svc.schedule_transition(m.id, at, "Start").await.unwrap().is_queued());
    }
    sleep(Duration::from_secs(6)).await;
    svc.shutdown().await.unwrap();

    assert_eq!(tally.changes.load(Ordering::SeqCst), MACHINES);
}
