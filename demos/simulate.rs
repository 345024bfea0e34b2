//! # Example: simulate
//!
//! Walks one fleet through every lifecycle path with short delays.
//!
//! Shows how to:
//! - Build a [`MachineService`] with [`LogWriter`] and [`TopicBroker`] subscribers.
//! - Request immediate transitions and future-dated schedules.
//! - Read back statuses and the error log.
//!
//! ## Flow
//! ```text
//! create web, db
//!   ├─► START web, START db          (jitter)        ─► RUNNING
//!   ├─► schedule "Stop" web  +3s                     ─► STOPPED
//!   ├─► schedule "Stop" cold +2s  (cold is STOPPED)  ─► error record
//!   ├─► RESTART db                   (jitter, settle) ─► STOPPED ─► RUNNING
//!   └─► destroy web                                  ─► retired
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=machinevisor=debug cargo run --example simulate
//! ```
//! Delay windows can be overridden with `MACHINEVISOR_JITTER_MS` / `MACHINEVISOR_SETTLE_MS`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use machinevisor::{
    Action, Config, DelayWindow, LogWriter, MachineService, Origin, Subscribe, TopicBroker,
    topic_for,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut cfg = Config::from_env()?;
    if std::env::var_os("MACHINEVISOR_JITTER_MS").is_none() {
        cfg.jitter = DelayWindow::from_millis(500, 1_500);
    }
    if std::env::var_os("MACHINEVISOR_SETTLE_MS").is_none() {
        cfg.settle = DelayWindow::from_millis(300, 800);
    }

    let topics = Arc::new(TopicBroker::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), topics.clone()];
    let svc = MachineService::builder(cfg).with_subscribers(subs).build();

    let web = svc.create_machine("web", "ana").await?;
    let db = svc.create_machine("db", "ana").await?;
    let cold = svc.create_machine("cold", "ana").await?;

    let mut db_updates = topics.subscribe(db.id);
    tokio::spawn(async move {
        while let Ok(status) = db_updates.recv().await {
            println!("[{}] {status}", topic_for(db.id));
        }
    });

    svc.request_transition(web.id, Action::Start, Origin::Direct).await?;
    svc.request_transition(db.id, Action::Start, Origin::Direct).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let now = Utc::now();
    svc.schedule_transition(web.id, now + chrono::Duration::seconds(3), "Stop")
        .await?;
    svc.schedule_transition(cold.id, now + chrono::Duration::seconds(2), "Stop")
        .await?;
    svc.schedule_transition(cold.id, now - chrono::Duration::seconds(1), "Start")
        .await?;
    svc.request_transition(db.id, Action::Restart, Origin::Direct).await?;
    tokio::time::sleep(Duration::from_secs(4)).await;

    println!("destroy web: {:?}", svc.destroy(web.id).await?);
    for m in svc.machines_by_owner("ana").await? {
        println!("{:>4} {:<6} {:<8} active={}", m.id, m.name, m.status, m.active);
    }
    for e in svc.errors_for(cold.id).await? {
        println!("error #{} machine={} action={} {}", e.id, e.machine, e.action, e.message);
    }

    svc.shutdown().await?;
    Ok(())
}
