//! Fan-out work queue.
//!
//! Ingestion enqueues one job per accepted event and returns immediately;
//! a single background worker drains the queue in order. Sequential
//! processing is what gives viewers per-connection FIFO delivery in
//! acceptance order. Push dispatch is detached from the worker loop so
//! slow push I/O never delays the next broadcast.

use sentinel_store::{event_stats, today_start_timestamp, EventRecord};
use sentinel_types::EventKind;
use tokio::sync::mpsc;

use crate::api_ws::EventView;
use crate::AppState;

/// Queue depth. Ingestion drops fan-out jobs (with a warning) beyond
/// this; persistence is unaffected.
pub const FANOUT_QUEUE_CAPACITY: usize = 1024;

/// One accepted event, ready for broadcast and (maybe) push dispatch.
#[derive(Debug)]
pub struct FanoutJob {
    /// The persisted event.
    pub event: EventRecord,
    /// Display name of the referenced employee, resolved at ingestion.
    pub employee_name: Option<String>,
}

/// Creates the fan-out queue pair.
pub fn fanout_channel() -> (mpsc::Sender<FanoutJob>, mpsc::Receiver<FanoutJob>) {
    mpsc::channel(FANOUT_QUEUE_CAPACITY)
}

/// Drains the fan-out queue until every sender is dropped.
///
/// Runs as a detached task for the lifetime of the process. Errors are
/// logged and never propagate; a failed fan-out has no effect on the
/// ingestion call that produced it.
pub async fn run_worker(state: AppState, mut rx: mpsc::Receiver<FanoutJob>) {
    tracing::info!("fan-out worker started");

    while let Some(job) = rx.recv().await {
        process_job(&state, job).await;
    }

    tracing::info!("fan-out worker stopped");
}

async fn process_job(state: &AppState, job: FanoutJob) {
    let FanoutJob {
        event,
        employee_name,
    } = job;

    // Today's stats ride along with the broadcast frame so dashboards
    // update their counters without polling.
    let stats = {
        let pool = state.pool.clone();
        let since = today_start_timestamp();
        let result = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| e.to_string())?;
            event_stats(&conn, since).map_err(|e| e.to_string())
        })
        .await;

        match result {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                tracing::warn!("failed to compute stats for broadcast: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("stats task join error: {}", e);
                None
            }
        }
    };

    let view = EventView::from_record(&event, employee_name.clone());
    state.viewers.broadcast_event(view, stats).await;

    // Push dispatch only for alert-worthy kinds, detached so the next
    // queued broadcast is not held behind push-service round trips.
    if let Some(kind) = EventKind::from_tag(&event.event_type) {
        if kind.alert_template().is_some() {
            let dispatcher = state.dispatcher.clone();
            let details = employee_name
                .or(event.license_plate)
                .unwrap_or_default();
            let event_id = event.id;

            tokio::spawn(async move {
                dispatcher.send_alert(kind, &details, Some(event_id)).await;
            });
        }
    }
}
