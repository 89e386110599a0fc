/// Operator status page (JSON)
use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let index_len = state.index.read().await.len();

    let (counts, active) = {
        let transcodes = state.transcodes.lock().await;
        let counts = transcodes.counts();
        let active = transcodes.active().map(|record| {
            json!({
                "source": record.source,
                "out_time_ms": record.out_time_ms,
                "speed": record.speed,
                "percent": record.progress_percent(),
            })
        });
        (counts, active)
    };

    let probe_failures: Vec<Value> = {
        let probes = state.probes.lock().await;
        probes
            .failures()
            .into_iter()
            .map(|(file, error)| json!({ "file": file, "error": error }))
            .collect()
    };

    Json(json!({
        "books": index_len,
        "queue_depth": state.jobs.depth(),
        "transcodes": {
            "pending": counts.pending,
            "working": counts.working,
            "done": counts.done,
            "failed": counts.failed,
        },
        "active": active,
        "probe_failures": probe_failures,
        "roots": state.roots.as_ref(),
    }))
}
