use super::encode::mjpeg_content_type;
use super::session::StreamSession;
use crate::error::WastebinError;
use crate::events::PipelineEvent;
use crate::pipeline::PipelineContext;
use crate::telemetry::SensorSnapshot;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, info, warn};

/// Body of `/ml-status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlStatus {
    pub ml_loaded: bool,
    pub camera_available: bool,
    pub camera_ready: bool,
    pub ml_running: bool,
    pub current_prediction: String,
    /// Percent, two decimals
    pub confidence: f64,
    pub wet_detected: bool,
    /// Seconds
    pub time_until_next_scan: f64,
    pub has_frame: bool,
}

/// Body of `/sensor-data`
#[derive(Debug, Clone, Serialize)]
pub struct SensorData {
    #[serde(flatten)]
    pub sensors: SensorSnapshot,
    pub ml_prediction: String,
    pub ml_confidence: f64,
    pub ml_wet_detected: bool,
    pub ml_alert: bool,
}

#[derive(Debug, Deserialize)]
pub struct BuzzerForm {
    state: Option<String>,
}

/// Handler for the MJPEG endpoint
pub async fn video_feed_handler(State(ctx): State<Arc<PipelineContext>>) -> impl IntoResponse {
    let session = StreamSession::open(Arc::clone(&ctx), ctx.shutdown_token().child_token());
    info!("New video feed client connected (session {})", session.id());

    (
        [
            (header::CONTENT_TYPE, mjpeg_content_type()),
            (header::CACHE_CONTROL, "no-cache, private".to_string()),
            (header::PRAGMA, "no-cache".to_string()),
        ],
        Body::from_stream(session.into_stream()),
    )
}

/// Handler for classifier and camera status
pub async fn ml_status_handler(State(ctx): State<Arc<PipelineContext>>) -> Json<MlStatus> {
    let classification = ctx.classification.snapshot();

    Json(MlStatus {
        ml_loaded: ctx.ml_loaded(),
        camera_available: ctx.camera_status.is_available(),
        camera_ready: ctx.readiness.is_set(),
        ml_running: ctx.classification.is_running(),
        current_prediction: classification.result.label.clone(),
        confidence: classification.result.confidence_percent(),
        wet_detected: classification.result.is_wet,
        time_until_next_scan: classification.time_until_next.as_secs_f64(),
        has_frame: ctx.slot.has_frame(),
    })
}

/// Handler asking the capture loop to release and reopen the camera
pub async fn restart_camera_handler(
    State(ctx): State<Arc<PipelineContext>>,
) -> impl IntoResponse {
    let _ = ctx.event_bus.publish(PipelineEvent::CameraRestartRequested {
        timestamp: SystemTime::now(),
    });

    let (status, message) = match ctx
        .camera_control
        .restart(ctx.config.stream.restart_timeout())
        .await
    {
        Ok(()) => (StatusCode::OK, "Camera restarted successfully".to_string()),
        Err(WastebinError::Device(e)) => {
            warn!("Camera restart failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to restart camera".to_string(),
            )
        }
        Err(e) => {
            error!("Camera restart error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e))
        }
    };

    (status, Json(serde_json::json!({ "status": message })))
}

/// Handler for telemetry pushed by the bin controller
pub async fn update_handler(
    State(ctx): State<Arc<PipelineContext>>,
    Query(params): Query<HashMap<String, String>>,
) -> &'static str {
    ctx.sensors.update(SensorSnapshot::from_params(&params));
    "OK"
}

/// Handler for the latest telemetry plus classification
pub async fn sensor_data_handler(State(ctx): State<Arc<PipelineContext>>) -> Json<SensorData> {
    let result = ctx.classification.latest();

    Json(SensorData {
        sensors: ctx.sensors.snapshot(),
        ml_alert: result.triggers_alert(),
        ml_confidence: result.confidence_percent(),
        ml_wet_detected: result.is_wet,
        ml_prediction: result.label,
    })
}

pub async fn buzzer_status_handler(State(ctx): State<Arc<PipelineContext>>) -> impl IntoResponse {
    Json(serde_json::json!({ "stop": ctx.sensors.buzzer_muted() }))
}

pub async fn buzzer_update_handler(
    State(ctx): State<Arc<PipelineContext>>,
    form: Option<Form<BuzzerForm>>,
) -> &'static str {
    let state = form.and_then(|Form(f)| f.state);
    ctx.sensors.apply_buzzer(state.as_deref());
    "OK"
}

/// Handler for health check endpoint
pub async fn health_handler(State(ctx): State<Arc<PipelineContext>>) -> impl IntoResponse {
    let slot = ctx.slot.stats();
    let camera = ctx.camera_status.snapshot();

    let health_info = serde_json::json!({
        "status": "healthy",
        "pipeline_started": ctx.is_started(),
        "frame_slot": {
            "frames_published": slot.frames_published,
            "snapshots_taken": slot.snapshots_taken,
            "latest_frame_id": slot.latest_frame_id,
        },
        "camera": {
            "available": camera.available,
            "state": camera.state,
            "frames_captured": camera.frames_captured,
            "read_failures": camera.read_failures,
            "open_attempts": camera.open_attempts,
        },
        "streams": ctx.stream_stats.snapshot(),
        "overlay": {
            "text_enabled": ctx.renderer.has_font(),
            "jpeg_quality": ctx.encoder.quality(),
        },
        "server_info": {
            "subscribers": ctx.event_bus.subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}

/// Dashboard page showing the live feed and latest readings
pub async fn index_handler() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Smart Bin Monitor</title>
    <style>
        :root { color-scheme: dark; }
        body { margin: 0; font-family: sans-serif; background: #111; color: #eee; }
        main { display: flex; flex-wrap: wrap; gap: 1rem; padding: 1rem; }
        img.stream { max-width: 640px; width: 100%; background: #000; }
        table { border-collapse: collapse; }
        td { padding: 0.25rem 0.75rem; border-bottom: 1px solid #333; }
        .alert { color: #f44; font-weight: bold; }
    </style>
</head>
<body>
<main>
    <img class="stream" src="/video_feed" alt="Bin camera">
    <section>
        <table id="readings"></table>
        <p id="alert" class="alert"></p>
        <button onclick="fetch('/restart-camera')">Restart camera</button>
        <button onclick="buzzer('stop')">Mute buzzer</button>
        <button onclick="buzzer('start')">Unmute buzzer</button>
    </section>
</main>
<script>
    function buzzer(state) {
        fetch('/buzzer', { method: 'POST', body: new URLSearchParams({ state }) });
    }
    async function refresh() {
        try {
            const data = await (await fetch('/sensor-data')).json();
            const keys = ['gas', 'moisture', 'distance', 'wet', 'full', 'fill', 'status',
                          'ml_prediction', 'ml_confidence'];
            document.getElementById('readings').innerHTML =
                keys.map(k => `<tr><td>${k}</td><td>${data[k]}</td></tr>`).join('');
            document.getElementById('alert').textContent =
                data.ml_alert ? 'Organic waste detected' : '';
        } catch (e) {}
    }
    setInterval(refresh, 2000);
    refresh();
</script>
</body>
</html>
"#,
    )
}
