use crate::{
    config::StreamConfig,
    error::{Result, StreamError, WastebinError},
    pipeline::PipelineContext,
};
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    buzzer_status_handler, buzzer_update_handler, health_handler, index_handler,
    ml_status_handler, restart_camera_handler, sensor_data_handler, update_handler,
    video_feed_handler,
};

/// Build the HTTP routes over a pipeline context.
///
/// Every request starts the background pipeline if it is not running yet.
pub fn router(ctx: Arc<PipelineContext>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/video_feed", get(video_feed_handler))
        .route("/ml-status", get(ml_status_handler))
        .route("/restart-camera", get(restart_camera_handler))
        .route("/update", get(update_handler))
        .route("/sensor-data", get(sensor_data_handler))
        .route(
            "/buzzer",
            get(buzzer_status_handler).post(buzzer_update_handler),
        )
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&ctx),
            ensure_pipeline_started,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn ensure_pipeline_started(
    State(ctx): State<Arc<PipelineContext>>,
    request: Request,
    next: Next,
) -> Response {
    ctx.ensure_started();
    next.run(request).await
}

/// HTTP server for the video feed, status and telemetry endpoints
pub struct StreamServer {
    config: StreamConfig,
    ctx: Arc<PipelineContext>,
}

impl StreamServer {
    pub fn new(config: StreamConfig, ctx: Arc<PipelineContext>) -> Self {
        Self { config, ctx }
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_address();
        info!("Starting HTTP server on {}", addr);

        TcpListener::bind(&addr)
            .await
            .map_err(|e| StreamError::BindFailed {
                address: addr.clone(),
                source: e,
            })
            .map_err(WastebinError::from)
    }

    /// Serve on `listener` until `shutdown` is cancelled
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        if let Some(addr) = local {
            info!("HTTP server listening on {}", addr);
        }

        axum::serve(listener, router(Arc::clone(&self.ctx)))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| StreamError::ServerFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Stream server builder for configuration
pub struct StreamServerBuilder {
    config: Option<StreamConfig>,
    ctx: Option<Arc<PipelineContext>>,
}

impl StreamServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            ctx: None,
        }
    }

    /// Set the stream configuration
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the pipeline context served by the handlers
    pub fn context(mut self, ctx: Arc<PipelineContext>) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Build the stream server
    pub fn build(self) -> Result<StreamServer> {
        let ctx = self.ctx.ok_or_else(|| {
            WastebinError::Stream(StreamError::ServerFailed {
                details: "Pipeline context is required".to_string(),
            })
        })?;
        let config = self
            .config
            .unwrap_or_else(|| ctx.config.stream.clone());

        Ok(StreamServer::new(config, ctx))
    }
}

impl Default for StreamServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
