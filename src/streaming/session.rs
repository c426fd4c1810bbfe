use super::encode::multipart_part;
use super::overlay::{placeholder_image, plan_live, plan_placeholder, AnnotationPlan};
use super::stats::ActiveSession;
use crate::error::EncodingError;
use crate::events::PipelineEvent;
use crate::frame::Frame;
use crate::pipeline::PipelineContext;
use bytes::Bytes;
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace};

/// One viewer's MJPEG stream.
///
/// Works only on snapshots of the shared state; annotation and encoding run
/// on the blocking pool against a private copy of the frame.
pub struct StreamSession {
    id: u64,
    ctx: Arc<PipelineContext>,
    cancel: CancellationToken,
    frame_delay: Duration,
    placeholder_interval: Duration,
    frame_count: u64,
    last_frame_id: Option<u64>,
    last_emit: Option<Instant>,
    _active: ActiveSession,
}

/// What the session decided to send on one iteration
enum Emission {
    Live(Frame, AnnotationPlan),
    Placeholder(AnnotationPlan),
}

impl StreamSession {
    /// Open a session; it ends when `cancel` fires or the stream is dropped
    pub fn open(ctx: Arc<PipelineContext>, cancel: CancellationToken) -> Self {
        let (id, active) = ctx.stream_stats.open_session();
        info!(
            "Stream session {} opened ({} active)",
            id,
            ctx.stream_stats.active_sessions()
        );

        Self {
            id,
            frame_delay: ctx.config.camera.frame_delay(),
            placeholder_interval: ctx.config.stream.placeholder_interval(),
            ctx,
            cancel,
            frame_count: 0,
            last_frame_id: None,
            last_emit: None,
            _active: active,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Endless stream of multipart parts
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, axum::Error>> + Send + 'static {
        let guard: DropGuard = self.cancel.clone().drop_guard();

        async_stream::stream! {
            let _guard = guard;
            let mut session = self;

            loop {
                if session.cancel.is_cancelled() {
                    break;
                }

                let (emission, delay) = match session.next_emission() {
                    Some(next) => next,
                    None => {
                        tokio::select! {
                            _ = session.cancel.cancelled() => break,
                            _ = tokio::time::sleep(session.frame_delay) => continue,
                        }
                    }
                };

                match session.render(emission).await {
                    Ok(jpeg) => {
                        let part = multipart_part(&jpeg);
                        session.ctx.stream_stats.record_part(part.len());
                        trace!("Session {} sent {} bytes", session.id, part.len());
                        yield Ok::<_, axum::Error>(part);
                    }
                    Err(e) => {
                        error!("Error generating frame for session {}: {}", session.id, e);
                        session.ctx.stream_stats.record_encode_error();
                        let _ = session.ctx.event_bus.publish(PipelineEvent::SystemError {
                            component: "stream_session".to_string(),
                            error: e.to_string(),
                        });
                    }
                }
                session.last_emit = Some(Instant::now());

                tokio::select! {
                    _ = session.cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            info!("Stream session {} closed", session.id);
        }
    }

    /// Decide what to send now, if anything, and how long to wait afterwards.
    ///
    /// A live frame goes out when it is newer than the last one sent, or when
    /// the placeholder interval has passed so the countdown keeps moving.
    fn next_emission(&mut self) -> Option<(Emission, Duration)> {
        let Some(frame) = self.ctx.slot.snapshot() else {
            let plan = plan_placeholder(self.ctx.readiness.is_set());
            return Some((Emission::Placeholder(plan), self.placeholder_interval));
        };

        let newer = self.last_frame_id.map_or(true, |id| frame.id != id);
        let overdue = self
            .last_emit
            .map_or(true, |at| at.elapsed() >= self.placeholder_interval);
        if !newer && !overdue {
            return None;
        }

        self.frame_count += 1;
        self.last_frame_id = Some(frame.id);

        let sensors = self.ctx.sensors.snapshot();
        let plan = plan_live(
            &self.ctx.classification.snapshot(),
            self.frame_count,
            Some(&sensors),
        );
        Some((Emission::Live(frame, plan), self.frame_delay))
    }

    async fn render(&self, emission: Emission) -> Result<Vec<u8>, EncodingError> {
        let renderer = Arc::clone(&self.ctx.renderer);
        let encoder = self.ctx.encoder;

        tokio::task::spawn_blocking(move || {
            let (mut image, plan) = match emission {
                Emission::Live(frame, plan) => {
                    debug!("Annotating frame {}", frame.id);
                    (frame.to_image(), plan)
                }
                Emission::Placeholder(plan) => (placeholder_image(), plan),
            };
            renderer.render(&mut image, &plan);
            encoder.encode(&image)
        })
        .await
        .map_err(|e| EncodingError::Worker {
            details: e.to_string(),
        })?
    }
}
