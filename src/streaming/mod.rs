mod encode;
mod handlers;
mod overlay;
mod server;
mod session;
mod stats;

pub use encode::{mjpeg_content_type, multipart_part, FrameEncoder, MJPEG_BOUNDARY};
pub use handlers::{MlStatus, SensorData};
pub use overlay::{
    bundled_font, format_percent, placeholder_image, plan_live, plan_placeholder, AnnotationPlan,
    OverlayRenderer, TextLine, ALERT_TEXT, NO_FRAME_TEXT, STARTING_TEXT,
};
pub use server::{router, StreamServer, StreamServerBuilder};
pub use session::StreamSession;
pub use stats::{ActiveSession, StreamStats, StreamStatsSnapshot};
