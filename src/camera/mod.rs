mod builder;
mod capture;
mod control;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst_source;
mod health;
mod source;
mod test_pattern;

pub use builder::build_frame_source;
pub use capture::{next_state, BackoffPolicy, CaptureEvent, CaptureLoop, CaptureState};
pub use control::{CameraControl, RestartRequest};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst_source::GstFrameSource;
pub use health::{CameraStatus, CameraStatusSnapshot};
pub use source::{CameraDevice, FrameSource, UnavailableSource};
pub use test_pattern::TestPatternSource;
