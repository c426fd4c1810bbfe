use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WastebinConfig {
    pub camera: CameraConfig,
    pub classifier: ClassifierConfig,
    pub stream: StreamConfig,
    pub system: SystemConfig,
}

/// Which frame source drives the capture loop
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// V4L2 device through GStreamer
    Device,
    /// Synthetic moving gradient, no hardware needed
    TestPattern,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Frame source implementation
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,

    /// Delay after a successful read
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,

    /// Delay after a failed read
    #[serde(default = "default_read_retry_ms")]
    pub read_retry_ms: u64,

    /// Delay between attempts to open the device
    #[serde(default = "default_reopen_backoff_ms")]
    pub reopen_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// ONNX model file; a missing file selects the mock classifier
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Square input edge the model expects
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Seconds between classifications
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Sleep between interval checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long the first classification waits for the camera
    #[serde(default = "default_readiness_timeout_seconds")]
    pub readiness_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// IP address to bind to
    #[serde(default = "default_stream_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Pacing of placeholder frames while no camera frame exists
    #[serde(default = "default_placeholder_interval_ms")]
    pub placeholder_interval_ms: u64,

    /// JPEG quality for streamed frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Path to TrueType font file for overlay text
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Base font size for overlay text
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// How long /restart-camera waits for the capture loop
    #[serde(default = "default_restart_timeout_seconds")]
    pub restart_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Start the background loops at boot instead of on the first request
    #[serde(default = "default_eager_start")]
    pub eager_start: bool,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl CameraConfig {
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn read_retry(&self) -> Duration {
        Duration::from_millis(self.read_retry_ms)
    }

    pub fn reopen_backoff(&self) -> Duration {
        Duration::from_millis(self.reopen_backoff_ms)
    }
}

impl ClassifierConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_seconds)
    }
}

impl StreamConfig {
    pub fn placeholder_interval(&self) -> Duration {
        Duration::from_millis(self.placeholder_interval_ms)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_seconds)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl WastebinConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("wastebin.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.backend", "device")?
            .set_default("camera.frame_delay_ms", default_frame_delay_ms() as i64)?
            .set_default("camera.read_retry_ms", default_read_retry_ms() as i64)?
            .set_default("camera.reopen_backoff_ms", default_reopen_backoff_ms() as i64)?
            .set_default("classifier.model_path", default_model_path())?
            .set_default("classifier.input_size", default_input_size())?
            .set_default("classifier.interval_seconds", default_interval_seconds() as i64)?
            .set_default("classifier.poll_interval_ms", default_poll_interval_ms() as i64)?
            .set_default(
                "classifier.readiness_timeout_seconds",
                default_readiness_timeout_seconds() as i64,
            )?
            .set_default("stream.ip", default_stream_ip())?
            .set_default("stream.port", default_stream_port())?
            .set_default(
                "stream.placeholder_interval_ms",
                default_placeholder_interval_ms() as i64,
            )?
            .set_default("stream.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("stream.font_path", default_font_path())?
            .set_default("stream.font_size", default_font_size() as f64)?
            .set_default(
                "stream.restart_timeout_seconds",
                default_restart_timeout_seconds() as i64,
            )?
            .set_default("system.eager_start", default_eager_start())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. WASTEBIN__STREAM__PORT=8080
            .add_source(
                Environment::with_prefix("WASTEBIN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: WastebinConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.classifier.interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Classifier interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.classifier.input_size == 0 {
            return Err(ConfigError::Message(
                "Classifier input_size must be greater than 0".to_string(),
            ));
        }

        if self.classifier.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Classifier poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.stream.jpeg_quality == 0 || self.stream.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Stream jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.stream.ip.trim().is_empty() {
            return Err(ConfigError::Message(
                "Stream ip must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for WastebinConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                backend: default_camera_backend(),
                frame_delay_ms: default_frame_delay_ms(),
                read_retry_ms: default_read_retry_ms(),
                reopen_backoff_ms: default_reopen_backoff_ms(),
            },
            classifier: ClassifierConfig {
                model_path: default_model_path(),
                input_size: default_input_size(),
                interval_seconds: default_interval_seconds(),
                poll_interval_ms: default_poll_interval_ms(),
                readiness_timeout_seconds: default_readiness_timeout_seconds(),
            },
            stream: StreamConfig {
                ip: default_stream_ip(),
                port: default_stream_port(),
                placeholder_interval_ms: default_placeholder_interval_ms(),
                jpeg_quality: default_jpeg_quality(),
                font_path: default_font_path(),
                font_size: default_font_size(),
                restart_timeout_seconds: default_restart_timeout_seconds(),
            },
            system: SystemConfig {
                eager_start: default_eager_start(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_backend() -> CameraBackend {
    CameraBackend::Device
}
fn default_frame_delay_ms() -> u64 {
    33
}
fn default_read_retry_ms() -> u64 {
    1000
}
fn default_reopen_backoff_ms() -> u64 {
    2000
}

fn default_model_path() -> String {
    "waste_detection_model.onnx".to_string()
}
fn default_input_size() -> u32 {
    224
}
fn default_interval_seconds() -> u64 {
    5
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_readiness_timeout_seconds() -> u64 {
    10
}

fn default_stream_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_port() -> u16 {
    5000
}
fn default_placeholder_interval_ms() -> u64 {
    500
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    20.0
}
fn default_restart_timeout_seconds() -> u64 {
    5
}

fn default_eager_start() -> bool {
    false
}
fn default_event_bus_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = WastebinConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.classifier.interval(), Duration::from_secs(5));
        assert_eq!(config.classifier.readiness_timeout(), Duration::from_secs(10));
        assert_eq!(config.stream.placeholder_interval(), Duration::from_millis(500));
        assert_eq!(config.camera.frame_delay(), Duration::from_millis(33));
    }

    #[test]
    fn test_config_validation() {
        let mut config = WastebinConfig::default();
        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());

        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.stream.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.stream.jpeg_quality = 90;
        config.classifier.interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
backend = "test_pattern"
fps = 15

[stream]
port = 8088
"#
        )
        .unwrap();

        let config = WastebinConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.backend, CameraBackend::TestPattern);
        assert_eq!(config.camera.fps, 15);
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.stream.port, 8088);
        assert_eq!(config.classifier.interval_seconds, 5);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = WastebinConfig::load_from_file("/nonexistent/wastebin-test.toml").unwrap();

        assert_eq!(config.camera.backend, CameraBackend::Device);
        assert_eq!(config.stream.port, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_renders_all_sections() {
        let rendered = WastebinConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[camera]"));
        assert!(rendered.contains("[classifier]"));
        assert!(rendered.contains("[stream]"));
        assert!(rendered.contains("interval_seconds = 5"));
    }
}
