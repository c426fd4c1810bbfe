use crate::classifier::ClassificationSnapshot;
use crate::config::StreamConfig;
use crate::frame::{FRAME_HEIGHT, FRAME_WIDTH};
use crate::telemetry::SensorSnapshot;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::fs;
use tracing::{debug, error, warn};

pub const STARTING_TEXT: &str = "Starting camera...";
pub const NO_FRAME_TEXT: &str = "No frame available";
pub const ALERT_TEXT: &str = "ORGANIC DETECTED!";

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

const ALERT_BOX_THICKNESS: u32 = 3;

/// A line of text to draw, positioned by its top-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    /// Multiple of the configured font size
    pub scale: f32,
    pub color: Rgb<u8>,
    /// Darken the area behind the text
    pub backdrop: bool,
}

impl TextLine {
    fn new<S: Into<String>>(text: S, x: i32, y: i32, scale: f32, color: Rgb<u8>) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            scale,
            color,
            backdrop: false,
        }
    }

    fn with_backdrop(mut self) -> Self {
        self.backdrop = true;
        self
    }
}

/// Everything a session draws on one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationPlan {
    pub lines: Vec<TextLine>,
    pub alert_box: Option<Rect>,
}

impl AnnotationPlan {
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }

    pub fn has_alert(&self) -> bool {
        self.alert_box.is_some()
    }
}

/// Percent as text: whole values keep one decimal, others up to two
pub fn format_percent(percent: f64) -> String {
    let text = format!("{:.2}", percent);
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Annotations for a live frame
pub fn plan_live(
    classification: &ClassificationSnapshot,
    frame_count: u64,
    sensors: Option<&SensorSnapshot>,
) -> AnnotationPlan {
    let result = &classification.result;
    let mut lines = vec![
        TextLine::new(
            format!(
                "{} ({}%)",
                result.label,
                format_percent(result.confidence_percent())
            ),
            10,
            12,
            1.0,
            GREEN,
        )
        .with_backdrop(),
        TextLine::new(
            format!(
                "Next scan: {:.1}s",
                classification.time_until_next.as_secs_f64()
            ),
            10,
            44,
            0.8,
            WHITE,
        )
        .with_backdrop(),
        TextLine::new(format!("Frame: {}", frame_count), 10, 72, 0.7, WHITE).with_backdrop(),
    ];

    if let Some(sensors) = sensors.filter(|s| s.has_reading()) {
        lines.push(TextLine::new(sensors.summary(), 10, 96, 0.7, WHITE).with_backdrop());
    }

    let alert_box = if result.triggers_alert() {
        lines.push(TextLine::new(ALERT_TEXT, 150, 372, 1.5, RED));
        Some(Rect::at(50, 50).of_size(541, 381))
    } else {
        None
    };

    AnnotationPlan { lines, alert_box }
}

/// Annotations for the synthetic frame shown while no frame exists
pub fn plan_placeholder(camera_ready: bool) -> AnnotationPlan {
    let text = if camera_ready {
        NO_FRAME_TEXT
    } else {
        STARTING_TEXT
    };

    AnnotationPlan {
        lines: vec![TextLine::new(text, 200, 228, 1.0, WHITE)],
        alert_box: None,
    }
}

/// Draws annotation plans onto private frame copies
pub struct OverlayRenderer {
    font: Option<Font<'static>>,
    font_size: f32,
}

impl OverlayRenderer {
    /// Load the configured font, falling back to the bundled one
    pub fn from_config(config: &StreamConfig) -> Self {
        let font = fs::read(&config.font_path)
            .map_err(|e| format!("failed to read font file '{}': {}", config.font_path, e))
            .and_then(|data| {
                Font::try_from_vec(data)
                    .ok_or_else(|| format!("failed to parse font file '{}'", config.font_path))
            });

        match font {
            Ok(font) => {
                debug!("Overlay font loaded from {}", config.font_path);
                Self::new(Some(font), config.font_size)
            }
            Err(e) => {
                warn!("{}, using bundled overlay font", e);
                Self::bundled(config.font_size)
            }
        }
    }

    /// Renderer using the font compiled into the binary
    pub fn bundled(font_size: f32) -> Self {
        let font = bundled_font();
        if font.is_none() {
            error!("Bundled overlay font is unreadable, overlay text disabled");
        }
        Self::new(font, font_size)
    }

    pub fn new(font: Option<Font<'static>>, font_size: f32) -> Self {
        Self { font, font_size }
    }

    /// Whether text lines are drawn, reported by `/health`
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, image: &mut RgbImage, plan: &AnnotationPlan) {
        if let Some(rect) = plan.alert_box {
            draw_thick_rect(image, rect, ALERT_BOX_THICKNESS, RED);
        }

        let Some(font) = self.font.as_ref() else {
            return;
        };

        for line in &plan.lines {
            let scale = Scale::uniform(self.font_size * line.scale);
            if line.backdrop {
                let (w, h) = text_size(scale, font, &line.text);
                darken(image, line.x - 4, line.y - 4, w + 8, h + 8);
            }
            draw_text_mut(image, line.color, line.x, line.y, scale, font, &line.text);
        }
    }
}

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// DejaVu Sans, compiled in so overlay text never depends on the host
pub fn bundled_font() -> Option<Font<'static>> {
    Font::try_from_bytes(BUNDLED_FONT)
}

/// Blank frame at the configured size
pub fn placeholder_image() -> RgbImage {
    crate::frame::blank_image(FRAME_WIDTH, FRAME_HEIGHT)
}

fn draw_thick_rect(image: &mut RgbImage, rect: Rect, thickness: u32, color: Rgb<u8>) {
    for inset in 0..thickness {
        let width = rect.width().saturating_sub(2 * inset);
        let height = rect.height().saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let inner = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(image, inner, color);
    }
}

fn darken(image: &mut RgbImage, x: i32, y: i32, width: i32, height: i32) {
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = ((x + width).max(0) as u32).min(image.width());
    let y1 = ((y + height).max(0) as u32).min(image.height());

    for py in y0..y1 {
        for px in x0..x1 {
            let pixel = image.get_pixel_mut(px, py);
            *pixel = Rgb([pixel[0] / 3, pixel[1] / 3, pixel[2] / 3]);
        }
    }
}
