use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Width every frame is configured to
pub const FRAME_WIDTH: u32 = 640;
/// Height every frame is configured to
pub const FRAME_HEIGHT: u32 = 480;

/// A captured RGB frame.
///
/// Pixels sit behind an `Arc` so publishing into the shared slot and taking
/// snapshots never copies the buffer. The buffer is never mutated once a
/// frame exists; anything that draws on it works on [`Frame::to_image`].
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture sequence number, increasing per capture loop
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Pixel data
    pub image: Arc<RgbImage>,
}

impl Frame {
    /// Create a new frame
    pub fn new(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        Self {
            id,
            timestamp,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Private, mutable copy of the pixels
    pub fn to_image(&self) -> RgbImage {
        self.image.as_ref().clone()
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Check if frame is older than specified duration
    pub fn is_older_than(&self, duration: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.timestamp)
            .map(|age| age > duration)
            .unwrap_or(false)
    }
}

/// All-black canvas used for placeholder frames
pub fn blank_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_image_is_a_private_copy() {
        let frame = Frame::new(1, SystemTime::now(), blank_image(4, 4));
        let mut copy = frame.to_image();
        copy.put_pixel(0, 0, Rgb([255, 255, 255]));

        assert_eq!(frame.image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(copy.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_frame_dimensions_and_age() {
        let frame = Frame::new(7, SystemTime::now(), blank_image(FRAME_WIDTH, FRAME_HEIGHT));

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert!(!frame.is_older_than(Duration::from_secs(60)));
        assert!(frame.age_ms() < 60_000);
    }
}
