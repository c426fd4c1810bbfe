use crate::error::EncodingError;
use bytes::{BufMut, Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};

/// Multipart boundary used by `/video_feed`
pub const MJPEG_BOUNDARY: &str = "frame";

/// Content type announced for the MJPEG stream
pub fn mjpeg_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", MJPEG_BOUNDARY)
}

/// JPEG encoder for annotated frames
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, EncodingError> {
        let mut output = Vec::with_capacity(image.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut output, self.quality)
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .map_err(|e| EncodingError::Jpeg {
                details: e.to_string(),
            })?;
        Ok(output)
    }
}

/// Wrap one JPEG as a multipart part
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        MJPEG_BOUNDARY,
        jpeg.len()
    );

    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}
