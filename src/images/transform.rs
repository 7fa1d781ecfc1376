//! Retrieval pipeline: decode, optional resize, re-encode
//!
//! Output is always encoded in the format named by the identifier's
//! extension, whatever the stored bytes turn out to be.

use std::io::Cursor;

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame, ImageError};
use thiserror::Error;

use super::format::ImageKind;

/// JPEG quality used when the request does not name one
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Query parameter parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("faild to parse quality")]
    Quality,

    #[error("faild to parse scale")]
    Scale,
}

/// Transform errors
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{0}")]
    Decode(ImageError),

    #[error("{0}")]
    Encode(ImageError),

    #[error("scale is out of range")]
    TooLarge { width: u32, height: u32 },
}

/// Parsed `s` and `q` query parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Resize factor; `None` serves the original dimensions
    pub scale: Option<f64>,
    /// JPEG quality 1..=100
    pub quality: u8,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            scale: None,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl RetrievalParams {
    /// Parse raw query values for an image of the given kind.
    ///
    /// Quality is only read for JPEG; other kinds ignore it even when
    /// malformed. Scale `<= 0` or absent means no resize.
    pub fn parse(
        kind: ImageKind,
        scale: Option<&str>,
        quality: Option<&str>,
    ) -> Result<Self, ParamError> {
        let quality = match quality.filter(|q| !q.is_empty()) {
            Some(raw) if kind == ImageKind::Jpeg => {
                let q: i64 = raw.parse().map_err(|_| ParamError::Quality)?;
                q.clamp(1, 100) as u8
            }
            _ => DEFAULT_JPEG_QUALITY,
        };

        let scale = match scale.filter(|s| !s.is_empty()) {
            Some(raw) => {
                let s: f64 = raw.parse().map_err(|_| ParamError::Scale)?;
                if !s.is_finite() {
                    return Err(ParamError::Scale);
                }
                (s > 0.0).then_some(s)
            }
            None => None,
        };

        Ok(Self { scale, quality })
    }
}

/// Target size for a scale factor, rounded, never below 1px
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let scale_edge = |edge: u32| ((edge as f64 * scale).round() as u32).max(1);
    (scale_edge(width), scale_edge(height))
}

/// Decode stored bytes, apply `params`, and encode as `kind`.
///
/// `max_dimension` bounds the largest edge a resize may produce.
pub fn render(
    data: &[u8],
    kind: ImageKind,
    params: &RetrievalParams,
    max_dimension: u32,
) -> Result<Vec<u8>, TransformError> {
    let img = image::load_from_memory(data).map_err(TransformError::Decode)?;

    let img = match params.scale {
        Some(scale) => {
            let (width, height) = scaled_dimensions(img.width(), img.height(), scale);
            if width > max_dimension || height > max_dimension {
                return Err(TransformError::TooLarge { width, height });
            }
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
        None => img,
    };

    encode(&img, kind, params.quality)
}

/// Encode an image; JPEG drops alpha, GIF writes a single frame
pub fn encode(img: &DynamicImage, kind: ImageKind, quality: u8) -> Result<Vec<u8>, TransformError> {
    let mut buf = Vec::new();

    match kind {
        ImageKind::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            img.to_rgb8()
                .write_with_encoder(encoder)
                .map_err(TransformError::Encode)?;
        }
        ImageKind::Gif => {
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .encode_frame(Frame::new(img.to_rgba8()))
                .map_err(TransformError::Encode)?;
        }
        ImageKind::Png => {
            img.write_to(&mut Cursor::new(&mut buf), kind.format())
                .map_err(TransformError::Encode)?;
        }
    }

    Ok(buf)
}
