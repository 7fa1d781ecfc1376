//! Supported image formats and their content types
//!
//! The extension table is shared by upload (which extensions may be stored)
//! and retrieval (which content type and encoder to answer with).

use image::ImageFormat;

/// Extension to content type table
const CONTENT_TYPES: &[(&str, ImageKind)] = &[
    ("jpg", ImageKind::Jpeg),
    ("jpeg", ImageKind::Jpeg),
    ("gif", ImageKind::Gif),
    ("png", ImageKind::Png),
];

/// Image format family served by this daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Gif,
    Png,
}

impl ImageKind {
    /// Look up a lowercase file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        CONTENT_TYPES
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, kind)| *kind)
    }

    /// MIME type sent as `Content-Type`
    pub fn content_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Png => "image/png",
        }
    }

    /// Codec used to re-encode images of this kind
    pub fn format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Gif => ImageFormat::Gif,
            ImageKind::Png => ImageFormat::Png,
        }
    }
}

/// All extensions accepted for upload, in table order
pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
    CONTENT_TYPES.iter().map(|(ext, _)| *ext)
}
