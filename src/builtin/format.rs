//! Extension-based format guesses shared by the built-in plugins.
//!
//! Nothing here looks at file contents.

use serde::{Deserialize, Serialize};

/// Image formats recognised by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Webp,
    Heic,
    Svg,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 8] = [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Gif,
        ImageFormat::Bmp,
        ImageFormat::Tiff,
        ImageFormat::Webp,
        ImageFormat::Heic,
        ImageFormat::Svg,
    ];

    /// Guess from a lowercase extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "bmp" | "dib" => Some(ImageFormat::Bmp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "webp" => Some(ImageFormat::Webp),
            "heic" | "heif" => Some(ImageFormat::Heic),
            "svg" => Some(ImageFormat::Svg),
            _ => None,
        }
    }

    /// Parse the name produced by [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Webp => "WEBP",
            ImageFormat::Heic => "HEIC",
            ImageFormat::Svg => "SVG",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Heic => "image/heic",
            ImageFormat::Svg => "image/svg+xml",
        }
    }

    /// Typical color space for the format.
    pub fn color_space(self) -> &'static str {
        match self {
            ImageFormat::Jpeg | ImageFormat::Webp | ImageFormat::Heic => "YCbCr",
            ImageFormat::Png => "RGB/RGBA",
            ImageFormat::Gif => "Indexed",
            ImageFormat::Bmp | ImageFormat::Svg => "RGB",
            ImageFormat::Tiff => "RGB/CMYK",
        }
    }

    pub fn is_lossy(self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::Webp | ImageFormat::Heic)
    }

    pub fn is_vector(self) -> bool {
        self == ImageFormat::Svg
    }

    pub fn supports_transparency(self) -> bool {
        matches!(
            self,
            ImageFormat::Png
                | ImageFormat::Gif
                | ImageFormat::Webp
                | ImageFormat::Tiff
                | ImageFormat::Heic
                | ImageFormat::Svg
        )
    }

    pub fn supports_animation(self) -> bool {
        matches!(self, ImageFormat::Gif | ImageFormat::Webp)
    }
}

/// MIME type guess for any file extension.
pub fn mime_type(ext: &str) -> &'static str {
    if let Some(format) = ImageFormat::from_extension(ext) {
        return format.mime_type();
    }
    match ext {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Human-readable byte count, binary units.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
