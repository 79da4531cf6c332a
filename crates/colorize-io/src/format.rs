use crate::error::IoError;

/// Image container formats understood by the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG / JFIF.
    #[cfg_attr(feature = "serde", serde(alias = "jpg"))]
    Jpeg,
    /// Windows bitmap.
    Bmp,
    /// Tagged Image File Format.
    Tiff,
    /// WebP, lossy or lossless.
    WebP,
}

impl ImageFormat {
    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::WebP => "webp",
        }
    }

    /// MIME type of the container.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Look up a format from a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" | "jpe" => Some(ImageFormat::Jpeg),
            "bmp" => Some(ImageFormat::Bmp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Whether the codec can write this format.
    pub fn can_encode(&self) -> bool {
        matches!(self, ImageFormat::Png | ImageFormat::Jpeg)
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFormat::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| IoError::UnsupportedFormat(s.to_string()))
    }
}

/// Detect the container format from the leading magic bytes.
///
/// The declared content type or file name is never consulted.
///
/// # Errors
///
/// * [`IoError::UnsupportedFormat`] when the signature belongs to a container this codec does
///   not handle, e.g. GIF.
/// * [`IoError::UnknownFormat`] when no known signature matches.
///
/// # Example
///
/// ```
/// use colorize_io::{format::sniff_format, ImageFormat};
///
/// let header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
/// assert_eq!(sniff_format(&header).unwrap(), ImageFormat::Png);
/// ```
pub fn sniff_format(bytes: &[u8]) -> Result<ImageFormat, IoError> {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => Ok(ImageFormat::Png),
        Ok(image::ImageFormat::Jpeg) => Ok(ImageFormat::Jpeg),
        Ok(image::ImageFormat::Bmp) => Ok(ImageFormat::Bmp),
        Ok(image::ImageFormat::Tiff) => Ok(ImageFormat::Tiff),
        Ok(image::ImageFormat::WebP) => Ok(ImageFormat::WebP),
        Ok(other) => Err(IoError::UnsupportedFormat(format!("{other:?}").to_lowercase())),
        Err(_) => Err(IoError::UnknownFormat),
    }
}
