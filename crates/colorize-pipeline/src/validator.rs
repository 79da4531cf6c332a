use colorize_io::{format::sniff_format, functional::decode_image_size, ImageFormat, IoError};

use crate::error::InvalidUpload;

/// Default maximum upload size, 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Default maximum width and height in pixels.
///
/// Colorizing keeps roughly 18 bytes per pixel alive, so a 4096x4096 image needs about
/// 300 MB while it is processed.
pub const DEFAULT_MAX_DIMENSION: usize = 4096;

/// Longest sanitized file stem kept.
const MAX_STEM_CHARS: usize = 100;

/// Constraints enforced on every upload.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadLimits {
    /// Maximum size of the upload in bytes.
    pub max_bytes: u64,
    /// Maximum image width in pixels.
    pub max_width: usize,
    /// Maximum image height in pixels.
    pub max_height: usize,
    /// Accepted image formats, both as content and as file name extension.
    pub allowed_formats: Vec<ImageFormat>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            allowed_formats: vec![
                ImageFormat::Png,
                ImageFormat::Jpeg,
                ImageFormat::Bmp,
                ImageFormat::Tiff,
            ],
        }
    }
}

/// An upload that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedUpload {
    /// The format the content will be stored as.
    pub format: ImageFormat,
    /// Whether `format` comes from the magic bytes rather than the file name.
    pub sniffed: bool,
    /// Sanitized file name, with the extension of `format`.
    pub filename: String,
    /// The file name as sent by the client.
    pub original_filename: String,
    /// Size of the content in bytes.
    pub size_bytes: u64,
    /// Content type derived from `format`, never the declared header.
    pub content_type: String,
}

/// Check an upload against the limits.
///
/// The content type is decided by the magic bytes; the declared content type is only logged.
/// When the bytes carry no known signature the upload is accepted under the file name
/// extension and decoding decides later. Validation has no side effects, so the same input
/// always yields the same decision.
///
/// # Arguments
///
/// * `bytes` - The uploaded content.
/// * `declared_content_type` - The content type announced by the client, if any.
/// * `size_bytes` - The size announced by the client.
/// * `filename` - The file name announced by the client.
/// * `limits` - The constraints to enforce.
pub fn validate(
    bytes: &[u8],
    declared_content_type: Option<&str>,
    size_bytes: u64,
    filename: &str,
    limits: &UploadLimits,
) -> Result<ValidatedUpload, InvalidUpload> {
    let received = bytes.len() as u64;
    if received == 0 {
        return Err(InvalidUpload::Empty);
    }

    let size = received.max(size_bytes);
    if size > limits.max_bytes {
        return Err(InvalidUpload::TooLarge {
            size,
            max: limits.max_bytes,
        });
    }
    if size_bytes != received {
        return Err(InvalidUpload::SizeMismatch {
            declared: size_bytes,
            received,
        });
    }

    let (stem, extension) = split_filename(filename).ok_or(InvalidUpload::MissingFilename)?;
    let extension_format = ImageFormat::from_extension(&extension)
        .filter(|f| limits.allowed_formats.contains(f))
        .ok_or_else(|| InvalidUpload::DisallowedExtension(extension.clone()))?;

    let (format, sniffed) = match sniff_format(bytes) {
        Ok(format) if limits.allowed_formats.contains(&format) => (format, true),
        Ok(format) => return Err(InvalidUpload::UnsupportedType(format.to_string())),
        Err(IoError::UnsupportedFormat(name)) => return Err(InvalidUpload::UnsupportedType(name)),
        Err(_) => (extension_format, false),
    };

    if let Some(declared) = declared_content_type {
        if !declared.eq_ignore_ascii_case(format.mime_type()) {
            log::debug!(
                "declared content type {declared} differs from {}",
                format.mime_type()
            );
        }
    }

    // unreadable headers are left to the decoder
    if sniffed {
        if let Ok(dims) = decode_image_size(bytes) {
            if dims.is_empty() {
                return Err(InvalidUpload::EmptyImage);
            }
            if dims.width > limits.max_width || dims.height > limits.max_height {
                return Err(InvalidUpload::DimensionsTooLarge {
                    width: dims.width,
                    height: dims.height,
                    max_width: limits.max_width,
                    max_height: limits.max_height,
                });
            }
        }
    }

    Ok(ValidatedUpload {
        format,
        sniffed,
        filename: format!("{stem}.{}", format.extension()),
        original_filename: filename.to_string(),
        size_bytes: received,
        content_type: format.mime_type().to_string(),
    })
}

/// Sanitize a client file name, keeping its extension.
///
/// Only the last path component survives; control characters, separators and inner dots
/// are replaced, so `../../a.php.png` becomes `a_php.png`.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let (stem, extension) = split_filename(filename)?;
    Some(format!("{stem}.{extension}"))
}

// sanitized stem and lowercase extension
fn split_filename(filename: &str) -> Option<(String, String)> {
    let last = filename.rsplit(['/', '\\']).next()?.trim();
    let (raw_stem, raw_ext) = last.rsplit_once('.')?;

    let extension: String = raw_ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if extension.is_empty() {
        return None;
    }

    let mut stem: String = raw_stem
        .trim_start_matches('.')
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();

    if stem.chars().all(|c| c == '_') {
        stem = String::from("image");
    }

    Some((stem, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_1x1() -> Vec<u8> {
        let image = colorize_image::Rgb8::from_size_val([1, 1].into(), 0).unwrap();
        colorize_io::functional::encode_image_rgb8(&image, ImageFormat::Png, 0).unwrap()
    }

    fn check(bytes: &[u8], filename: &str) -> Result<ValidatedUpload, InvalidUpload> {
        validate(
            bytes,
            Some("application/octet-stream"),
            bytes.len() as u64,
            filename,
            &UploadLimits::default(),
        )
    }

    #[test]
    fn accepts_png() -> Result<(), InvalidUpload> {
        let upload = check(&png_1x1(), "scan.PNG")?;
        assert_eq!(upload.format, ImageFormat::Png);
        assert!(upload.sniffed);
        assert_eq!(upload.filename, "scan.png");
        assert_eq!(upload.original_filename, "scan.PNG");
        assert_eq!(upload.content_type, "image/png");
        Ok(())
    }

    #[test]
    fn sniffed_type_wins_over_extension() -> Result<(), InvalidUpload> {
        let upload = check(&png_1x1(), "holiday.jpg")?;
        assert_eq!(upload.format, ImageFormat::Png);
        assert_eq!(upload.filename, "holiday.png");
        Ok(())
    }

    #[test]
    fn rejects_size_violations() {
        let png = png_1x1();
        assert_eq!(check(&[], "a.png"), Err(InvalidUpload::Empty));

        let limits = UploadLimits {
            max_bytes: 10,
            ..Default::default()
        };
        let res = validate(&png, None, png.len() as u64, "a.png", &limits);
        assert!(matches!(res, Err(InvalidUpload::TooLarge { max: 10, .. })));

        // announced size beyond the limit is rejected before anything else
        let res = validate(&png, None, 50 * 1024 * 1024, "a.png", &UploadLimits::default());
        assert!(matches!(res, Err(InvalidUpload::TooLarge { .. })));

        let res = validate(&png, None, 3, "a.png", &UploadLimits::default());
        assert!(matches!(res, Err(InvalidUpload::SizeMismatch { .. })));
    }

    #[test]
    fn rejects_foreign_types() {
        let png = png_1x1();
        assert_eq!(
            check(b"GIF89a\x01\x00\x01\x00\x00\x00\x00", "anim.png"),
            Err(InvalidUpload::UnsupportedType("gif".into()))
        );
        assert_eq!(
            check(&png, "script.exe"),
            Err(InvalidUpload::DisallowedExtension("exe".into()))
        );
        assert_eq!(check(&png, "noextension"), Err(InvalidUpload::MissingFilename));

        let webp = b"RIFF\x1a\x00\x00\x00WEBPVP8L\x0d\x00\x00\x00";
        assert!(matches!(
            check(webp, "a.png"),
            Err(InvalidUpload::UnsupportedType(_))
        ));
    }

    #[test]
    fn unknown_signature_falls_back_to_extension() -> Result<(), InvalidUpload> {
        let upload = check(b"random bytes that are not an image", "photo.jpeg")?;
        assert_eq!(upload.format, ImageFormat::Jpeg);
        assert!(!upload.sniffed);
        assert_eq!(upload.filename, "photo.jpg");
        Ok(())
    }

    #[test]
    fn rejects_oversized_dimensions() {
        let png = png_1x1();
        let limits = UploadLimits {
            max_width: 0,
            ..Default::default()
        };
        let res = validate(&png, None, png.len() as u64, "a.png", &limits);
        assert!(matches!(
            res,
            Err(InvalidUpload::DimensionsTooLarge { width: 1, height: 1, .. })
        ));
    }

    #[test]
    fn default_dimension_limit() -> Result<(), InvalidUpload> {
        let encode = |width: usize| {
            let image = colorize_image::Rgb8::from_size_val([width, 1].into(), 0).unwrap();
            colorize_io::functional::encode_image_rgb8(&image, ImageFormat::Png, 0).unwrap()
        };

        let at_limit = encode(DEFAULT_MAX_DIMENSION);
        check(&at_limit, "wide.png")?;

        let over = encode(DEFAULT_MAX_DIMENSION + 1);
        assert!(matches!(
            check(&over, "wider.png"),
            Err(InvalidUpload::DimensionsTooLarge { width: 4097, height: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn validation_is_idempotent() {
        let png = png_1x1();
        for (bytes, name) in [
            (&png[..], "a.png"),
            (&b"junk"[..], "b.png"),
            (&b"GIF89a...."[..], "c.png"),
            (&png[..], "d.txt"),
        ] {
            assert_eq!(check(bytes, name), check(bytes, name));
        }
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_filename("../../etc/passwd.png").as_deref(), Some("passwd.png"));
        assert_eq!(sanitize_filename("C:\\temp\\a.php.png").as_deref(), Some("a_php.png"));
        assert_eq!(sanitize_filename(".hidden.png").as_deref(), Some("hidden.png"));
        assert_eq!(sanitize_filename("sp ace\u{7}.JPG").as_deref(), Some("sp_ace_.jpg"));
        assert_eq!(sanitize_filename("...png").as_deref(), Some("image.png"));
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename("a."), None);
    }
}
