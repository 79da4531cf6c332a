use std::path::Path;

use colorize_image::{ImageSize, Rgb8};

use crate::{
    error::IoError,
    format::{sniff_format, ImageFormat},
    jpeg, png,
};

/// Decodes an image of any supported container into 8-bit RGB.
///
/// The format is detected from the magic bytes. PNG and JPEG use the dedicated decoders, BMP,
/// TIFF and WebP go through the `image` crate.
///
/// # Arguments
///
/// * `bytes` - The encoded image.
///
/// # Returns
///
/// A three channel image in RGB order.
///
/// # Example
///
/// ```
/// use colorize_image::Rgb8;
/// use colorize_io::functional as F;
/// use colorize_io::ImageFormat;
///
/// let image = Rgb8::from_size_val([3, 2].into(), 42).unwrap();
/// let bytes = F::encode_image_rgb8(&image, ImageFormat::Png, 95).unwrap();
///
/// let decoded = F::decode_image_rgb8(&bytes).unwrap();
/// assert_eq!(decoded.size(), image.size());
/// ```
pub fn decode_image_rgb8(bytes: &[u8]) -> Result<Rgb8, IoError> {
    match sniff_format(bytes)? {
        ImageFormat::Png => png::decode_image_png_rgb8(bytes),
        ImageFormat::Jpeg => jpeg::decode_image_jpeg_rgb8(bytes),
        format @ (ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::WebP) => {
            decode_with_image_crate(bytes, format)
        }
    }
}

/// Read the dimensions declared in the image header without decoding the pixels.
pub fn decode_image_size(bytes: &[u8]) -> Result<ImageSize, IoError> {
    match sniff_format(bytes)? {
        ImageFormat::Png => png::decode_png_size(bytes),
        ImageFormat::Jpeg => jpeg::decode_jpeg_size(bytes),
        _ => {
            let (width, height) = image::ImageReader::new(std::io::Cursor::new(bytes))
                .with_guessed_format()?
                .into_dimensions()?;
            Ok([width as usize, height as usize].into())
        }
    }
}

/// Encodes an RGB image into the given container.
///
/// # Arguments
///
/// * `image` - The image to encode.
/// * `format` - The target container, PNG or JPEG.
/// * `quality` - JPEG quality in `[1, 100]`, ignored for PNG.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedFormat`] for containers the codec cannot write.
pub fn encode_image_rgb8(
    image: &Rgb8,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, IoError> {
    match format {
        ImageFormat::Png => png::encode_image_png_rgb8(image),
        ImageFormat::Jpeg => jpeg::encode_image_jpeg_rgb8(image, quality),
        other => Err(IoError::UnsupportedFormat(other.to_string())),
    }
}

/// Reads an image file of any supported container as 8-bit RGB.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
pub fn read_image_rgb8(file_path: impl AsRef<Path>) -> Result<Rgb8, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let bytes = std::fs::read(file_path)?;
    decode_image_rgb8(&bytes)
}

/// Writes an RGB image to a file, choosing the container from the file extension.
///
/// # Arguments
///
/// * `file_path` - The destination, with a `png`, `jpg` or `jpeg` extension.
/// * `image` - The image to write.
/// * `quality` - JPEG quality in `[1, 100]`, ignored for PNG.
pub fn write_image_rgb8(
    file_path: impl AsRef<Path>,
    image: &Rgb8,
    quality: u8,
) -> Result<(), IoError> {
    let file_path = file_path.as_ref();
    let format = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .ok_or_else(|| IoError::UnsupportedFormat(file_path.display().to_string()))?;

    let bytes = encode_image_rgb8(image, format, quality)?;
    std::fs::write(file_path, bytes)?;
    Ok(())
}

fn decode_with_image_crate(bytes: &[u8], format: ImageFormat) -> Result<Rgb8, IoError> {
    let image_format = match format {
        ImageFormat::Bmp => image::ImageFormat::Bmp,
        ImageFormat::Tiff => image::ImageFormat::Tiff,
        ImageFormat::WebP => image::ImageFormat::WebP,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
    };

    let decoded = image::load_from_memory_with_format(bytes, image_format)?;
    log::trace!(
        "decoded {format} with color type {:?} through the image crate",
        decoded.color()
    );

    let rgb = decoded.into_rgb8();
    let size = ImageSize {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
    };
    Ok(Rgb8::from_size_vec(size, rgb.into_raw())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_with_image_crate(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 10) as u8, 77])
        });
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, format).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decode_bmp_and_tiff() -> Result<(), IoError> {
        for format in [image::ImageFormat::Bmp, image::ImageFormat::Tiff] {
            let bytes = encode_with_image_crate(5, 4, format);
            let image = decode_image_rgb8(&bytes)?;
            assert_eq!(image.size(), [5, 4].into());
            assert_eq!(image.get([3, 2, 0]), Some(&20));
            assert_eq!(image.get([3, 2, 1]), Some(&30));
            assert_eq!(image.get([3, 2, 2]), Some(&77));
            assert_eq!(decode_image_size(&bytes)?, [5, 4].into());
        }
        Ok(())
    }

    #[test]
    fn decode_unknown_signature() {
        assert!(matches!(
            decode_image_rgb8(b"plain text pretending to be a png"),
            Err(IoError::UnknownFormat)
        ));
    }

    #[test]
    fn encode_rejects_read_only_formats() -> Result<(), IoError> {
        let image = Rgb8::from_size_val([1, 1].into(), 0)?;
        assert!(matches!(
            encode_image_rgb8(&image, ImageFormat::Bmp, 90),
            Err(IoError::UnsupportedFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn read_write_file() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;

        let image = Rgb8::from_size_val([6, 9].into(), 31)?;
        let file_path = tmp_dir.path().join("flat.png");
        write_image_rgb8(&file_path, &image, 90)?;
        assert!(file_path.exists(), "File does not exist: {:?}", file_path);

        let back = read_image_rgb8(&file_path)?;
        assert_eq!(back, image);

        assert!(matches!(
            read_image_rgb8(tmp_dir.path().join("missing.png")),
            Err(IoError::FileDoesNotExist(_))
        ));
        assert!(write_image_rgb8(tmp_dir.path().join("flat.gif"), &image, 90).is_err());
        Ok(())
    }
}
