use std::io::Cursor;

use colorize_image::{ImageSize, Rgb8};
use png::{BitDepth, ColorType, Decoder, Encoder, Transformations};

use crate::{conv_utils::rgb8_from_interleaved, error::IoError};

/// Decodes a PNG image from raw bytes into 8-bit RGB.
///
/// Palette, grayscale and low bit-depth images are expanded, 16-bit samples are stripped to
/// their most significant byte and alpha is dropped.
///
/// # Arguments
///
/// - `bytes` - Raw bytes of the png file
pub fn decode_image_png_rgb8(bytes: &[u8]) -> Result<Rgb8, IoError> {
    let mut decoder = Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);

    let mut reader = decoder
        .read_info()
        .map_err(|e| IoError::PngDecodeError(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| IoError::PngDecodeError(e.to_string()))?;
    buf.truncate(info.buffer_size());

    let size = ImageSize {
        width: info.width as usize,
        height: info.height as usize,
    };

    let rgb = rgb8_from_interleaved(buf, size.area())?;
    Ok(Rgb8::from_size_vec(size, rgb)?)
}

/// Read the dimensions of a PNG image from its header without decoding the pixels.
pub fn decode_png_size(bytes: &[u8]) -> Result<ImageSize, IoError> {
    let reader = Decoder::new(Cursor::new(bytes))
        .read_info()
        .map_err(|e| IoError::PngDecodeError(e.to_string()))?;
    let info = reader.info();
    Ok([info.width as usize, info.height as usize].into())
}

/// Encodes the given _(rgb8)_ image as a lossless PNG.
///
/// # Arguments
///
/// - `image` - The image to encode.
///
/// # Returns
///
/// The bytes of the png file.
pub fn encode_image_png_rgb8(image: &Rgb8) -> Result<Vec<u8>, IoError> {
    let mut buf = Vec::new();

    let mut encoder = Encoder::new(&mut buf, image.width() as u32, image.height() as u32);
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;
    writer
        .write_image_data(image.as_slice())
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| IoError::PngEncodingError(e.to_string()))?;

    Ok(buf)
}
