use crate::{conv_utils::rgb8_from_interleaved, error::IoError};
use colorize_image::{ImageSize, Rgb8};
use jpeg_encoder::{ColorType, Encoder};
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};

/// Encodes the given _(rgb8)_ image as JPEG.
///
/// # Arguments
///
/// - `image` - The image to encode.
/// - `quality` - The quality of the JPEG encoding, range from 1 (lowest) to 100 (highest)
pub fn encode_image_jpeg_rgb8(image: &Rgb8, quality: u8) -> Result<Vec<u8>, IoError> {
    let image_size = image.size();
    if image_size.width > u16::MAX as usize || image_size.height > u16::MAX as usize {
        return Err(IoError::EncodeDimensionsTooLarge(
            image_size.width,
            image_size.height,
            "jpeg",
        ));
    }

    let mut buf = Vec::new();
    let encoder = Encoder::new(&mut buf, quality.clamp(1, 100));
    encoder.encode(
        image.as_slice(),
        image_size.width as u16,
        image_size.height as u16,
        ColorType::Rgb,
    )?;
    Ok(buf)
}

/// Decodes a JPEG image from raw bytes into 8-bit RGB.
///
/// Grayscale and CMYK streams are converted to RGB.
///
/// # Arguments
///
/// - `bytes` - Raw bytes of the jpeg file
pub fn decode_image_jpeg_rgb8(bytes: &[u8]) -> Result<Rgb8, IoError> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = zune_jpeg::JpegDecoder::new_with_options(bytes, options);
    decoder.decode_headers()?;

    let image_info = decoder.info().ok_or_else(|| {
        IoError::JpegDecodingError(zune_jpeg::errors::DecodeErrors::Format(String::from(
            "Failed to find image info from its metadata",
        )))
    })?;

    let image_size = ImageSize {
        width: image_info.width as usize,
        height: image_info.height as usize,
    };

    // grayscale streams may come back single channel
    let img_data = decoder.decode()?;
    let rgb = rgb8_from_interleaved(img_data, image_size.area())?;

    Ok(Rgb8::from_size_vec(image_size, rgb)?)
}

/// Read the dimensions of a JPEG image from its headers without decoding the pixels.
pub fn decode_jpeg_size(bytes: &[u8]) -> Result<ImageSize, IoError> {
    let mut decoder = zune_jpeg::JpegDecoder::new(bytes);
    decoder.decode_headers()?;
    let (width, height) = decoder.dimensions().ok_or_else(|| {
        IoError::JpegDecodingError(zune_jpeg::errors::DecodeErrors::Format(String::from(
            "Failed to find image dimensions from its metadata",
        )))
    })?;
    Ok([width, height].into())
}
