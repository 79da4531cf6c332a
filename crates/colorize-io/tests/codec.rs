use colorize_image::Rgb8;
use colorize_io::{functional as F, ImageFormat, IoError};

fn gradient(width: usize, height: usize) -> Result<Rgb8, IoError> {
    let data = (0..height)
        .flat_map(|y| (0..width).flat_map(move |x| [(x * 4) as u8, (y * 4) as u8, 128]))
        .collect();
    Ok(Rgb8::from_size_vec([width, height].into(), data)?)
}

#[test]
fn png_is_lossless() -> Result<(), IoError> {
    let image = gradient(63, 17)?;
    let bytes = F::encode_image_rgb8(&image, ImageFormat::Png, 0)?;
    assert_eq!(colorize_io::format::sniff_format(&bytes)?, ImageFormat::Png);
    assert_eq!(F::decode_image_rgb8(&bytes)?, image);
    Ok(())
}

#[test]
fn jpeg_keeps_shape() -> Result<(), IoError> {
    for (w, h) in [(1, 1), (17, 3), (640, 480)] {
        let image = gradient(w, h)?;
        let bytes = F::encode_image_rgb8(&image, ImageFormat::Jpeg, 90)?;
        assert_eq!(F::decode_image_size(&bytes)?, image.size());

        let back = F::decode_image_rgb8(&bytes)?;
        assert_eq!(back.size(), image.size());
        assert_eq!(back.num_channels(), 3);
    }
    Ok(())
}

#[test]
fn corrupted_payloads_fail_to_decode() -> Result<(), IoError> {
    let bytes = F::encode_image_rgb8(&gradient(32, 32)?, ImageFormat::Png, 0)?;

    // valid signature, garbage body
    let mut broken = bytes[..16].to_vec();
    broken.extend(std::iter::repeat(0xAA).take(64));
    assert!(F::decode_image_rgb8(&broken).is_err());

    assert!(F::decode_image_rgb8(&[]).is_err());
    Ok(())
}
