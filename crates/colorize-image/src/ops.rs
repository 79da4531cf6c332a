use crate::{Image, ImageError};

/// Cast the pixel data of an image to a different type.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `dst` - The destination image.
/// * `scale` - The scale to multiply the pixel data with.
///
/// Example:
///
/// ```
/// use colorize_image::{Image, ImageSize};
/// use colorize_image::ops::cast_and_scale;
///
/// let image = Image::<u8, 1>::new(
///     ImageSize {
///         width: 2,
///         height: 1,
///     },
///     vec![0u8, 255],
/// )
/// .unwrap();
///
/// let mut image_f32 = Image::from_size_val(image.size(), 0.0f32).unwrap();
///
/// cast_and_scale(&image, &mut image_f32, 1. / 255.0).unwrap();
///
/// assert_eq!(image_f32.get([0, 0, 0]), Some(&0.0f32));
/// assert_eq!(image_f32.get([0, 1, 0]), Some(&1.0f32));
/// ```
pub fn cast_and_scale<T, U, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<U, C>,
    scale: U,
) -> Result<(), ImageError>
where
    T: Copy + num_traits::NumCast,
    U: Copy + num_traits::NumCast + std::ops::Mul<U, Output = U>,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    dst.as_slice_mut()
        .iter_mut()
        .zip(src.as_slice().iter())
        .try_for_each(|(out, &inp)| {
            let x = U::from(inp).ok_or(ImageError::CastError(
                std::any::type_name::<U>().to_string(),
            ))?;
            *out = x * scale;
            Ok::<(), ImageError>(())
        })?;

    Ok(())
}

/// Scale floating point samples and quantize them to 8 bits.
///
/// Samples are multiplied by `scale`, rounded and saturated to [0, 255]. NaN maps to 0.
pub fn scale_and_quantize_u8<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<u8, C>,
    scale: f32,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    dst.as_slice_mut()
        .iter_mut()
        .zip(src.as_slice().iter())
        .for_each(|(out, &inp)| {
            let x = inp * scale;
            *out = if x.is_nan() {
                0
            } else {
                x.round().clamp(0.0, 255.0) as u8
            };
        });

    Ok(())
}
