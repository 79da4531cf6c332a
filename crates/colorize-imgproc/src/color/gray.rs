use crate::parallel;
use colorize_image::{Image, ImageError};

// Rec. 601 luma weights
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

fn ensure_same_size<A, const CA: usize, B, const CB: usize>(
    src: &Image<A, CA>,
    dst: &Image<B, CB>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }
    Ok(())
}

/// Reduce an RGB image to its luma, `Y = 0.299 R + 0.587 G + 0.114 B`.
///
/// Used to drop whatever chrominance an upload carries before it is colorized, so color and
/// grayscale inputs go through the same path.
///
/// # Example
///
/// ```
/// use colorize_image::Image;
/// use colorize_imgproc::color::gray_from_rgb;
///
/// let rgb = Image::<f32, 3>::new([1, 1].into(), vec![1.0, 1.0, 1.0]).unwrap();
/// let mut gray = Image::<f32, 1>::from_size_val(rgb.size(), 0.0).unwrap();
///
/// gray_from_rgb(&rgb, &mut gray).unwrap();
/// assert!((gray.as_slice()[0] - 1.0).abs() < 1e-6);
/// ```
pub fn gray_from_rgb<T>(src: &Image<T, 3>, dst: &mut Image<T, 1>) -> Result<(), ImageError>
where
    T: Send + Sync + num_traits::Float,
{
    ensure_same_size(src, dst)?;

    let weight = |w: f64| {
        T::from(w).ok_or_else(|| ImageError::CastError(std::any::type_name::<T>().to_string()))
    };
    let (wr, wg, wb) = (weight(LUMA_R)?, weight(LUMA_G)?, weight(LUMA_B)?);

    parallel::par_iter_rows(src, dst, |rgb, y| {
        y[0] = wr * rgb[0] + wg * rgb[1] + wb * rgb[2];
    });

    Ok(())
}

/// Luma of an 8-bit RGB image, normalized to [0, 1].
///
/// Same weights as [`gray_from_rgb`], read straight from the 8-bit samples so no floating
/// point copy of the RGB image is needed.
pub fn gray_from_rgb_u8(src: &Image<u8, 3>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
    ensure_same_size(src, dst)?;

    let (wr, wg, wb) = (
        (LUMA_R / 255.0) as f32,
        (LUMA_G / 255.0) as f32,
        (LUMA_B / 255.0) as f32,
    );

    parallel::par_iter_rows(src, dst, |rgb, y| {
        y[0] = wr * rgb[0] as f32 + wg * rgb[1] as f32 + wb * rgb[2] as f32;
    });

    Ok(())
}

/// Replicate a single channel into the three RGB channels.
pub fn rgb_from_gray<T>(src: &Image<T, 1>, dst: &mut Image<T, 3>) -> Result<(), ImageError>
where
    T: Copy + Send + Sync,
{
    ensure_same_size(src, dst)?;

    parallel::par_iter_rows(src, dst, |y, rgb| rgb.fill(y[0]));

    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use colorize_image::{Image, ImageError};

    #[test]
    fn luma_weights() -> Result<(), ImageError> {
        let rgb = Image::<f32, 3>::new(
            [4, 1].into(),
            vec![
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                0.0, 0.0, 1.0, //
                0.5, 0.5, 0.5,
            ],
        )?;

        let mut gray = Image::<f32, 1>::from_size_val(rgb.size(), 0.0)?;
        super::gray_from_rgb(&rgb, &mut gray)?;

        let expected = [0.299, 0.587, 0.114, 0.5];
        for (got, want) in gray.as_slice().iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn luma_from_u8_is_normalized() -> Result<(), ImageError> {
        let rgb = Image::<u8, 3>::new([3, 1].into(), vec![255, 255, 255, 255, 0, 0, 10, 10, 10])?;
        let mut gray = Image::<f32, 1>::from_size_val(rgb.size(), 0.0)?;
        super::gray_from_rgb_u8(&rgb, &mut gray)?;

        let expected = [1.0, 0.299, 10.0 / 255.0];
        for (got, want) in gray.as_slice().iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn gray_round_trip_keeps_neutral_pixels() -> Result<(), ImageError> {
        let gray = Image::<u8, 1>::new([2, 1].into(), vec![3, 200])?;
        let mut rgb = Image::<u8, 3>::from_size_val(gray.size(), 0)?;
        super::rgb_from_gray(&gray, &mut rgb)?;
        assert_eq!(rgb.as_slice(), &[3, 3, 3, 200, 200, 200]);
        Ok(())
    }

    #[test]
    fn mismatched_sizes_are_rejected() -> Result<(), ImageError> {
        let rgb = Image::<f32, 3>::from_size_val([2, 2].into(), 0.0)?;
        let mut gray = Image::<f32, 1>::from_size_val([1, 2].into(), 0.0)?;
        assert_eq!(
            super::gray_from_rgb(&rgb, &mut gray),
            Err(ImageError::InvalidImageSize(2, 2, 1, 2))
        );

        let mut rgb_out = Image::<f32, 3>::from_size_val([3, 3].into(), 0.0)?;
        assert!(super::rgb_from_gray(&gray, &mut rgb_out).is_err());
        Ok(())
    }
}
