use crate::interpolation::{
    bilinear_interpolation, nearest_neighbor_interpolation, src_coordinate, InterpolationMode,
};
use crate::parallel;
use colorize_image::{Image, ImageError};

/// Resize an image to a new size.
///
/// The function resizes an image to the size of `dst` using the specified interpolation mode.
/// Pixel centers are aligned, so a constant image stays constant and shrinking by an integer
/// factor with [`InterpolationMode::Area`] averages whole blocks.
///
/// # Arguments
///
/// * `src` - The input image container.
/// * `dst` - The output image container, already allocated with the target size.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// Returns [`ImageError::EmptyImage`] when either image has no pixels.
///
/// # Example
///
/// ```
/// use colorize_image::{Image, ImageSize};
/// use colorize_imgproc::interpolation::InterpolationMode;
/// use colorize_imgproc::resize::resize_native;
///
/// let image = Image::<_, 3>::new(
///     ImageSize {
///         width: 4,
///         height: 5,
///     },
///     vec![0f32; 4 * 5 * 3],
/// )
/// .unwrap();
///
/// let new_size = ImageSize {
///     width: 2,
///     height: 3,
/// };
///
/// let mut image_resized = Image::<_, 3>::from_size_val(new_size, 0.0).unwrap();
///
/// resize_native(&image, &mut image_resized, InterpolationMode::Nearest).unwrap();
///
/// assert_eq!(image_resized.num_channels(), 3);
/// assert_eq!(image_resized.size().width, 2);
/// assert_eq!(image_resized.size().height, 3);
/// ```
pub fn resize_native<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    if src.size().is_empty() {
        return Err(ImageError::EmptyImage(src.size()));
    }
    if dst.size().is_empty() {
        return Err(ImageError::EmptyImage(dst.size()));
    }

    // same size, nothing to interpolate
    if src.size() == dst.size() {
        dst.as_slice_mut().copy_from_slice(src.as_slice());
        return Ok(());
    }

    let scale_x = src.cols() as f32 / dst.cols() as f32;
    let scale_y = src.rows() as f32 / dst.rows() as f32;

    match interpolation {
        InterpolationMode::Bilinear | InterpolationMode::Nearest => {
            parallel::par_iter_dst_rows(dst, |y, dst_row| {
                let v = src_coordinate(y, scale_y, src.rows());
                for (x, out) in dst_row.chunks_exact_mut(C).enumerate() {
                    let u = src_coordinate(x, scale_x, src.cols());
                    let pixel = match interpolation {
                        InterpolationMode::Nearest => nearest_neighbor_interpolation(src, u, v),
                        _ => bilinear_interpolation(src, u, v),
                    };
                    out.copy_from_slice(&pixel);
                }
            });
        }
        InterpolationMode::Area => {
            let taps_x = axis_taps(src.cols(), dst.cols());
            let taps_y = axis_taps(src.rows(), dst.rows());
            let src_cols = src.cols();
            let data = src.as_slice();

            parallel::par_iter_dst_rows(dst, |y, dst_row| {
                for (out, col_taps) in dst_row.chunks_exact_mut(C).zip(taps_x.iter()) {
                    // f64 keeps the sum exact enough over tens of thousands of taps
                    let mut acc = [0.0f64; C];
                    for &(sy, wy) in &taps_y[y] {
                        for &(sx, wx) in col_taps {
                            let base = (sy * src_cols + sx) * C;
                            let w = wy * wx;
                            for (k, a) in acc.iter_mut().enumerate() {
                                *a += data[base + k] as f64 * w;
                            }
                        }
                    }
                    for (o, a) in out.iter_mut().zip(acc) {
                        *o = a as f32;
                    }
                }
            });
        }
    }

    Ok(())
}

/// Compute the source taps `(index, weight)` of every destination index along one axis.
///
/// Shrinking axes use box coverage weights; enlarged axes use linear weights. The weights of
/// every destination index sum to one.
fn axis_taps(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f64)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|i| {
            let mut taps: Vec<(usize, f64)> = if scale > 1.0 {
                let start = i as f64 * scale;
                let end = (start + scale).min(src_len as f64);
                let first = start.floor() as usize;
                let last = (end.ceil() as usize).min(src_len);
                (first..last)
                    .filter_map(|j| {
                        let overlap = end.min(j as f64 + 1.0) - start.max(j as f64);
                        (overlap > 0.0).then_some((j, overlap))
                    })
                    .collect()
            } else {
                let u = src_coordinate(i, scale as f32, src_len) as f64;
                let j0 = (u.trunc() as usize).min(src_len - 1);
                let j1 = (j0 + 1).min(src_len - 1);
                let frac = u - j0 as f64;
                if j1 == j0 || frac <= 0.0 {
                    vec![(j0, 1.0)]
                } else {
                    vec![(j0, 1.0 - frac), (j1, frac)]
                }
            };

            let total: f64 = taps.iter().map(|&(_, w)| w).sum();
            if total > 0.0 {
                taps.iter_mut().for_each(|(_, w)| *w /= total);
            }
            taps
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::interpolation::InterpolationMode;
    use approx::assert_abs_diff_eq;
    use colorize_image::{Image, ImageError, ImageSize};

    #[test]
    fn resize_smoke_ch3() -> Result<(), ImageError> {
        let image = Image::<_, 3>::new(
            ImageSize {
                width: 4,
                height: 5,
            },
            vec![0f32; 4 * 5 * 3],
        )?;

        let new_size = ImageSize {
            width: 2,
            height: 3,
        };

        let mut image_resized = Image::<_, 3>::from_size_val(new_size, 0.0)?;

        super::resize_native(&image, &mut image_resized, InterpolationMode::Bilinear)?;

        assert_eq!(image_resized.num_channels(), 3);
        assert_eq!(image_resized.size().width, 2);
        assert_eq!(image_resized.size().height, 3);
        Ok(())
    }

    #[test]
    fn resize_area_averages_blocks() -> Result<(), ImageError> {
        #[rustfmt::skip]
        let image = Image::<f32, 1>::new(
            [4, 2].into(),
            vec![
                0.0, 2.0, 4.0, 6.0,
                2.0, 4.0, 6.0, 8.0,
            ],
        )?;

        let mut shrunk = Image::<f32, 1>::from_size_val([2, 1].into(), 0.0)?;
        super::resize_native(&image, &mut shrunk, InterpolationMode::Area)?;

        assert_abs_diff_eq!(shrunk.as_slice()[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(shrunk.as_slice()[1], 6.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn resize_area_fractional_coverage() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new([3, 1].into(), vec![0.0, 3.0, 6.0])?;
        let mut shrunk = Image::<f32, 1>::from_size_val([2, 1].into(), 0.0)?;
        super::resize_native(&image, &mut shrunk, InterpolationMode::Area)?;

        // [0, 1.5) and [1.5, 3)
        assert_abs_diff_eq!(shrunk.as_slice()[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(shrunk.as_slice()[1], 5.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn resize_constant_stays_constant() -> Result<(), ImageError> {
        let image = Image::<f32, 2>::from_size_val([7, 3].into(), 42.5)?;
        for mode in [
            InterpolationMode::Bilinear,
            InterpolationMode::Nearest,
            InterpolationMode::Area,
        ] {
            let mut up = Image::<f32, 2>::from_size_val([224, 224].into(), 0.0)?;
            super::resize_native(&image, &mut up, mode)?;
            assert!(up.as_slice().iter().all(|v| (v - 42.5).abs() < 1e-4));

            let mut down = Image::<f32, 2>::from_size_val([2, 1].into(), 0.0)?;
            super::resize_native(&image, &mut down, mode)?;
            assert!(down.as_slice().iter().all(|v| (v - 42.5).abs() < 1e-4));
        }
        Ok(())
    }

    #[test]
    fn resize_single_pixel() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new([1, 1].into(), vec![7.0])?;
        let mut up = Image::<f32, 1>::from_size_val([224, 224].into(), 0.0)?;
        super::resize_native(&image, &mut up, InterpolationMode::Area)?;
        assert!(up.as_slice().iter().all(|&v| v == 7.0));

        let mut back = Image::<f32, 1>::from_size_val([1, 1].into(), 0.0)?;
        super::resize_native(&up, &mut back, InterpolationMode::Area)?;
        assert_abs_diff_eq!(back.as_slice()[0], 7.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn resize_area_constant_non_integer_ratios() -> Result<(), ImageError> {
        let image = Image::<f32, 2>::from_size_val([224, 224].into(), -37.25)?;
        for (width, height) in [(3, 5), (100, 77), (1000, 333), (223, 225)] {
            let mut out = Image::<f32, 2>::from_size_val([width, height].into(), 0.0)?;
            super::resize_native(&image, &mut out, InterpolationMode::Area)?;
            for v in out.as_slice() {
                assert_abs_diff_eq!(*v, -37.25, epsilon = 1e-5);
            }
        }
        Ok(())
    }

    #[test]
    fn area_taps_sum_to_one() {
        for (src_len, dst_len) in [(224, 1), (224, 3), (224, 1000), (7, 224), (5, 3)] {
            for taps in super::axis_taps(src_len, dst_len) {
                let total: f64 = taps.iter().map(|&(_, w)| w).sum();
                assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn resize_bilinear_upsample_interpolates() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new([2, 1].into(), vec![0.0, 4.0])?;
        let mut up = Image::<f32, 1>::from_size_val([4, 1].into(), 0.0)?;
        super::resize_native(&image, &mut up, InterpolationMode::Bilinear)?;
        assert_eq!(up.as_slice(), &[0.0, 1.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn resize_empty_fails() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::from_size_val([0, 3].into(), 0.0)?;
        let mut out = Image::<f32, 1>::from_size_val([2, 2].into(), 0.0)?;
        assert_eq!(
            super::resize_native(&image, &mut out, InterpolationMode::Bilinear),
            Err(ImageError::EmptyImage([0, 3].into()))
        );
        Ok(())
    }
}
