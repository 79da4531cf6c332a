use crate::parallel;
use colorize_image::{Abf32, Image, ImageError, Labf32, Lf32, Rgb8, Rgbf32};

/// X tristimulus value of the D65 reference white.
pub const LAB_WHITE_X: f32 = 0.950_456;
/// Z tristimulus value of the D65 reference white.
pub const LAB_WHITE_Z: f32 = 1.088_754;

// CIE constants: (6/29)^3 and (29/3)^3
const EPSILON: f32 = 0.008_856;
const KAPPA: f32 = 903.3;

// linear sRGB -> XYZ (D65)
const RGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412_453, 0.357_580, 0.180_423],
    [0.212_671, 0.715_160, 0.072_169],
    [0.019_334, 0.119_193, 0.950_227],
];

// XYZ (D65) -> linear sRGB
const XYZ_TO_RGB: [[f32; 3]; 3] = [
    [3.240_479, -1.537_150, -0.498_535],
    [-0.969_256, 1.875_991, 0.041_556],
    [0.055_648, -0.204_043, 1.057_311],
];

#[inline]
fn sanitize(x: f32, lo: f32, hi: f32) -> f32 {
    if x.is_nan() {
        lo.max(0.0).min(hi)
    } else {
        x.clamp(lo, hi)
    }
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

#[inline]
fn lab_f_inv(f: f32) -> f32 {
    let f3 = f * f * f;
    if f3 > EPSILON {
        f3
    } else {
        (116.0 * f - 16.0) / KAPPA
    }
}

#[inline]
fn mat3_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

// clamped LAB -> gamma-encoded sRGB in [0, 1]
#[inline]
fn srgb_from_lab([l, a, b]: [f32; 3]) -> [f32; 3] {
    let l = sanitize(l, 0.0, 100.0);
    let a = sanitize(a, -128.0, 127.0);
    let b = sanitize(b, -128.0, 127.0);

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let xyz = [
        lab_f_inv(fx) * LAB_WHITE_X,
        lab_f_inv(fy),
        lab_f_inv(fz) * LAB_WHITE_Z,
    ];
    mat3_mul(&XYZ_TO_RGB, xyz).map(|c| linear_to_srgb(c.clamp(0.0, 1.0)).clamp(0.0, 1.0))
}

/// Convert an RGB image to the CIE LAB color space.
///
/// The input is gamma-encoded sRGB normalized to [0, 1]; samples outside that range are
/// clamped and NaN is treated as 0. The output uses the D65 white point with L in [0, 100]
/// and a, b clamped to [-128, 127].
///
/// # Arguments
///
/// * `src` - The input RGB image.
/// * `dst` - The output LAB image.
///
/// Precondition: the input and output images must have the same size.
///
/// # Example
///
/// ```
/// use colorize_image::{Labf32, Rgbf32};
/// use colorize_imgproc::color::lab_from_rgb;
///
/// let rgb = Rgbf32::from_size_val([4, 5].into(), 1.0).unwrap();
/// let mut lab = Labf32::from_size_val(rgb.size(), 0.0).unwrap();
///
/// lab_from_rgb(&rgb, &mut lab).unwrap();
///
/// assert!((lab.as_slice()[0] - 100.0).abs() < 1e-3);
/// ```
pub fn lab_from_rgb(src: &Rgbf32, dst: &mut Labf32) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src.as_image(), dst.as_image_mut(), |src_pixel, dst_pixel| {
        let rgb = [
            srgb_to_linear(sanitize(src_pixel[0], 0.0, 1.0)),
            srgb_to_linear(sanitize(src_pixel[1], 0.0, 1.0)),
            srgb_to_linear(sanitize(src_pixel[2], 0.0, 1.0)),
        ];
        let [x, y, z] = mat3_mul(&RGB_TO_XYZ, rgb);

        let fx = lab_f(x / LAB_WHITE_X);
        let fy = lab_f(y);
        let fz = lab_f(z / LAB_WHITE_Z);

        dst_pixel[0] = (116.0 * fy - 16.0).clamp(0.0, 100.0);
        dst_pixel[1] = (500.0 * (fx - fy)).clamp(-128.0, 127.0);
        dst_pixel[2] = (200.0 * (fy - fz)).clamp(-128.0, 127.0);
    });

    Ok(())
}

/// Convert a CIE LAB image back to RGB.
///
/// The input is clamped to L in [0, 100] and a, b in [-128, 127] (NaN treated as 0). The
/// output is gamma-encoded sRGB clamped to [0, 1], since merged L and AB channels may fall
/// outside the sRGB gamut.
///
/// # Arguments
///
/// * `src` - The input LAB image.
/// * `dst` - The output RGB image.
///
/// Precondition: the input and output images must have the same size.
pub fn rgb_from_lab(src: &Labf32, dst: &mut Rgbf32) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src.as_image(), dst.as_image_mut(), |src_pixel, dst_pixel| {
        let rgb = srgb_from_lab([src_pixel[0], src_pixel[1], src_pixel[2]]);
        dst_pixel.copy_from_slice(&rgb);
    });

    Ok(())
}

/// Extract the luminance channel of a LAB image.
pub fn l_from_lab(src: &Labf32, dst: &mut Lf32) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src.as_image(), dst.as_image_mut(), |src_pixel, dst_pixel| {
        dst_pixel[0] = src_pixel[0];
    });

    Ok(())
}

/// Compute the LAB luminance of a neutral image from its gray level in [0, 1].
///
/// Gives the same L as [`lab_from_rgb`] applied to the gray level replicated on R, G and B,
/// without the intermediate RGB and LAB images.
pub fn l_from_gray(src: &Image<f32, 1>, dst: &mut Lf32) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let [wr, wg, wb] = RGB_TO_XYZ[1];
    parallel::par_iter_rows(src, dst.as_image_mut(), |gray, l| {
        let c = srgb_to_linear(sanitize(gray[0], 0.0, 1.0));
        let y = wr * c + wg * c + wb * c;
        l[0] = (116.0 * lab_f(y) - 16.0).clamp(0.0, 100.0);
    });

    Ok(())
}

/// Extract the chrominance channels of a LAB image.
pub fn ab_from_lab(src: &Labf32, dst: &mut Abf32) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src.as_image(), dst.as_image_mut(), |src_pixel, dst_pixel| {
        dst_pixel[0] = src_pixel[1];
        dst_pixel[1] = src_pixel[2];
    });

    Ok(())
}

/// Merge a luminance channel and chrominance channels into a LAB image.
///
/// Precondition: all three images must have the same size.
pub fn lab_from_l_ab(l: &Lf32, ab: &Abf32, dst: &mut Labf32) -> Result<(), ImageError> {
    if l.size() != ab.size() {
        return Err(ImageError::InvalidImageSize(
            l.cols(),
            l.rows(),
            ab.cols(),
            ab.rows(),
        ));
    }
    if l.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            l.cols(),
            l.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows_two(
        l.as_image(),
        ab.as_image(),
        dst.as_image_mut(),
        |l_pixel, ab_pixel, dst_pixel| {
            dst_pixel[0] = l_pixel[0];
            dst_pixel[1] = ab_pixel[0];
            dst_pixel[2] = ab_pixel[1];
        },
    );

    Ok(())
}

/// Merge luminance and chrominance straight into an 8-bit RGB image.
///
/// Equivalent to [`lab_from_l_ab`] followed by [`rgb_from_lab`] and quantization with
/// rounding, without the two floating point intermediates.
pub fn rgb8_from_l_ab(l: &Lf32, ab: &Abf32, dst: &mut Rgb8) -> Result<(), ImageError> {
    for (cols, rows) in [(ab.cols(), ab.rows()), (dst.cols(), dst.rows())] {
        if l.cols() != cols || l.rows() != rows {
            return Err(ImageError::InvalidImageSize(l.cols(), l.rows(), cols, rows));
        }
    }

    parallel::par_iter_rows_two(
        l.as_image(),
        ab.as_image(),
        dst.as_image_mut(),
        |l_pixel, ab_pixel, dst_pixel| {
            let rgb = srgb_from_lab([l_pixel[0], ab_pixel[0], ab_pixel[1]]);
            for (out, c) in dst_pixel.iter_mut().zip(rgb) {
                *out = (c * 255.0).round() as u8;
            }
        },
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use colorize_image::{ops, Abf32, Image, ImageError, Labf32, Lf32, Rgb8, Rgbf32};

    fn lab_of(rgb: [f32; 3]) -> Result<[f32; 3], ImageError> {
        let src = Rgbf32::from_size_vec([1, 1].into(), rgb.to_vec())?;
        let mut dst = Labf32::from_size_val(src.size(), 0.0)?;
        super::lab_from_rgb(&src, &mut dst)?;
        Ok([dst.as_slice()[0], dst.as_slice()[1], dst.as_slice()[2]])
    }

    #[test]
    fn lab_reference_values() -> Result<(), ImageError> {
        let black = lab_of([0.0, 0.0, 0.0])?;
        assert_abs_diff_eq!(black[0], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(black[1], 0.0, epsilon = 1e-3);

        let white = lab_of([1.0, 1.0, 1.0])?;
        assert_abs_diff_eq!(white[0], 100.0, epsilon = 1e-2);
        assert_abs_diff_eq!(white[1], 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(white[2], 0.0, epsilon = 1e-2);

        // pure red is approximately (53.24, 80.09, 67.20)
        let red = lab_of([1.0, 0.0, 0.0])?;
        assert_abs_diff_eq!(red[0], 53.24, epsilon = 0.1);
        assert_abs_diff_eq!(red[1], 80.09, epsilon = 0.3);
        assert_abs_diff_eq!(red[2], 67.20, epsilon = 0.3);

        // mid gray is neutral
        let gray = lab_of([0.5, 0.5, 0.5])?;
        assert_abs_diff_eq!(gray[0], 53.39, epsilon = 0.1);
        assert_abs_diff_eq!(gray[1], 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(gray[2], 0.0, epsilon = 1e-2);
        Ok(())
    }

    #[test]
    fn l_from_gray_matches_full_conversion() -> Result<(), ImageError> {
        let levels: Vec<f32> = (0..=255).map(|v| v as f32 / 255.0).collect();
        let gray = Image::<f32, 1>::new([256, 1].into(), levels.clone())?;

        let mut l = Lf32::from_size_val(gray.size(), 0.0)?;
        super::l_from_gray(&gray, &mut l)?;

        for (v, got) in levels.iter().zip(l.as_slice()) {
            assert_abs_diff_eq!(*got, lab_of([*v, *v, *v])?[0], epsilon = 1e-3);
        }
        Ok(())
    }

    #[test]
    fn rgb8_from_l_ab_matches_two_step_merge() -> Result<(), ImageError> {
        let size = [4, 1].into();
        let l = Lf32::from_size_vec(size, vec![0.0, 35.0, 62.5, 100.0])?;
        let ab = Abf32::from_size_vec(size, vec![0.0, 0.0, 40.0, -20.0, -60.0, 70.0, 127.0, 127.0])?;

        let mut lab = Labf32::from_size_val(size, 0.0)?;
        super::lab_from_l_ab(&l, &ab, &mut lab)?;
        let mut rgb = Rgbf32::from_size_val(size, 0.0)?;
        super::rgb_from_lab(&lab, &mut rgb)?;
        let mut expected = Rgb8::from_size_val(size, 0)?;
        ops::scale_and_quantize_u8(rgb.as_image(), expected.as_image_mut(), 255.0)?;

        let mut fused = Rgb8::from_size_val(size, 0)?;
        super::rgb8_from_l_ab(&l, &ab, &mut fused)?;

        assert_eq!(fused.as_slice(), expected.as_slice());
        Ok(())
    }

    #[test]
    fn lab_clamps_invalid_samples() -> Result<(), ImageError> {
        let nan = lab_of([f32::NAN, f32::NAN, f32::NAN])?;
        assert_eq!(nan, lab_of([0.0, 0.0, 0.0])?);

        let over = lab_of([4.0, 4.0, 4.0])?;
        assert_eq!(over, lab_of([1.0, 1.0, 1.0])?);

        let lab = Labf32::from_size_vec([1, 1].into(), vec![f32::NAN, 1000.0, -1000.0])?;
        let mut rgb = Rgbf32::from_size_val(lab.size(), 0.0)?;
        super::rgb_from_lab(&lab, &mut rgb)?;
        assert!(rgb
            .as_slice()
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[test]
    fn lab_round_trip_all_u8() -> Result<(), ImageError> {
        // sweep the whole 8-bit cube, one red plane at a time
        let size = [256, 256].into();
        let mut rgb8 = Image::<u8, 3>::from_size_val(size, 0)?;
        let mut rgb_f32 = Rgbf32::from_size_val(size, 0.0)?;
        let mut lab = Labf32::from_size_val(size, 0.0)?;
        let mut rgb_back = Rgbf32::from_size_val(size, 0.0)?;
        let mut rgb8_back = Image::<u8, 3>::from_size_val(size, 0)?;

        for r in 0..=255u8 {
            rgb8.as_slice_mut()
                .chunks_exact_mut(3)
                .enumerate()
                .for_each(|(i, px)| {
                    px[0] = r;
                    px[1] = (i / 256) as u8;
                    px[2] = (i % 256) as u8;
                });

            ops::cast_and_scale(&rgb8, rgb_f32.as_image_mut(), 1.0 / 255.0)?;
            super::lab_from_rgb(&rgb_f32, &mut lab)?;
            super::rgb_from_lab(&lab, &mut rgb_back)?;
            ops::scale_and_quantize_u8(rgb_back.as_image(), &mut rgb8_back, 255.0)?;

            let max_diff = rgb8
                .as_slice()
                .iter()
                .zip(rgb8_back.as_slice())
                .map(|(a, b)| a.abs_diff(*b))
                .max()
                .unwrap_or(0);
            assert!(max_diff <= 2, "red plane {r}: max diff {max_diff}");
        }
        Ok(())
    }

    #[test]
    fn split_and_merge_channels() -> Result<(), ImageError> {
        let lab = Labf32::from_size_vec([2, 1].into(), vec![10.0, -5.0, 5.0, 90.0, 20.0, -30.0])?;

        let mut l = Lf32::from_size_val(lab.size(), 0.0)?;
        let mut ab = Abf32::from_size_val(lab.size(), 0.0)?;
        super::l_from_lab(&lab, &mut l)?;
        super::ab_from_lab(&lab, &mut ab)?;
        assert_eq!(l.as_slice(), &[10.0, 90.0]);
        assert_eq!(ab.as_slice(), &[-5.0, 5.0, 20.0, -30.0]);

        let mut merged = Labf32::from_size_val(lab.size(), 0.0)?;
        super::lab_from_l_ab(&l, &ab, &mut merged)?;
        assert_eq!(merged, lab);
        Ok(())
    }

    #[test]
    fn merge_rejects_misaligned_chroma() -> Result<(), ImageError> {
        let l = Lf32::from_size_val([4, 4].into(), 50.0)?;
        let ab = Abf32::from_size_val([2, 2].into(), 0.0)?;
        let mut dst = Labf32::from_size_val([4, 4].into(), 0.0)?;
        assert_eq!(
            super::lab_from_l_ab(&l, &ab, &mut dst),
            Err(ImageError::InvalidImageSize(4, 4, 2, 2))
        );
        Ok(())
    }
}
