use colorize_dnn::ModelHandle;
use colorize_image::{Image, ImageError, Lf32, Rgb8};
use colorize_imgproc::color::{gray_from_rgb_u8, l_from_gray, rgb8_from_l_ab};

use crate::{error::PipelineError, ledger::PipelineStage};

/// Colorize a decoded RGB image.
///
/// The image is reduced to grayscale first so any existing chrominance is discarded, and its
/// LAB luminance is computed from the gray level. The model predicts AB at its own
/// resolution from the L channel; the prediction is merged with the full-resolution L and
/// converted back to 8-bit RGB.
///
/// Besides `src`, at most the L plane, the AB planes and the output are alive at once, so
/// with `src` about 18 bytes per pixel.
///
/// Failures report the step being entered: [`PipelineStage::Inferred`] up to and including
/// the forward pass, [`PipelineStage::Merged`] for the recombination.
pub fn colorize_rgb8(src: &Rgb8, model: &ModelHandle) -> Result<Rgb8, PipelineError> {
    let l = luminance(src).map_err(|e| PipelineError::new(PipelineStage::Inferred, e))?;

    let ab = colorize_dnn::colorize(&l, model)
        .map_err(|e| PipelineError::new(PipelineStage::Inferred, e))?;

    let mut out = Rgb8::from_size_val(src.size(), 0)
        .map_err(|e| PipelineError::new(PipelineStage::Merged, e))?;
    rgb8_from_l_ab(&l, &ab, &mut out).map_err(|e| PipelineError::new(PipelineStage::Merged, e))?;

    Ok(out)
}

/// L channel of the grayscale version of `src`.
fn luminance(src: &Rgb8) -> Result<Lf32, ImageError> {
    let mut gray = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    gray_from_rgb_u8(src.as_image(), &mut gray)?;

    let mut l = Lf32::from_size_val(src.size(), 0.0)?;
    l_from_gray(&gray, &mut l)?;

    Ok(l)
}
