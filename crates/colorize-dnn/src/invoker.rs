use colorize_image::{Abf32, Image, Lf32};
use colorize_imgproc::{interpolation::InterpolationMode, resize::resize_native};

use crate::{
    error::DnnError,
    model::{ModelHandle, ModelOutput},
};

/// Predict the chrominance of a luminance channel.
///
/// L is resized to the model input resolution with the configured interpolation and centered,
/// the model runs once, its output is decoded into AB (directly or through the bin table) and
/// resized back to the size of `l` with bilinear interpolation.
///
/// # Arguments
///
/// * `l` - The luminance channel, L in `[0, 100]`.
/// * `model` - The loaded model handle.
///
/// # Returns
///
/// The predicted a and b channels at the size of `l`, clamped to `[-128, 127]`.
///
/// # Errors
///
/// * [`DnnError::ModelUnavailable`] when the handle holds no model.
/// * [`DnnError::OutputShapeMismatch`] when the output is neither two planes nor one plane
///   per bin.
/// * [`DnnError::NonFiniteOutput`] when the output contains NaN or infinities.
pub fn colorize(l: &Lf32, model: &ModelHandle) -> Result<Abf32, DnnError> {
    let network = model.model()?;
    let config = model.preprocess();

    // resize to the fixed network resolution and center
    let mut input = Image::<f32, 1>::from_size_val(config.input_size, 0.0)?;
    resize_native(l.as_image(), &mut input, config.interpolation)?;
    input
        .as_slice_mut()
        .iter_mut()
        .for_each(|v| *v -= config.l_center);

    let output = network.forward(&input)?;
    log::debug!(
        "{} produced {} planes of {}",
        network.name(),
        output.channels,
        output.size
    );

    let ab_small = decode_output(output, model)?;

    let mut ab = Image::<f32, 2>::from_size_val(l.size(), 0.0)?;
    resize_native(&ab_small, &mut ab, InterpolationMode::Bilinear)?;
    ab.as_slice_mut()
        .iter_mut()
        .for_each(|v| *v = v.clamp(-128.0, 127.0));

    Ok(Abf32::from(ab))
}

fn decode_output(output: ModelOutput, model: &ModelHandle) -> Result<Image<f32, 2>, DnnError> {
    let ModelOutput {
        channels,
        size,
        data,
    } = output;

    let mismatch = |reason: String| DnnError::OutputShapeMismatch {
        channels,
        size,
        reason,
    };

    if size.is_empty() {
        return Err(mismatch("empty spatial size".into()));
    }
    if data.len() != channels * size.area() {
        return Err(mismatch(format!("{} values in the buffer", data.len())));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(DnnError::NonFiniteOutput);
    }

    match (channels, model.bins()) {
        (2, _) => {
            // planar (a, b) to interleaved
            let plane = size.area();
            let ab = (0..plane).flat_map(|i| [data[i], data[plane + i]]).collect();
            Ok(Image::new(size, ab)?)
        }
        (q, Some(bins)) if q == bins.len() => {
            bins.decode_annealed(&data, size, model.preprocess().annealing)
        }
        (_, Some(bins)) => Err(mismatch(format!(
            "expected 2 or {} output planes",
            bins.len()
        ))),
        (_, None) => Err(mismatch("expected 2 output planes and no bin table is loaded".into())),
    }
}
