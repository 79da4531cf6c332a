use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use colorize::dnn::ModelHandle;
use colorize::io::{functional as F, ImageFormat};
use colorize::pipeline::colorizer::colorize_rgb8;
use indicatif::{ParallelProgressIterator, ProgressStyle};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

/// Colorize one image file into another.
///
/// The output format follows the extension of `output`.
pub fn colorize_file(
    model: &ModelHandle,
    input: &Path,
    output: &Path,
    jpeg_quality: u8,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let image = F::read_image_rgb8(input)?;
    let colorized = colorize_rgb8(&image, model)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    F::write_image_rgb8(output, &colorized, jpeg_quality)?;
    Ok(())
}

/// Output path of `path` found under `input_dir`, mirrored under `output_dir`.
fn output_path(input_dir: &Path, output_dir: &Path, path: &Path, format: ImageFormat) -> PathBuf {
    let relative = path.strip_prefix(input_dir).unwrap_or(path);
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let name = format!("{stem}_colorized.{}", format.extension());

    match relative.parent() {
        Some(parent) => output_dir.join(parent).join(name),
        None => output_dir.join(name),
    }
}

/// Colorize every image found under `input_dir` into `output_dir`.
///
/// Returns the number of images colorized and the number that failed.
pub fn colorize_dir(
    model: &ModelHandle,
    input_dir: &Path,
    output_dir: &Path,
    format: ImageFormat,
    jpeg_quality: u8,
    num_threads: usize,
) -> Result<(usize, usize), Box<dyn std::error::Error>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()?;

    // Walk through the input directory and collect the paths of the images
    let images_paths: Vec<PathBuf> = walkdir::WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(ImageFormat::from_extension)
                    .is_some()
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();

    if images_paths.is_empty() {
        log::warn!("no images found in {}", input_dir.display());
        return Ok((0, 0));
    }

    log::info!(
        "found {} images in {}, colorizing with {} threads",
        images_paths.len(),
        input_dir.display(),
        num_threads
    );

    let pb = indicatif::ProgressBar::new(images_paths.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({eta}) {msg} {per_sec}",
    )?.progress_chars("##>-"));

    let failed = AtomicUsize::new(0);

    pool.install(|| {
        images_paths
            .par_iter()
            .progress_with(pb)
            .for_each(|path| {
                let output = output_path(input_dir, output_dir, path, format);
                if let Err(e) = colorize_file(model, path, &output, jpeg_quality) {
                    log::warn!("failed to colorize {}: {e}", path.display());
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            });
    });

    let failed = failed.into_inner();
    Ok((images_paths.len() - failed, failed))
}
