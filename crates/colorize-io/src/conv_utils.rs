use crate::error::IoError;

/// Normalize an interleaved 8-bit buffer of 1, 2, 3 or 4 channels into RGB.
///
/// Gray is replicated, alpha is dropped.
pub(crate) fn rgb8_from_interleaved(buf: Vec<u8>, num_pixels: usize) -> Result<Vec<u8>, IoError> {
    if num_pixels == 0 || buf.len() % num_pixels != 0 {
        return Err(IoError::InvalidChannelLayout(buf.len(), num_pixels));
    }

    let rgb = match buf.len() / num_pixels {
        3 => buf,
        1 => buf.iter().flat_map(|&g| [g, g, g]).collect(),
        2 => buf.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0]]).collect(),
        4 => buf
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect(),
        _ => return Err(IoError::InvalidChannelLayout(buf.len(), num_pixels)),
    };

    Ok(rgb)
}
