/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when the image sizes do not match.
    #[error("Image size mismatch: ({0}x{1}) vs ({2}x{3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when the image has no pixels.
    #[error("Image must have at least one pixel, got {0}")]
    EmptyImage(crate::ImageSize),

    /// Error when a value cannot be cast to the target type.
    #[error("Failed to cast image data to {0}")]
    CastError(String),
}
