/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Error to open the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// The byte stream carries no signature of a known image container.
    #[error("Unrecognised image signature")]
    UnknownFormat,

    /// The container is recognised but not handled by this codec.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Error to decode the JPEG image.
    #[error("Error with Jpeg decoding. {0}")]
    JpegDecodingError(#[from] zune_jpeg::errors::DecodeErrors),

    /// Error to encode the JPEG image.
    #[error("Error with Jpeg encoding. {0}")]
    JpegEncodingError(#[from] jpeg_encoder::EncodingError),

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] colorize_image::ImageError),

    /// Error to decode the image.
    #[error("Failed to decode the image. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// Error to encode the PNG image.
    #[error("Failed to encode the png image. {0}")]
    PngEncodingError(String),

    /// Error to decode the PNG image.
    #[error("Failed to decode the png image. {0}")]
    PngDecodeError(String),

    /// The decoded sample count does not describe a supported channel layout.
    #[error("Unsupported channel layout: {0} samples for {1} pixels")]
    InvalidChannelLayout(usize, usize),

    /// The image is too large for the target container.
    #[error("Image of {0}x{1} pixels cannot be encoded as {2}")]
    EncodeDimensionsTooLarge(usize, usize, &'static str),
}

impl IoError {
    /// Whether the error originates from encoding rather than decoding or file access.
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            IoError::JpegEncodingError(_)
                | IoError::PngEncodingError(_)
                | IoError::EncodeDimensionsTooLarge(..)
        )
    }
}
