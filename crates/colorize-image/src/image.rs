use crate::error::ImageError;

/// Width and height of an image in pixels.
///
/// # Examples
///
/// ```
/// use colorize_image::ImageSize;
///
/// let size: ImageSize = [224, 224].into();
/// assert_eq!(size.area(), 224 * 224);
/// assert!(!size.is_empty());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl ImageSize {
    /// Number of pixels covered by the size.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether the size covers no pixel at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from([width, height]: [usize; 2]) -> Self {
        ImageSize { width, height }
    }
}

/// A pixel buffer of `CHANNELS` interleaved samples per pixel, stored row-major.
///
/// The buffer length always equals `width * height * CHANNELS`; constructors refuse anything
/// else. What the samples mean is carried by the wrappers in [`crate::color_spaces`].
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T, const CHANNELS: usize> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T, const CHANNELS: usize> Image<T, CHANNELS> {
    /// Wrap `data` as an image of the given size.
    ///
    /// # Errors
    ///
    /// [`ImageError::InvalidChannelShape`] when the length of `data` does not match.
    ///
    /// # Examples
    ///
    /// ```
    /// use colorize_image::Image;
    ///
    /// let image = Image::<u8, 3>::new([10, 20].into(), vec![0u8; 10 * 20 * 3]).unwrap();
    /// assert_eq!(image.cols(), 10);
    /// assert_eq!(image.rows(), 20);
    ///
    /// assert!(Image::<u8, 3>::new([10, 20].into(), vec![0u8; 10]).is_err());
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        let expected = size.area() * CHANNELS;
        if data.len() != expected {
            return Err(ImageError::InvalidChannelShape(data.len(), expected));
        }
        Ok(Self { size, data })
    }

    /// An image of the given size with every sample set to `val`.
    pub fn from_size_val(size: ImageSize, val: T) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        Image::new(size, vec![val; size.area() * CHANNELS])
    }

    /// Size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Number of columns, the width.
    pub fn cols(&self) -> usize {
        self.size.width
    }

    /// Number of rows, the height.
    pub fn rows(&self) -> usize {
        self.size.height
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Samples per pixel.
    pub fn num_channels(&self) -> usize {
        CHANNELS
    }

    /// All samples, row after row.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// All samples, mutable.
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// The sample at `[row, col, channel]`, or `None` when out of bounds.
    pub fn get(&self, [y, x, c]: [usize; 3]) -> Option<&T> {
        if y >= self.rows() || x >= self.cols() || c >= CHANNELS {
            return None;
        }
        self.data.get((y * self.cols() + x) * CHANNELS + c)
    }
}
