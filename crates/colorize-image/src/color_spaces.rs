use crate::{
    error::ImageError,
    image::{Image, ImageSize},
};
use std::ops::{Deref, DerefMut};

/// A channel-space tag attached to an image wrapper.
///
/// Every wrapper declares the name of its channel space and the nominal value range of each
/// channel, so conversions state what they consume and what they produce.
pub trait ChannelSpace {
    /// Short name of the channel space, e.g. `"LAB"`.
    const NAME: &'static str;

    /// Nominal `(min, max)` range of each channel.
    fn ranges() -> &'static [(f32, f32)];
}

/// Macro to define a channel-space wrapper type with explicit sample type and range
macro_rules! define_color_space {
    ($name:ident, $type:ty, $channels:expr, $space:expr, [$(($lo:expr, $hi:expr)),+], $doc:expr) => {
        #[doc = $doc]
        ///
        /// This is a zero-cost wrapper that provides compile-time channel-space safety.
        #[repr(transparent)]
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name(pub Image<$type, $channels>);

        impl $name {
            #[doc = concat!("Create ", stringify!($name), " image from size and data")]
            pub fn from_size_vec(size: ImageSize, data: Vec<$type>) -> Result<Self, ImageError> {
                Ok(Self(Image::new(size, data)?))
            }

            #[doc = concat!("Create ", stringify!($name), " image from size with default value")]
            pub fn from_size_val(size: ImageSize, val: $type) -> Result<Self, ImageError> {
                Ok(Self(Image::from_size_val(size, val)?))
            }

            /// Unwrap into the underlying Image
            pub fn into_inner(self) -> Image<$type, $channels> {
                self.0
            }

            /// Get a reference to the underlying Image
            pub fn as_image(&self) -> &Image<$type, $channels> {
                &self.0
            }

            /// Get a mutable reference to the underlying Image
            pub fn as_image_mut(&mut self) -> &mut Image<$type, $channels> {
                &mut self.0
            }
        }

        impl ChannelSpace for $name {
            const NAME: &'static str = $space;

            fn ranges() -> &'static [(f32, f32)] {
                &[$(($lo, $hi)),+]
            }
        }

        impl From<Image<$type, $channels>> for $name {
            fn from(image: Image<$type, $channels>) -> Self {
                Self(image)
            }
        }

        impl Deref for $name {
            type Target = Image<$type, $channels>;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl AsRef<Image<$type, $channels>> for $name {
            fn as_ref(&self) -> &Image<$type, $channels> {
                &self.0
            }
        }
    };
}

define_color_space!(
    Rgb8,
    u8,
    3,
    "RGB",
    [(0.0, 255.0), (0.0, 255.0), (0.0, 255.0)],
    "RGB color space with 8-bit unsigned integer channels in [0, 255]"
);

define_color_space!(
    Gray8,
    u8,
    1,
    "GRAY",
    [(0.0, 255.0)],
    "Grayscale with an 8-bit unsigned integer channel in [0, 255]"
);

define_color_space!(
    Rgbf32,
    f32,
    3,
    "RGB",
    [(0.0, 1.0), (0.0, 1.0), (0.0, 1.0)],
    "RGB color space with 32-bit floating point channels normalized to [0, 1]"
);

define_color_space!(
    Labf32,
    f32,
    3,
    "LAB",
    [(0.0, 100.0), (-128.0, 127.0), (-128.0, 127.0)],
    "CIE LAB color space (D65) with L in [0, 100] and a, b in [-128, 127]"
);

define_color_space!(
    Lf32,
    f32,
    1,
    "L",
    [(0.0, 100.0)],
    "Luminance-only channel of the LAB color space, L in [0, 100]"
);

define_color_space!(
    Abf32,
    f32,
    2,
    "AB",
    [(-128.0, 127.0), (-128.0, 127.0)],
    "Chrominance-only channels of the LAB color space, a and b in [-128, 127]"
);
