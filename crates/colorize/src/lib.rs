#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use colorize_image as image;

#[doc(inline)]
pub use colorize_imgproc as imgproc;

#[doc(inline)]
pub use colorize_io as io;

#[doc(inline)]
pub use colorize_dnn as dnn;

#[doc(inline)]
pub use colorize_pipeline as pipeline;
