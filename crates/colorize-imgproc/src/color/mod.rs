mod gray;
mod lab;

pub use gray::{gray_from_rgb, gray_from_rgb_u8, rgb_from_gray};
pub use lab::{
    ab_from_lab, l_from_gray, l_from_lab, lab_from_l_ab, lab_from_rgb, rgb8_from_l_ab, rgb_from_lab,
    LAB_WHITE_X, LAB_WHITE_Z,
};
