//! Pixel interpolation methods used when resampling images.
//!
//! # Interpolation Modes
//!
//! - **Nearest**: Fastest, uses nearest pixel value (no interpolation)
//! - **Bilinear**: Smooth linear interpolation between adjacent pixels
//! - **Area**: Box averaging over the covered source pixels, suited for shrinking

mod bilinear;
mod nearest;

pub(crate) use bilinear::bilinear_interpolation;
pub(crate) use nearest::nearest_neighbor_interpolation;

/// Interpolation mode for the resize operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum InterpolationMode {
    /// Bilinear interpolation
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "linear"))]
    Bilinear,
    /// Nearest neighbor interpolation
    Nearest,
    /// Area averaging; falls back to bilinear along axes that are enlarged
    Area,
}

impl std::str::FromStr for InterpolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bilinear" | "linear" => Ok(Self::Bilinear),
            "nearest" => Ok(Self::Nearest),
            "area" => Ok(Self::Area),
            other => Err(format!("unknown interpolation mode: {other}")),
        }
    }
}

/// Map a destination coordinate to the source grid using pixel-center alignment.
#[inline]
pub(crate) fn src_coordinate(dst: usize, scale: f32, src_len: usize) -> f32 {
    let x = (dst as f32 + 0.5) * scale - 0.5;
    x.clamp(0.0, (src_len - 1) as f32)
}

#[cfg(test)]
mod tests {
    use super::InterpolationMode;

    #[test]
    fn parse_modes() {
        assert_eq!("area".parse(), Ok(InterpolationMode::Area));
        assert_eq!("Bilinear".parse(), Ok(InterpolationMode::Bilinear));
        assert_eq!("nearest".parse(), Ok(InterpolationMode::Nearest));
        assert!("cubic".parse::<InterpolationMode>().is_err());
    }

    #[test]
    fn center_alignment() {
        // shrinking by two lands between source pixels
        assert_eq!(super::src_coordinate(0, 2.0, 4), 0.5);
        assert_eq!(super::src_coordinate(1, 2.0, 4), 2.5);
        // coordinates are clamped to the source grid
        assert_eq!(super::src_coordinate(0, 0.25, 4), 0.0);
        assert_eq!(super::src_coordinate(15, 0.25, 4), 3.0);
    }
}
