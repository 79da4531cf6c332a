use std::path::Path;

use colorize_image::{Image, ImageSize};
use rayon::prelude::*;

use crate::error::DnnError;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Centers of the quantized AB gamut, one `[a, b]` pair per bin.
///
/// The published model uses 313 bins on a grid of step 10 inside the sRGB gamut.
#[derive(Clone, Debug, PartialEq)]
pub struct AbBins {
    centers: Vec<[f32; 2]>,
}

impl AbBins {
    /// Create a bin table from its centers.
    pub fn new(centers: Vec<[f32; 2]>) -> Result<Self, DnnError> {
        if centers.is_empty() {
            return Err(DnnError::InvalidBins("the table has no bins".into()));
        }
        if centers.iter().flatten().any(|v| !v.is_finite()) {
            return Err(DnnError::InvalidBins("non-finite bin center".into()));
        }
        Ok(Self { centers })
    }

    /// Load a bin table from a `.npy` array of shape `(Q, 2)` or a JSON list of pairs.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DnnError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&bytes),
            _ => Self::from_npy(&bytes),
        }
    }

    /// Parse a JSON list of `[a, b]` pairs.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DnnError> {
        let centers: Vec<[f32; 2]> =
            serde_json::from_slice(bytes).map_err(|e| DnnError::InvalidBins(e.to_string()))?;
        Self::new(centers)
    }

    /// Parse a NumPy `.npy` array of shape `(Q, 2)` holding floats or integers.
    pub fn from_npy(bytes: &[u8]) -> Result<Self, DnnError> {
        let header = NpyHeader::parse(bytes)?;
        let [rows, cols] = header.shape;
        if cols != 2 {
            return Err(DnnError::InvalidBins(format!(
                "expected shape (Q, 2), got ({rows}, {cols})"
            )));
        }

        let count = rows
            .checked_mul(cols)
            .ok_or_else(|| DnnError::InvalidBins(format!("shape ({rows}, {cols}) overflows")))?;
        let body = &bytes[header.data_offset..];
        let values = header.dtype.read_all(body, count)?;

        let centers = (0..rows)
            .map(|q| {
                if header.fortran_order {
                    [values[q], values[rows + q]]
                } else {
                    [values[2 * q], values[2 * q + 1]]
                }
            })
            .collect();
        Self::new(centers)
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Whether the table is empty. Never true for a constructed table.
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// The bin centers.
    pub fn centers(&self) -> &[[f32; 2]] {
        &self.centers
    }

    /// Decode planar bin logits into interleaved AB with the annealed mean.
    ///
    /// Every pixel gets `Σ_q softmax(T · z)_q · center_q`.
    ///
    /// # Arguments
    ///
    /// * `logits` - `Q * height * width` values, one plane per bin.
    /// * `size` - Spatial size of the planes.
    /// * `temperature` - Annealing factor `T`.
    pub fn decode_annealed(
        &self,
        logits: &[f32],
        size: ImageSize,
        temperature: f32,
    ) -> Result<Image<f32, 2>, DnnError> {
        let plane = size.area();
        if logits.len() != self.len() * plane {
            return Err(DnnError::OutputShapeMismatch {
                channels: if plane == 0 { 0 } else { logits.len() / plane },
                size,
                reason: format!("expected {} bin planes", self.len()),
            });
        }

        let mut ab = vec![0.0f32; 2 * plane];
        ab.par_chunks_exact_mut(2).enumerate().for_each(|(i, out)| {
            let max = (0..self.len())
                .map(|q| temperature * logits[q * plane + i])
                .fold(f32::NEG_INFINITY, f32::max);

            let (mut norm, mut a, mut b) = (0.0f32, 0.0f32, 0.0f32);
            for (q, center) in self.centers.iter().enumerate() {
                let w = (temperature * logits[q * plane + i] - max).exp();
                norm += w;
                a += w * center[0];
                b += w * center[1];
            }

            out[0] = a / norm;
            out[1] = b / norm;
        });

        Ok(Image::new(size, ab)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum NpyDtype {
    F8,
    F4,
    I8,
    I4,
}

impl NpyDtype {
    fn parse(descr: &str) -> Result<Self, DnnError> {
        match descr {
            "<f8" => Ok(Self::F8),
            "<f4" => Ok(Self::F4),
            "<i8" => Ok(Self::I8),
            "<i4" => Ok(Self::I4),
            other => Err(DnnError::InvalidBins(format!("unsupported dtype {other}"))),
        }
    }

    fn width(&self) -> usize {
        match self {
            Self::F8 | Self::I8 => 8,
            Self::F4 | Self::I4 => 4,
        }
    }

    fn read_all(&self, body: &[u8], count: usize) -> Result<Vec<f32>, DnnError> {
        let width = self.width();
        let len = count
            .checked_mul(width)
            .filter(|&len| len <= body.len())
            .ok_or_else(|| {
                DnnError::InvalidBins(format!(
                    "truncated array: {} bytes for {count} values",
                    body.len()
                ))
            })?;

        let values = body[..len]
            .chunks_exact(width)
            .map(|c| match self {
                Self::F8 => f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32,
                Self::I8 => i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32,
                Self::F4 => f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                Self::I4 => i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32,
            })
            .collect();
        Ok(values)
    }
}

struct NpyHeader {
    dtype: NpyDtype,
    fortran_order: bool,
    shape: [usize; 2],
    data_offset: usize,
}

impl NpyHeader {
    // format: magic, major, minor, header length (u16 for v1, u32 after), python dict literal
    fn parse(bytes: &[u8]) -> Result<Self, DnnError> {
        let invalid = |msg: &str| DnnError::InvalidBins(msg.to_string());

        if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
            return Err(invalid("missing npy magic"));
        }

        let (header_len, start): (usize, usize) = match bytes[6] {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 if bytes.len() >= 12 => (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            ),
            _ => return Err(invalid("unsupported npy version")),
        };

        let dict = start
            .checked_add(header_len)
            .and_then(|end| bytes.get(start..end))
            .and_then(|h| std::str::from_utf8(h).ok())
            .ok_or_else(|| invalid("truncated npy header"))?;

        let descr = dict_value(dict, "descr")
            .map(|v| v.trim_matches(|c| c == '\'' || c == '"'))
            .ok_or_else(|| invalid("missing descr"))?;
        let fortran_order = dict_value(dict, "fortran_order") == Some("True");
        let shape = dict_value(dict, "shape").ok_or_else(|| invalid("missing shape"))?;

        let dims = shape
            .trim_matches(|c| c == '(' || c == ')')
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| d.parse::<usize>().map_err(|_| invalid("bad shape")))
            .collect::<Result<Vec<_>, _>>()?;

        let shape = match dims.as_slice() {
            [rows, cols] => [*rows, *cols],
            _ => return Err(invalid("expected a two dimensional array")),
        };

        Ok(Self {
            dtype: NpyDtype::parse(descr)?,
            fortran_order,
            shape,
            data_offset: start + header_len,
        })
    }
}

// value of `key` in a python dict literal; tuples are returned whole
fn dict_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let pos = dict.find(&format!("'{key}'"))?;
    let rest = dict[pos + key.len() + 2..].trim_start().strip_prefix(':')?.trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find([',', '}'])?
    };
    Some(rest[..end].trim())
}
