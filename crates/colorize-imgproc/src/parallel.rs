use rayon::prelude::*;

use colorize_image::Image;

/// Apply a function to each pixel in the image in parallel.
///
/// The closure receives the source pixel and the destination pixel as channel slices.
pub fn par_iter_rows<T1, const C1: usize, T2, const C2: usize>(
    src: &Image<T1, C1>,
    dst: &mut Image<T2, C2>,
    f: impl Fn(&[T1], &mut [T2]) + Send + Sync,
) where
    T1: Clone + Send + Sync,
    T2: Clone + Send + Sync,
{
    let cols = src.cols();
    if cols == 0 {
        return;
    }
    src.as_slice()
        .par_chunks_exact(C1 * cols)
        .zip(dst.as_slice_mut().par_chunks_exact_mut(C2 * cols))
        .for_each(|(src_chunk, dst_chunk)| {
            src_chunk
                .chunks_exact(C1)
                .zip(dst_chunk.chunks_exact_mut(C2))
                .for_each(|(src_pixel, dst_pixel)| {
                    f(src_pixel, dst_pixel);
                });
        });
}

/// Apply a function to each pair of pixels from two images in parallel.
///
/// The closure receives the pixels of both sources and the destination pixel.
pub fn par_iter_rows_two<T1, const C1: usize, T2, const C2: usize, T3, const C3: usize>(
    src1: &Image<T1, C1>,
    src2: &Image<T2, C2>,
    dst: &mut Image<T3, C3>,
    f: impl Fn(&[T1], &[T2], &mut [T3]) + Send + Sync,
) where
    T1: Clone + Send + Sync,
    T2: Clone + Send + Sync,
    T3: Clone + Send + Sync,
{
    let cols = src1.cols();
    if cols == 0 {
        return;
    }
    src1.as_slice()
        .par_chunks_exact(C1 * cols)
        .zip(src2.as_slice().par_chunks_exact(C2 * cols))
        .zip(dst.as_slice_mut().par_chunks_exact_mut(C3 * cols))
        .for_each(|((src1_chunk, src2_chunk), dst_chunk)| {
            src1_chunk
                .chunks_exact(C1)
                .zip(src2_chunk.chunks_exact(C2))
                .zip(dst_chunk.chunks_exact_mut(C3))
                .for_each(|((src1_pixel, src2_pixel), dst_pixel)| {
                    f(src1_pixel, src2_pixel, dst_pixel);
                });
        });
}

/// Fill each output row in parallel, given the row index.
pub fn par_iter_dst_rows<T, const C: usize>(
    dst: &mut Image<T, C>,
    f: impl Fn(usize, &mut [T]) + Send + Sync,
) where
    T: Clone + Send + Sync,
{
    let cols = dst.cols();
    if cols == 0 {
        return;
    }
    dst.as_slice_mut()
        .par_chunks_exact_mut(C * cols)
        .enumerate()
        .for_each(|(row, dst_row)| f(row, dst_row));
}

#[cfg(test)]
mod tests {
    use colorize_image::{Image, ImageError};

    #[test]
    fn iter_rows_copies_pixels() -> Result<(), ImageError> {
        let src = Image::<u8, 2>::new([2, 2].into(), vec![1, 2, 3, 4, 5, 6, 7, 8])?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::par_iter_rows(&src, &mut dst, |s, d| d[0] = s[0] + s[1]);
        assert_eq!(dst.as_slice(), &[3, 7, 11, 15]);
        Ok(())
    }

    #[test]
    fn iter_rows_two_merges() -> Result<(), ImageError> {
        let a = Image::<u8, 1>::new([3, 1].into(), vec![1, 2, 3])?;
        let b = Image::<u8, 2>::new([3, 1].into(), vec![4, 5, 6, 7, 8, 9])?;
        let mut dst = Image::<u8, 3>::from_size_val(a.size(), 0)?;
        super::par_iter_rows_two(&a, &b, &mut dst, |x, y, d| {
            d[0] = x[0];
            d[1] = y[0];
            d[2] = y[1];
        });
        assert_eq!(dst.as_slice(), &[1, 4, 5, 2, 6, 7, 3, 8, 9]);
        Ok(())
    }

    #[test]
    fn iter_dst_rows_indices() -> Result<(), ImageError> {
        let mut dst = Image::<usize, 1>::from_size_val([2, 3].into(), 0)?;
        super::par_iter_dst_rows(&mut dst, |row, out| out.iter_mut().for_each(|v| *v = row));
        assert_eq!(dst.as_slice(), &[0, 0, 1, 1, 2, 2]);
        Ok(())
    }
}
