//! Lightweight grayscale image types.
//!
//! Detection operates on a borrowed [`GrayImageView`] so callers can feed
//! pixels from any source (an `image::GrayImage`, a camera driver buffer, a
//! slice of a larger frame) without copying.

/// Borrowed single-channel 8-bit image.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Owned single-channel 8-bit image.
#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height],
        }
    }

    #[inline]
    pub fn as_view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl GrayImageView<'_> {
    /// True when dimensions are non-zero and the buffer length matches.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.width * self.height
    }
}

#[inline]
pub fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Mean of the 3x3 neighborhood around `(x, y)`, zero-padded at the borders.
#[inline]
pub fn sample_mean_3x3(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    let ix = x.floor() as i32;
    let iy = y.floor() as i32;
    let mut sum = 0u32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += get_gray(src, ix + dx, iy + dy) as u32;
        }
    }
    (sum / 9) as u8
}

/// Integer box decimation by `factor` (>= 2): each output pixel is the mean
/// of the corresponding `factor x factor` block. Trailing rows/columns that
/// do not fill a whole block are dropped.
pub fn decimate(src: &GrayImageView<'_>, factor: usize) -> GrayImage {
    debug_assert!(factor >= 2);
    let out_w = src.width / factor;
    let out_h = src.height / factor;
    let mut out = vec![0u8; out_w * out_h];
    let norm = (factor * factor) as u32;

    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut sum = 0u32;
            for dy in 0..factor {
                let row = (oy * factor + dy) * src.width + ox * factor;
                for dx in 0..factor {
                    sum += src.data[row + dx] as u32;
                }
            }
            out[oy * out_w + ox] = (sum / norm) as u8;
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data: out,
    }
}

/// Map a pixel-center coordinate in a decimated image back to the source
/// image. Inverse of the block-center convention used by [`decimate`].
#[inline]
pub fn undecimate_coord(x: f64, factor: usize) -> f64 {
    let f = factor as f64;
    (x + 0.5) * f - 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_validity() {
        let img = GrayImage::new(4, 3);
        assert!(img.as_view().is_valid());

        let bad = GrayImageView {
            width: 4,
            height: 3,
            data: &[0u8; 5],
        };
        assert!(!bad.is_valid());

        let empty = GrayImageView {
            width: 0,
            height: 0,
            data: &[],
        };
        assert!(!empty.is_valid());
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage {
            width: 2,
            height: 1,
            data: vec![0, 100],
        };
        let v = sample_bilinear(&img.as_view(), 0.5, 0.0);
        assert!((v - 50.0).abs() < 1e-4);
    }

    #[test]
    fn decimate_averages_blocks() {
        let img = GrayImage {
            width: 4,
            height: 2,
            data: vec![10, 30, 0, 0, 10, 30, 0, 0],
        };
        let out = decimate(&img.as_view(), 2);
        assert_eq!(out.width, 2);
        assert_eq!(out.height, 1);
        assert_eq!(out.data, vec![20, 0]);
    }

    #[test]
    fn undecimate_maps_block_centers() {
        // decimated pixel 0 with factor 2 covers source pixels 0..2
        assert!((undecimate_coord(0.0, 2) - 0.5).abs() < 1e-12);
        assert!((undecimate_coord(1.0, 2) - 2.5).abs() < 1e-12);
    }
}
