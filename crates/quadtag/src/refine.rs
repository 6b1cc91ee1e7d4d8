//! Gradient-based subpixel corner refinement.
//!
//! Classic saddle-point refinement: inside a small window, every image
//! gradient should be orthogonal to the vector from the true corner to the
//! sample point. Accumulating that condition over the window gives a 2x2
//! linear system whose solution is the refined corner.

use nalgebra::Point2;

use quadtag_core::{sample_bilinear, GrayImageView};

/// Half-width of the refinement window, in pixels.
const HALF_WINDOW: i32 = 5;

const MAX_ITERS: usize = 10;

/// Iteration stops once the corner moves less than this.
const MIN_SHIFT: f64 = 1e-3;

/// Refine a single corner. Returns the input unchanged when the window
/// leaves the image or the local gradient structure is degenerate.
pub(crate) fn refine_corner(img: &GrayImageView<'_>, initial: Point2<f64>) -> Point2<f64> {
    let sigma = HALF_WINDOW as f64 / 2.0;
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);

    let mut c = initial;
    for _ in 0..MAX_ITERS {
        let mut a11 = 0.0;
        let mut a12 = 0.0;
        let mut a22 = 0.0;
        let mut b1 = 0.0;
        let mut b2 = 0.0;

        for dy in -HALF_WINDOW..=HALF_WINDOW {
            for dx in -HALF_WINDOW..=HALF_WINDOW {
                let px = c.x + dx as f64;
                let py = c.y + dy as f64;
                if px < 1.5
                    || py < 1.5
                    || px > img.width as f64 - 2.5
                    || py > img.height as f64 - 2.5
                {
                    return initial;
                }

                let ix = 0.5
                    * (sample_bilinear(img, (px + 1.0) as f32, py as f32)
                        - sample_bilinear(img, (px - 1.0) as f32, py as f32))
                        as f64;
                let iy = 0.5
                    * (sample_bilinear(img, px as f32, (py + 1.0) as f32)
                        - sample_bilinear(img, px as f32, (py - 1.0) as f32))
                        as f64;

                let w = (-((dx * dx + dy * dy) as f64) * inv_two_sigma_sq).exp();
                let gxx = w * ix * ix;
                let gxy = w * ix * iy;
                let gyy = w * iy * iy;

                a11 += gxx;
                a12 += gxy;
                a22 += gyy;
                b1 += gxx * px + gxy * py;
                b2 += gxy * px + gyy * py;
            }
        }

        let det = a11 * a22 - a12 * a12;
        if det.abs() < 1e-9 {
            break;
        }

        let next = Point2::new((a22 * b1 - a12 * b2) / det, (a11 * b2 - a12 * b1) / det);
        let shift = (next - c).norm();
        if shift > HALF_WINDOW as f64 {
            // Diverging; keep the last stable estimate.
            break;
        }
        c = next;
        if shift < MIN_SHIFT {
            break;
        }
    }
    c
}

/// Refine all four corners of a quad in place.
pub(crate) fn refine_quad(img: &GrayImageView<'_>, corners: &mut [Point2<f64>; 4]) {
    for c in corners.iter_mut() {
        *c = refine_corner(img, *c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadtag_core::GrayImage;

    /// Checkerboard X-junction at (cx, cy), area-antialiased so edges carry
    /// exact subpixel information.
    fn junction_image(size: usize, cx: f64, cy: f64) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        for j in 0..size {
            for i in 0..size {
                // Pixel (i, j) covers [i - 0.5, i + 0.5] x [j - 0.5, j + 0.5].
                let a = (cx - (i as f64 - 0.5)).clamp(0.0, 1.0); // fraction left of cx
                let b = (cy - (j as f64 - 0.5)).clamp(0.0, 1.0); // fraction above cy
                let frac = a * b + (1.0 - a) * (1.0 - b);
                img.data[j * size + i] = (255.0 * frac).round() as u8;
            }
        }
        img
    }

    #[test]
    fn converges_to_saddle_point() {
        let (cx, cy) = (20.3, 22.7);
        let img = junction_image(48, cx, cy);

        let start = Point2::new(21.5, 21.5);
        let refined = refine_corner(&img.as_view(), start);

        let before = (start - Point2::new(cx, cy)).norm();
        let after = (refined - Point2::new(cx, cy)).norm();
        assert!(after < before, "no improvement: {before:.3} -> {after:.3}");
        assert!(after < 0.5, "refined corner off by {after:.3}");
    }

    #[test]
    fn flat_patch_is_left_unchanged() {
        let img = GrayImage {
            width: 32,
            height: 32,
            data: vec![128u8; 32 * 32],
        };
        let start = Point2::new(16.0, 16.0);
        let refined = refine_corner(&img.as_view(), start);
        assert_eq!(refined, start);
    }

    #[test]
    fn window_outside_image_is_left_unchanged() {
        let img = junction_image(48, 20.0, 20.0);
        let start = Point2::new(2.0, 2.0);
        assert_eq!(refine_corner(&img.as_view(), start), start);
    }
}
