//! Shared quad decoding: bit sampling, thresholding, dictionary matching
//! and corner anchoring.
//!
//! Both engines hand candidate quads to [`decode_quad`]. The quad is given
//! in image order (top-left first, clockwise on screen); the decoder maps a
//! unit square onto it, samples every cell including the black border ring,
//! matches the payload against the family dictionary, and rotates the
//! corner indices so that index 0 lands on the tag's lower-left corner in
//! tag coordinates with counter-clockwise winding.

use nalgebra::Point2;

use quadtag_core::{homography_from_4pt, sample_mean_3x3, GrayImageView};

use crate::dictionary::Matcher;

/// Quads with a shorter side than this are too small to sample reliably.
const MIN_SIDE_PX: f64 = 10.0;

/// Minimum fraction of border cells that must read dark.
const MIN_BORDER_RATIO: f64 = 0.85;

#[derive(Clone, Copy, Debug)]
pub(crate) struct DecodedQuad {
    pub id: u32,
    pub hamming: u8,
    pub center: Point2<f64>,
    /// Canonically wound corners (lower-left first, CCW in tag frame).
    pub corners: [Point2<f64>; 4],
}

/// Order four quad points as top-left first, clockwise on screen.
///
/// With the y axis pointing down, sorting by angle around the centroid
/// yields exactly that order.
pub(crate) fn order_quad_tl_cw(pts: [Point2<f64>; 4]) -> [Point2<f64>; 4] {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let mut out = pts;
    out.sort_by(|a, b| {
        let aa = (a.y - cy).atan2(a.x - cx);
        let ab = (b.y - cy).atan2(b.x - cx);
        aa.partial_cmp(&ab).unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

/// Intersection of the two quad diagonals.
pub(crate) fn quad_center(q: &[Point2<f64>; 4]) -> Point2<f64> {
    let d1 = q[2] - q[0];
    let d2 = q[3] - q[1];
    let r = q[1] - q[0];

    let denom = d1.x * (-d2.y) - d1.y * (-d2.x);
    if denom.abs() < 1e-12 {
        // Degenerate quad; fall back to the centroid.
        return Point2::new(
            (q[0].x + q[1].x + q[2].x + q[3].x) / 4.0,
            (q[0].y + q[1].y + q[2].y + q[3].y) / 4.0,
        );
    }
    let t = (r.x * (-d2.y) - r.y * (-d2.x)) / denom;
    Point2::new(q[0].x + t * d1.x, q[0].y + t * d1.y)
}

/// Otsu split over a small set of cell samples.
///
/// Operates directly on the sorted samples rather than a 256-bin histogram;
/// with at most a few dozen cells per quad this is exact and cheap.
fn otsu_from_samples(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let total: f64 = sorted.iter().sum();

    let mut best_sep = -1.0;
    let mut best_thr = sorted[0];
    let mut sum_lo = 0.0;

    for k in 1..n {
        sum_lo += sorted[k - 1];
        let n_lo = k as f64;
        let n_hi = (n - k) as f64;
        let mean_lo = sum_lo / n_lo;
        let mean_hi = (total - sum_lo) / n_hi;
        let sep = n_lo * n_hi * (mean_lo - mean_hi) * (mean_lo - mean_hi);
        if sep > best_sep {
            best_sep = sep;
            best_thr = (sorted[k - 1] + sorted[k]) / 2.0;
        }
    }
    best_thr
}

/// Signed area via the shoelace formula (positive for clockwise order on
/// screen, where y points down).
pub(crate) fn quad_area(q: &[Point2<f64>; 4]) -> f64 {
    let mut s = 0.0;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        s += a.x * b.y - b.x * a.y;
    }
    s / 2.0
}

/// True when all four turns have the same sign and none is degenerate.
pub(crate) fn quad_is_convex(q: &[Point2<f64>; 4]) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        let c = q[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn side_lengths(q: &[Point2<f64>; 4]) -> [f64; 4] {
    [
        (q[1] - q[0]).norm(),
        (q[2] - q[1]).norm(),
        (q[3] - q[2]).norm(),
        (q[0] - q[3]).norm(),
    ]
}

/// Sample and decode one candidate quad.
///
/// `quad` must be ordered top-left first, clockwise on screen (see
/// [`order_quad_tl_cw`]). Returns `None` when the quad is too small, the
/// border ring does not read dark, or the payload matches no dictionary
/// entry within the correction budget.
pub(crate) fn decode_quad(
    img: &GrayImageView<'_>,
    quad: [Point2<f64>; 4],
    matcher: &Matcher,
    black_border: u32,
) -> Option<DecodedQuad> {
    if side_lengths(&quad).iter().any(|&s| s < MIN_SIDE_PX) {
        return None;
    }

    let unit = [
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(1.0, 1.0),
        Point2::new(0.0, 1.0),
    ];
    let h = homography_from_4pt(&unit, &quad)?;

    let grid = matcher.dictionary().grid;
    let border = black_border as usize;
    let cells = grid + 2 * border;

    // Sample every cell center, border ring included.
    let mut samples = vec![0.0f64; cells * cells];
    for row in 0..cells {
        for col in 0..cells {
            let u = (col as f64 + 0.5) / cells as f64;
            let v = (row as f64 + 0.5) / cells as f64;
            let p = h.apply(Point2::new(u, v));
            samples[row * cells + col] = sample_mean_3x3(img, p.x as f32, p.y as f32) as f64;
        }
    }

    let thr = otsu_from_samples(&samples);

    let mut border_total = 0u32;
    let mut border_dark = 0u32;
    let mut code = 0u64;
    for row in 0..cells {
        for col in 0..cells {
            let dark = samples[row * cells + col] < thr;
            let on_border =
                row < border || row >= cells - border || col < border || col >= cells - border;
            if on_border {
                border_total += 1;
                if dark {
                    border_dark += 1;
                }
            } else if dark {
                let bit = (row - border) * grid + (col - border);
                code |= 1u64 << bit;
            }
        }
    }

    if f64::from(border_dark) < MIN_BORDER_RATIO * f64::from(border_total) {
        return None;
    }

    let m = matcher.match_code(code)?;

    // The dictionary match tells us how the observed grid is rotated
    // relative to the stored code; rotate the corner indices so index 0 is
    // the tag's lower-left corner with CCW winding in the tag frame.
    let r = m.rotation as usize;
    let mut corners = [Point2::new(0.0, 0.0); 4];
    for (i, c) in corners.iter_mut().enumerate() {
        *c = quad[(r + 3 - i) % 4];
    }

    Some(DecodedQuad {
        id: m.id,
        hamming: m.hamming,
        center: quad_center(&quad),
        corners,
    })
}
