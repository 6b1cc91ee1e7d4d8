//! Region engine: global Otsu threshold, dark connected components, quad
//! fit from extremal points.
//!
//! Quad search runs on the (optionally decimated) image; decoding always
//! samples the full-resolution input. Components touching the image border
//! are discarded because their outline is truncated.

use nalgebra::Point2;

use quadtag_core::{decimate, undecimate_coord, GrayImage, GrayImageView};

use super::decode::{decode_quad, order_quad_tl_cw, quad_area, quad_is_convex};
use super::RawDetection;
use crate::dictionary::Matcher;

/// Smallest accepted component, in working-scale pixels.
const MIN_COMPONENT_AREA: usize = 64;

/// Largest accepted component, as a fraction of the working image.
const MAX_COMPONENT_FRAC: f64 = 0.5;

pub(crate) fn detect(
    full: &GrayImageView<'_>,
    decimate_factor: u32,
    matcher: &Matcher,
    black_border: u32,
) -> Vec<RawDetection> {
    let factor = decimate_factor.max(1) as usize;

    let decimated: GrayImage;
    let work = if factor > 1 {
        decimated = decimate(full, factor);
        decimated.as_view()
    } else {
        *full
    };
    if !work.is_valid() {
        return Vec::new();
    }

    let Some(thr) = otsu_threshold(&work) else {
        // Single gray level, nothing to segment.
        return Vec::new();
    };

    let mut out = Vec::new();
    for component in dark_components(&work, thr) {
        let Some(quad) = quad_from_component(&component) else {
            continue;
        };

        let quad = quad.map(|p| {
            if factor > 1 {
                Point2::new(
                    undecimate_coord(p.x, factor),
                    undecimate_coord(p.y, factor),
                )
            } else {
                p
            }
        });
        let quad = order_quad_tl_cw(quad);

        if let Some(d) = decode_quad(full, quad, matcher, black_border) {
            out.push(RawDetection {
                id: d.id,
                hamming: d.hamming,
                center: d.center,
                corners: d.corners,
            });
        }
    }

    log::debug!("region engine: {} detections", out.len());
    out
}

/// Otsu's threshold over the full histogram. `None` when the image has a
/// single gray level.
fn otsu_threshold(img: &GrayImageView<'_>) -> Option<u8> {
    let mut hist = [0u32; 256];
    for &p in img.data {
        hist[p as usize] += 1;
    }

    let total = img.data.len() as f64;
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum();

    let mut best_sep = 0.0;
    let mut best_thr: Option<u8> = None;
    let mut w_lo = 0.0;
    let mut sum_lo = 0.0;

    for t in 0..255usize {
        w_lo += hist[t] as f64;
        if w_lo == 0.0 {
            continue;
        }
        let w_hi = total - w_lo;
        if w_hi == 0.0 {
            break;
        }
        sum_lo += t as f64 * hist[t] as f64;
        let mean_lo = sum_lo / w_lo;
        let mean_hi = (sum_all - sum_lo) / w_hi;
        let sep = w_lo * w_hi * (mean_lo - mean_hi) * (mean_lo - mean_hi);
        if sep > best_sep {
            best_sep = sep;
            best_thr = Some(t as u8);
        }
    }

    best_thr
}

/// Dark 4-connected components, excluding those touching the image border
/// and those outside the area limits.
fn dark_components(img: &GrayImageView<'_>, thr: u8) -> Vec<Vec<(usize, usize)>> {
    let w = img.width;
    let h = img.height;
    let max_area = (MAX_COMPONENT_FRAC * (w * h) as f64) as usize;

    let mut visited = vec![false; w * h];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if visited[start] || img.data[start] > thr {
            continue;
        }

        let mut pixels = Vec::new();
        let mut touches_border = false;
        visited[start] = true;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                touches_border = true;
            }
            pixels.push((x, y));

            if x > 0 {
                try_visit(img, thr, &mut visited, &mut stack, idx - 1);
            }
            if x + 1 < w {
                try_visit(img, thr, &mut visited, &mut stack, idx + 1);
            }
            if y > 0 {
                try_visit(img, thr, &mut visited, &mut stack, idx - w);
            }
            if y + 1 < h {
                try_visit(img, thr, &mut visited, &mut stack, idx + w);
            }
        }

        if !touches_border && pixels.len() >= MIN_COMPONENT_AREA && pixels.len() <= max_area {
            components.push(pixels);
        }
    }

    components
}

#[inline]
fn try_visit(
    img: &GrayImageView<'_>,
    thr: u8,
    visited: &mut [bool],
    stack: &mut Vec<usize>,
    idx: usize,
) {
    if !visited[idx] && img.data[idx] <= thr {
        visited[idx] = true;
        stack.push(idx);
    }
}

/// Fit a quad to a component from its extremal pixels.
///
/// For a convex quad outline the four corners are exactly: the pixel
/// farthest from the centroid, the pixel farthest from that one, and the
/// two pixels with extreme signed distance from the line between them.
fn quad_from_component(pixels: &[(usize, usize)]) -> Option<[Point2<f64>; 4]> {
    let n = pixels.len() as f64;
    let (sx, sy) = pixels
        .iter()
        .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x as f64, ay + y as f64));
    let centroid = Point2::new(sx / n, sy / n);

    let as_point = |&(x, y): &(usize, usize)| Point2::new(x as f64, y as f64);

    let c0 = pixels
        .iter()
        .map(as_point)
        .max_by(|a, b| cmp_f64((a - centroid).norm_squared(), (b - centroid).norm_squared()))?;
    let c1 = pixels
        .iter()
        .map(as_point)
        .max_by(|a, b| cmp_f64((a - c0).norm_squared(), (b - c0).norm_squared()))?;

    let axis = c1 - c0;
    let cross = |p: Point2<f64>| axis.x * (p.y - c0.y) - axis.y * (p.x - c0.x);

    let c2 = pixels
        .iter()
        .map(as_point)
        .max_by(|a, b| cmp_f64(cross(*a), cross(*b)))?;
    let c3 = pixels
        .iter()
        .map(as_point)
        .min_by(|a, b| cmp_f64(cross(*a), cross(*b)))?;

    // Both sides of the diagonal need a real corner.
    if cross(c2) < 1.0 || cross(c3) > -1.0 {
        return None;
    }

    let quad = order_quad_tl_cw([c0, c2, c1, c3]);
    if !quad_is_convex(&quad) || quad_area(&quad).abs() < MIN_COMPONENT_AREA as f64 * 0.5 {
        return None;
    }
    Some(quad)
}

#[inline]
fn cmp_f64(a: f64, b: f64) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}
