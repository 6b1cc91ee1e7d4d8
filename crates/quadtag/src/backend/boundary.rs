//! Boundary engine: adaptive-mean threshold, Moore boundary tracing, and
//! polygon simplification down to four vertices.
//!
//! Unlike the region engine this one never looks at component interiors;
//! the quad comes from simplifying the traced outer contour. Its native
//! corner order is the reverse of the canonical winding.

use nalgebra::Point2;

use quadtag_core::{decimate, undecimate_coord, GrayImage, GrayImageView};

use super::decode::{decode_quad, order_quad_tl_cw, quad_area, quad_is_convex};
use super::RawDetection;
use crate::dictionary::Matcher;

/// Half-width of the adaptive mean window.
const WINDOW_RADIUS: usize = 7;

/// A pixel must undercut its local mean by this much to count as dark.
const MEAN_OFFSET: i32 = 10;

/// Smallest accepted component, in working-scale pixels.
const MIN_COMPONENT_AREA: usize = 32;

/// Largest accepted component, as a fraction of the working image.
const MAX_COMPONENT_FRAC: f64 = 0.5;

/// Smallest accepted simplified quad, in working-scale pixels.
const MIN_QUAD_AREA: f64 = 64.0;

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

    let mask = adaptive_dark_mask(&work);
    let (labels, components) = label_components(&mask, work.width, work.height);

    let mut out = Vec::new();
    for comp in &components {
        let contour = trace_boundary(&labels, work.width, work.height, comp.label, comp.start);
        let Some(quad) = simplify_to_quad(&contour) else {
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
            // Native convention: reverse of the canonical winding.
            let corners = [d.corners[3], d.corners[2], d.corners[1], d.corners[0]];
            out.push(RawDetection {
                id: d.id,
                hamming: d.hamming,
                center: d.center,
                corners,
            });
        }
    }

    log::debug!("boundary engine: {} detections", out.len());
    out
}

/// Dark mask from a windowed mean with an offset, via an integral image.
///
/// A pixel is dark when it sits [`MEAN_OFFSET`] below the mean of its
/// neighborhood. Uniform areas produce no dark pixels, so a blank frame
/// yields an empty mask.
fn adaptive_dark_mask(img: &GrayImageView<'_>) -> Vec<bool> {
    let w = img.width;
    let h = img.height;

    // integral[(y+1)*(w+1) + (x+1)] = sum of pixels in [0..=x, 0..=y]
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += u64::from(img.data[y * w + x]);
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    let mut mask = vec![false; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(WINDOW_RADIUS);
        let y1 = (y + WINDOW_RADIUS + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(WINDOW_RADIUS);
            let x1 = (x + WINDOW_RADIUS + 1).min(w);

            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let count = ((y1 - y0) * (x1 - x0)) as u64;
            let mean = (sum / count) as i32;

            mask[y * w + x] = i32::from(img.data[y * w + x]) < mean - MEAN_OFFSET;
        }
    }
    mask
}

struct Component {
    label: u32,
    start: (usize, usize),
}

/// 4-connected labeling of the dark mask. Border-touching and out-of-range
/// components get label 0 and are not reported.
fn label_components(mask: &[bool], w: usize, h: usize) -> (Vec<u32>, Vec<Component>) {
    let max_area = (MAX_COMPONENT_FRAC * (w * h) as f64) as usize;

    let mut labels = vec![0u32; w * h];
    let mut components = Vec::new();
    let mut next_label = 1u32;
    let mut stack = Vec::new();

    for start in 0..w * h {
        if labels[start] != 0 || !mask[start] {
            continue;
        }

        // Row-major scan: the seed is the topmost, then leftmost pixel.
        let seed = (start % w, start / w);
        let label = next_label;
        next_label += 1;

        labels[start] = label;
        stack.push(start);
        let mut area = 0usize;
        let mut touches_border = false;

        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                touches_border = true;
            }
            area += 1;

            let mut push = |n: usize| {
                if labels[n] == 0 && mask[n] {
                    labels[n] = label;
                    stack.push(n);
                }
            };
            if x > 0 {
                push(idx - 1);
            }
            if x + 1 < w {
                push(idx + 1);
            }
            if y > 0 {
                push(idx - w);
            }
            if y + 1 < h {
                push(idx + w);
            }
        }

        if !touches_border && area >= MIN_COMPONENT_AREA && area <= max_area {
            components.push(Component { label, start: seed });
        }
    }

    (labels, components)
}

/// Moore-neighbor tracing of a component's outer boundary, clockwise on
/// screen. `start` must be the component's topmost-leftmost pixel.
fn trace_boundary(
    labels: &[u32],
    w: usize,
    h: usize,
    label: u32,
    start: (usize, usize),
) -> Vec<(usize, usize)> {
    // 8-neighborhood, clockwise on screen starting east.
    const DIR: [(i32, i32); 8] = [
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
    ];

    let on_component = |x: i32, y: i32| {
        x >= 0
            && y >= 0
            && (x as usize) < w
            && (y as usize) < h
            && labels[y as usize * w + x as usize] == label
    };
    let dir_index = |from: (usize, usize), to: (i32, i32)| {
        let dx = to.0 - from.0 as i32;
        let dy = to.1 - from.1 as i32;
        DIR.iter().position(|&d| d == (dx, dy)).unwrap_or(4)
    };

    let mut contour = Vec::new();
    let mut current = start;
    // The seed is leftmost in its row, so its west neighbor is outside.
    let mut backtrack = (start.0 as i32 - 1, start.1 as i32);

    let limit = 4 * w * h + 8;
    for _ in 0..limit {
        contour.push(current);

        let bi = dir_index(current, backtrack);
        let mut next = None;
        for k in 1..=8 {
            let d = DIR[(bi + k) % 8];
            let nx = current.0 as i32 + d.0;
            let ny = current.1 as i32 + d.1;
            if on_component(nx, ny) {
                next = Some((nx as usize, ny as usize));
                break;
            }
        }

        match next {
            // Isolated pixel.
            None => break,
            Some(n) => {
                backtrack = (current.0 as i32, current.1 as i32);
                current = n;
            }
        }

        if current == start {
            break;
        }
    }

    contour
}

/// Reduce a closed contour to exactly four vertices, or reject it.
///
/// The contour is split at its two mutually farthest points (the quad
/// diagonal for a genuine quad) and each half is simplified with
/// Ramer-Douglas-Peucker. Anything that does not come out as a convex
/// quadrilateral of reasonable size is discarded.
fn simplify_to_quad(contour: &[(usize, usize)]) -> Option<[Point2<f64>; 4]> {
    if contour.len() < 8 {
        return None;
    }

    let pts: Vec<Point2<f64>> = contour
        .iter()
        .map(|&(x, y)| Point2::new(x as f64, y as f64))
        .collect();

    let a = farthest_from(&pts, pts[0]);
    let b = farthest_from(&pts, pts[a]);
    let (a, b) = (a.min(b), a.max(b));

    let eps = (0.03 * contour.len() as f64).max(3.0);

    let chain1: Vec<Point2<f64>> = pts[a..=b].to_vec();
    let mut chain2: Vec<Point2<f64>> = pts[b..].to_vec();
    chain2.extend_from_slice(&pts[..=a]);

    let mut poly = rdp(&chain1, eps);
    poly.pop(); // shared endpoint, chain2 starts with it
    let tail = rdp(&chain2, eps);
    poly.extend_from_slice(&tail[..tail.len() - 1]);

    if poly.len() != 4 {
        return None;
    }
    let quad = [poly[0], poly[1], poly[2], poly[3]];
    if !quad_is_convex(&quad) || quad_area(&quad).abs() < MIN_QUAD_AREA {
        return None;
    }
    Some(quad)
}

fn farthest_from(pts: &[Point2<f64>], origin: Point2<f64>) -> usize {
    let mut best = 0;
    let mut best_d = -1.0;
    for (i, p) in pts.iter().enumerate() {
        let d = (p - origin).norm_squared();
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Ramer-Douglas-Peucker on an open chain. Endpoints are always kept.
fn rdp(chain: &[Point2<f64>], eps: f64) -> Vec<Point2<f64>> {
    if chain.len() <= 2 {
        return chain.to_vec();
    }

    let first = chain[0];
    let last = chain[chain.len() - 1];
    let seg = last - first;
    let seg_len = seg.norm();

    let mut max_dist = -1.0;
    let mut max_idx = 0;
    for (i, p) in chain.iter().enumerate().skip(1).take(chain.len() - 2) {
        let d = if seg_len < 1e-12 {
            (p - first).norm()
        } else {
            (seg.x * (p.y - first.y) - seg.y * (p.x - first.x)).abs() / seg_len
        };
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist <= eps {
        return vec![first, last];
    }

    let mut left = rdp(&chain[..=max_idx], eps);
    let right = rdp(&chain[max_idx..], eps);
    left.pop();
    left.extend_from_slice(&right);
    left
}
