//! Detection overlay rendering.
//!
//! Each quad edge gets its own color so the tag orientation is readable
//! from the overlay alone: bottom (corners 0-1) red, right (1-2) blue,
//! top (2-3) yellow, left (3-0) green. The id is printed near the center
//! in magenta with a built-in segment font, so no font asset is needed.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use nalgebra::Point2;

use crate::detection::Detection;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const MAGENTA: Rgb<u8> = Rgb([255, 0, 255]);

/// Edge colors indexed by the edge's first corner.
const EDGE_COLORS: [Rgb<u8>; 4] = [RED, BLUE, YELLOW, GREEN];

const DIGIT_WIDTH: f32 = 8.0;
const DIGIT_HEIGHT: f32 = 14.0;
const DIGIT_SPACING: f32 = 4.0;

/// Draw every detection with default parameters (1 px edges, corner dots).
pub fn draw_detections(img: &mut RgbImage, detections: &[Detection]) {
    for det in detections {
        draw_detection(img, det, 1, true);
    }
}

/// Draw one detection: colored quad edges, optional corner markers, and
/// the id at the center. Pure side effect on `img`; drawing the same
/// detection twice leaves the buffer unchanged.
pub fn draw_detection(img: &mut RgbImage, det: &Detection, thickness: u32, draw_corners: bool) {
    let thickness = thickness.max(1);
    let c = det.corners;

    for i in 0..4 {
        draw_thick_line(img, c[i], c[(i + 1) % 4], EDGE_COLORS[i], thickness);
    }

    if draw_corners {
        let radius = thickness as i32 + 1;
        for (i, p) in c.iter().enumerate() {
            draw_filled_circle_mut(
                img,
                (p.x.round() as i32, p.y.round() as i32),
                radius,
                EDGE_COLORS[i],
            );
        }
    }

    draw_id(img, det.id, det.center);
}

fn draw_thick_line(
    img: &mut RgbImage,
    a: Point2<f64>,
    b: Point2<f64>,
    color: Rgb<u8>,
    thickness: u32,
) {
    let dx = (b.x - a.x) as f32;
    let dy = (b.y - a.y) as f32;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-6 {
        return;
    }
    // Unit normal for the parallel offset strokes.
    let nx = -dy / len;
    let ny = dx / len;

    for k in 0..thickness {
        let off = k as f32 - (thickness - 1) as f32 / 2.0;
        draw_line_segment_mut(
            img,
            (a.x as f32 + off * nx, a.y as f32 + off * ny),
            (b.x as f32 + off * nx, b.y as f32 + off * ny),
            color,
        );
    }
}

/// Seven-segment layout, per digit: A top, B top-right, C bottom-right,
/// D bottom, E bottom-left, F top-left, G middle.
const SEGMENTS: [[bool; 7]; 10] = [
    [true, true, true, true, true, true, false],    // 0
    [false, true, true, false, false, false, false], // 1
    [true, true, false, true, true, false, true],   // 2
    [true, true, true, true, false, false, true],   // 3
    [false, true, true, false, false, true, true],  // 4
    [true, false, true, true, false, true, true],   // 5
    [true, false, true, true, true, true, true],    // 6
    [true, true, true, false, false, false, false], // 7
    [true, true, true, true, true, true, true],     // 8
    [true, true, true, true, false, true, true],    // 9
];

fn draw_id(img: &mut RgbImage, id: u32, center: Point2<f64>) {
    let digits: Vec<u32> = id
        .to_string()
        .chars()
        .filter_map(|ch| ch.to_digit(10))
        .collect();

    let total_w = digits.len() as f32 * DIGIT_WIDTH
        + (digits.len().saturating_sub(1)) as f32 * DIGIT_SPACING;
    let mut x = center.x as f32 - total_w / 2.0;
    let y = center.y as f32 - DIGIT_HEIGHT / 2.0;

    for d in digits {
        draw_digit(img, d as usize, x, y);
        x += DIGIT_WIDTH + DIGIT_SPACING;
    }
}

fn draw_digit(img: &mut RgbImage, digit: usize, x: f32, y: f32) {
    let w = DIGIT_WIDTH;
    let h = DIGIT_HEIGHT;
    let half = h / 2.0;
    // Segment endpoints in the digit's local box.
    let endpoints: [((f32, f32), (f32, f32)); 7] = [
        ((0.0, 0.0), (w, 0.0)),    // A
        ((w, 0.0), (w, half)),     // B
        ((w, half), (w, h)),       // C
        ((0.0, h), (w, h)),        // D
        ((0.0, half), (0.0, h)),   // E
        ((0.0, 0.0), (0.0, half)), // F
        ((0.0, half), (w, half)),  // G
    ];

    for (on, ((x0, y0), (x1, y1))) in SEGMENTS[digit].iter().zip(endpoints) {
        if *on {
            draw_line_segment_mut(img, (x + x0, y + y0), (x + x1, y + y1), MAGENTA);
        }
    }
}
