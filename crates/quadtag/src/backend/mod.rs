//! Detection engines and the corner-order contract between them.
//!
//! Each engine reports corners in its own native convention. The detector
//! front end applies [`CornerOrder`] to bring every result into the
//! canonical winding before anything else sees it.

pub(crate) mod boundary;
pub(crate) mod decode;
pub(crate) mod region;

use nalgebra::Point2;

use crate::config::Backend;

/// An engine-level detection, corners still in the engine's native order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawDetection {
    pub id: u32,
    pub hamming: u8,
    pub center: Point2<f64>,
    pub corners: [Point2<f64>; 4],
}

/// How an engine's native corner order relates to the canonical winding
/// (index 0 at the tag's lower-left, counter-clockwise in tag coordinates).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CornerOrder {
    /// Native order is already canonical.
    Identity,
    /// Native order is the canonical order reversed: `canonical[i] = raw[3 - i]`.
    Reversed,
}

impl Backend {
    pub(crate) fn corner_order(self) -> CornerOrder {
        match self {
            Backend::Region => CornerOrder::Identity,
            Backend::Boundary => CornerOrder::Reversed,
        }
    }
}

/// Rewrite `raw` corners into the canonical winding.
pub(crate) fn canonicalize(raw: &mut RawDetection, order: CornerOrder) {
    if order == CornerOrder::Reversed {
        raw.corners.swap(0, 3);
        raw.corners.swap(1, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_order_mirrors_indices() {
        let mut raw = RawDetection {
            id: 0,
            hamming: 0,
            center: Point2::new(0.0, 0.0),
            corners: [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, 0.0),
            ],
        };
        let native = raw.corners;
        canonicalize(&mut raw, CornerOrder::Reversed);
        for i in 0..4 {
            assert_eq!(raw.corners[i], native[3 - i]);
        }
    }

    #[test]
    fn identity_order_is_untouched() {
        let mut raw = RawDetection {
            id: 0,
            hamming: 0,
            center: Point2::new(0.0, 0.0),
            corners: [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, 0.0),
            ],
        };
        let native = raw.corners;
        canonicalize(&mut raw, CornerOrder::Identity);
        assert_eq!(raw.corners, native);
    }

    #[test]
    fn engine_order_table() {
        assert_eq!(Backend::Region.corner_order(), CornerOrder::Identity);
        assert_eq!(Backend::Boundary.corner_order(), CornerOrder::Reversed);
    }
}
