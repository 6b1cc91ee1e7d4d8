//! The detector front end: backend dispatch, corner canonicalization, and
//! optional subpixel refinement.

use quadtag_core::GrayImageView;

use crate::backend::decode::quad_center;
use crate::backend::{boundary, canonicalize, region, RawDetection};
use crate::config::{Backend, ConfigError, DetectorConfig};
use crate::detection::Detection;
use crate::dictionary::Matcher;
use crate::family::TagFamily;
use crate::refine::refine_quad;

/// Errors raised by [`Detector::detect`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DetectError {
    /// The input image has zero dimensions or a mismatched buffer length.
    #[error("invalid image: {0}")]
    InvalidImage(&'static str),
}

/// Square fiducial tag detector.
///
/// Construction is cheap; the dictionary matcher is the only precomputed
/// state. The same detector can be reused across frames and reconfigured
/// between calls.
pub struct Detector {
    config: DetectorConfig,
    matcher: Matcher,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Self {
        let matcher = Matcher::new(
            config.family.dictionary(),
            config.family.max_correction(),
        );
        Self { config, matcher }
    }

    /// Build a detector from backend and family names, e.g.
    /// `Detector::from_names("region", "36h11")`.
    pub fn from_names(backend: &str, family: &str) -> Result<Self, ConfigError> {
        let backend: Backend = backend.parse()?;
        let family: TagFamily = family.parse()?;
        Ok(Self::new(DetectorConfig::new(backend, family)))
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn set_backend(&mut self, backend: Backend) {
        self.config.backend = backend;
    }

    /// Switch tag family, rebuilding the dictionary matcher.
    pub fn set_family(&mut self, family: TagFamily) {
        if self.config.family != family {
            self.config.family = family;
            self.matcher = Matcher::new(family.dictionary(), family.max_correction());
        }
    }

    /// Input downsampling factor before quad search. Clamped to `>= 1`.
    pub fn set_decimate(&mut self, decimate: u32) {
        self.config.set_decimate(decimate);
    }

    /// Width of the black border ring in payload cells. Clamped to `>= 1`.
    pub fn set_black_border(&mut self, cells: u32) {
        self.config.set_black_border(cells);
    }

    pub fn set_refine_corners(&mut self, refine: bool) {
        self.config.refine_corners = refine;
    }

    /// Detect all tags in a grayscale image.
    ///
    /// Returned corners always follow the canonical winding (lower-left
    /// first, counter-clockwise in tag coordinates) regardless of the
    /// configured backend. An image with no tags is `Ok` with an empty
    /// vector; only a malformed image is an error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, img), fields(backend = %self.config.backend))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> Result<Vec<Detection>, DetectError> {
        if !img.is_valid() {
            return Err(DetectError::InvalidImage(
                "dimensions are zero or buffer length does not match",
            ));
        }

        let mut raw = match self.config.backend {
            Backend::Region => region::detect(
                img,
                self.config.decimate(),
                &self.matcher,
                self.config.black_border(),
            ),
            Backend::Boundary => boundary::detect(
                img,
                self.config.decimate(),
                &self.matcher,
                self.config.black_border(),
            ),
        };

        let order = self.config.backend.corner_order();
        let mut out = Vec::with_capacity(raw.len());
        for det in raw.iter_mut() {
            canonicalize(det, order);
            out.push(self.finish(img, det));
        }

        log::debug!(
            "detected {} tag(s) with {} backend",
            out.len(),
            self.config.backend
        );
        Ok(out)
    }

    fn finish(&self, img: &GrayImageView<'_>, raw: &RawDetection) -> Detection {
        let mut corners = raw.corners;
        let mut center = raw.center;
        if self.config.refine_corners {
            refine_quad(img, &mut corners);
            center = quad_center(&corners);
        }

        Detection {
            id: raw.id,
            family: self.config.family,
            hamming: raw.hamming,
            center,
            corners,
            pose: None,
        }
    }
}
