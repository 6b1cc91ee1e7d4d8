//! Square fiducial tag detection and camera-frame pose estimation.
//!
//! Two detection engines live behind one interface: a region engine
//! (global threshold and connected components) and a boundary engine
//! (adaptive threshold and contour tracing). Whichever runs, results come
//! back in the same canonical corner winding, so downstream code never
//! depends on the configured backend.
//!
//! ```
//! use quadtag::{Detector, DetectorConfig, GrayImage};
//!
//! let frame = GrayImage::new(640, 480);
//! let detector = Detector::new(DetectorConfig::default());
//! let tags = detector.detect(&frame.as_view()).unwrap();
//! assert!(tags.is_empty());
//! ```
//!
//! Pose estimation is a separate step so callers without camera
//! calibration can still detect:
//!
//! ```no_run
//! use nalgebra::Matrix3;
//! use quadtag::{pose, Detector, DetectorConfig, GrayImage};
//!
//! let frame = GrayImage::new(640, 480);
//! let detector = Detector::new(DetectorConfig::default());
//! let k = Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0);
//! for tag in detector.detect(&frame.as_view()).unwrap() {
//!     let with_pose = pose::estimate(&tag, &k, &[], 0.16).unwrap();
//!     println!("tag {} at {:?}", with_pose.id, with_pose.pose);
//! }
//! ```

mod backend;
mod config;
mod detection;
mod detector;
mod dictionary;
mod family;
pub mod pose;
mod refine;
#[cfg(feature = "render")]
pub mod render;

pub use config::{Backend, ConfigError, DetectorConfig};
pub use detection::{Detection, Pose, PoseRecord, TagRecord};
pub use detector::{DetectError, Detector};
pub use family::TagFamily;
pub use pose::PoseError;

#[cfg(feature = "tracing")]
pub use quadtag_core::init_tracing;
pub use quadtag_core::{
    init_with_level, CameraIntrinsics, CameraModel, Distortion, GrayImage, GrayImageView,
};

/// Borrow an `image` crate grayscale buffer as a detector input view.
#[cfg(feature = "render")]
pub fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Convert an `image` crate grayscale buffer into an owned detector image.
#[cfg(feature = "render")]
pub fn gray_image(img: &image::GrayImage) -> GrayImage {
    GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}
