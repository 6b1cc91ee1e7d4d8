//! Core image, camera, and homography primitives for tag detection.
//!
//! This crate is intentionally small and purely numeric. It does *not*
//! depend on any concrete detection engine or external image type.

mod camera;
mod homography;
mod image;
mod logger;

pub use camera::{CameraIntrinsics, CameraModel, Distortion};
pub use homography::{homography_from_4pt, Homography};
pub use image::{
    decimate, get_gray, sample_bilinear, sample_mean_3x3, undecimate_coord, GrayImage,
    GrayImageView,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;
pub use logger::init_with_level;
