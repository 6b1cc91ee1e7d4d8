//! Pinhole camera intrinsics and radial-tangential distortion.
//!
//! Pose estimation needs two things from the camera model: mapping observed
//! pixels into ideal (undistorted) pinhole coordinates, and the intrinsic
//! matrix itself for the planar decomposition.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Read `fx, fy, cx, cy` from a 3x3 intrinsic matrix.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn to_matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Returns `true` when all entries are finite and focal lengths non-zero.
    pub fn is_valid(self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    /// Convert pixel coordinates to normalized pinhole coordinates.
    pub fn pixel_to_normalized(self, pixel_xy: [f64; 2]) -> Option<[f64; 2]> {
        if !self.is_valid() {
            return None;
        }
        let x = (pixel_xy[0] - self.cx) / self.fx;
        let y = (pixel_xy[1] - self.cy) / self.fy;
        if x.is_finite() && y.is_finite() {
            Some([x, y])
        } else {
            None
        }
    }

    /// Convert normalized pinhole coordinates to pixel coordinates.
    pub fn normalized_to_pixel(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        [
            self.fx * normalized_xy[0] + self.cx,
            self.fy * normalized_xy[1] + self.cy,
        ]
    }
}

/// Brown-Conrady radial-tangential coefficients in `k1, k2, p1, p2, k3` order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    /// Build from a coefficient slice of length 0, 2, 4 or 5.
    ///
    /// An empty slice is the ideal pinhole model. Unsupported lengths return
    /// `None` so callers fail loudly instead of silently truncating.
    pub fn from_coeffs(d: &[f64]) -> Option<Self> {
        let mut out = Self::default();
        match d.len() {
            0 => {}
            2 => {
                out.k1 = d[0];
                out.k2 = d[1];
            }
            4 | 5 => {
                out.k1 = d[0];
                out.k2 = d[1];
                out.p1 = d[2];
                out.p2 = d[3];
                if d.len() == 5 {
                    out.k3 = d[4];
                }
            }
            _ => return None,
        }
        if !out.k1.is_finite()
            || !out.k2.is_finite()
            || !out.p1.is_finite()
            || !out.p2.is_finite()
            || !out.k3.is_finite()
        {
            return None;
        }
        Some(out)
    }

    pub fn is_zero(self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0 && self.k3 == 0.0
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort_normalized(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        let x = normalized_xy[0];
        let y = normalized_xy[1];
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        [x * radial + x_tan, y * radial + y_tan]
    }
}

const UNDISTORT_MAX_ITERS: usize = 15;
const UNDISTORT_EPS: f64 = 1e-12;

/// Complete camera model (intrinsics + distortion).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraModel {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
}

impl CameraModel {
    /// Project a distorted pixel back to ideal pinhole pixel coordinates
    /// via fixed-point iteration on the distortion model.
    pub fn undistort_pixel(self, distorted_pixel_xy: [f64; 2]) -> Option<[f64; 2]> {
        let xd = self.intrinsics.pixel_to_normalized(distorted_pixel_xy)?;
        if self.distortion.is_zero() {
            return Some(distorted_pixel_xy);
        }

        let d = self.distortion;
        let mut x = xd[0];
        let mut y = xd[1];

        for _ in 0..UNDISTORT_MAX_ITERS {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let radial = 1.0 + d.k1 * r2 + d.k2 * r4 + d.k3 * r6;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }

            let x_tan = 2.0 * d.p1 * x * y + d.p2 * (r2 + 2.0 * x * x);
            let y_tan = d.p1 * (r2 + 2.0 * y * y) + 2.0 * d.p2 * x * y;
            let x_next = (xd[0] - x_tan) / radial;
            let y_next = (xd[1] - y_tan) / radial;

            if !x_next.is_finite() || !y_next.is_finite() {
                return None;
            }

            let dx = x_next - x;
            let dy = y_next - y;
            x = x_next;
            y = y_next;

            if dx.hypot(dy) <= UNDISTORT_EPS {
                break;
            }
        }

        let out = self.intrinsics.normalized_to_pixel([x, y]);
        if out[0].is_finite() && out[1].is_finite() {
            Some(out)
        } else {
            None
        }
    }

    /// Distort an ideal pinhole pixel into observed image coordinates.
    pub fn distort_pixel(self, undistorted_pixel_xy: [f64; 2]) -> Option<[f64; 2]> {
        let xn = self.intrinsics.pixel_to_normalized(undistorted_pixel_xy)?;
        let xd = self.distortion.distort_normalized(xn);
        let pix = self.intrinsics.normalized_to_pixel(xd);
        if pix[0].is_finite() && pix[1].is_finite() {
            Some(pix)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_camera() -> CameraModel {
        CameraModel {
            intrinsics: CameraIntrinsics {
                fx: 900.0,
                fy: 920.0,
                cx: 640.0,
                cy: 480.0,
            },
            distortion: Distortion {
                k1: -0.12,
                k2: 0.03,
                p1: 0.001,
                p2: -0.0008,
                k3: 0.0,
            },
        }
    }

    #[test]
    fn matrix_round_trip() {
        let k = CameraIntrinsics {
            fx: 800.0,
            fy: 790.0,
            cx: 320.5,
            cy: 240.5,
        };
        assert_eq!(CameraIntrinsics::from_matrix(&k.to_matrix()), k);
    }

    #[test]
    fn rejects_zero_focal() {
        let k = CameraIntrinsics {
            fx: 0.0,
            fy: 500.0,
            cx: 0.0,
            cy: 0.0,
        };
        assert!(!k.is_valid());
        assert!(k.pixel_to_normalized([100.0, 100.0]).is_none());
    }

    #[test]
    fn coeff_slice_lengths() {
        assert!(Distortion::from_coeffs(&[]).unwrap().is_zero());
        assert!(Distortion::from_coeffs(&[0.1, 0.01]).is_some());
        assert!(Distortion::from_coeffs(&[0.1, 0.01, 0.0, 0.0]).is_some());
        assert!(Distortion::from_coeffs(&[0.1, 0.01, 0.0, 0.0, 0.001]).is_some());
        assert!(Distortion::from_coeffs(&[0.1; 3]).is_none());
        assert!(Distortion::from_coeffs(&[0.1; 8]).is_none());
        assert!(Distortion::from_coeffs(&[f64::NAN, 0.0]).is_none());
    }

    #[test]
    fn zero_distortion_is_identity() {
        let cam = CameraModel {
            intrinsics: sample_camera().intrinsics,
            distortion: Distortion::default(),
        };
        let p = [300.25, 210.75];
        assert_eq!(cam.undistort_pixel(p).unwrap(), p);
    }

    #[test]
    fn distort_undistort_round_trip() {
        let cam = sample_camera();
        let p = [250.0, 180.0];
        let d = cam.distort_pixel(p).unwrap();
        let u = cam.undistort_pixel(d).unwrap();
        assert_relative_eq!(u[0], p[0], epsilon = 1e-5);
        assert_relative_eq!(u[1], p[1], epsilon = 1e-5);
    }
}
