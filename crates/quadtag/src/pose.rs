//! Per-tag pose estimation from the four canonical corners.
//!
//! The tag is a planar target, so the pose comes from the homography
//! between tag-plane coordinates and undistorted pixel coordinates:
//! `H ~ K [r1 r2 t]`. The first two rotation columns are read off `K^-1 H`,
//! the third is their cross product, and an SVD projection snaps the result
//! onto SO(3).

use nalgebra::{Matrix3, Point2, Rotation3, UnitQuaternion, Vector3};

use quadtag_core::{homography_from_4pt, CameraIntrinsics, CameraModel, Distortion};

use crate::detection::{Detection, Pose};

/// Rotations with a smaller angle collapse to the identity quaternion
/// because the axis is numerically undefined.
const MIN_ROTATION_ANGLE: f64 = 1e-12;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PoseError {
    /// Tag size must be a positive finite edge length.
    #[error("tag size must be positive and finite, got {0}")]
    InvalidTagSize(f64),
    /// The corner geometry or camera model does not admit a pose.
    #[error("pose solve failed: {0}")]
    SolveFailed(&'static str),
}

/// Estimate the camera-frame pose of a detected tag.
///
/// `camera_matrix` is the 3x3 pinhole intrinsic matrix, `distortion` a
/// Brown-Conrady coefficient slice of length 0, 2, 4 or 5, and `tag_size`
/// the black border's outer edge length (the pose translation comes out in
/// the same unit). Returns a copy of the detection with the pose attached.
pub fn estimate(
    detection: &Detection,
    camera_matrix: &Matrix3<f64>,
    distortion: &[f64],
    tag_size: f64,
) -> Result<Detection, PoseError> {
    if !tag_size.is_finite() || tag_size <= 0.0 {
        return Err(PoseError::InvalidTagSize(tag_size));
    }

    let intrinsics = CameraIntrinsics::from_matrix(camera_matrix);
    if !intrinsics.is_valid() {
        return Err(PoseError::SolveFailed("invalid camera matrix"));
    }
    let distortion = Distortion::from_coeffs(distortion)
        .ok_or(PoseError::SolveFailed("unsupported distortion coefficients"))?;
    let camera = CameraModel {
        intrinsics,
        distortion,
    };

    // Ideal pinhole pixels for the observed corners.
    let mut ideal = [Point2::new(0.0, 0.0); 4];
    for (i, c) in detection.corners.iter().enumerate() {
        let p = camera
            .undistort_pixel([c.x, c.y])
            .ok_or(PoseError::SolveFailed("corner undistortion diverged"))?;
        ideal[i] = Point2::new(p[0], p[1]);
    }

    // Tag-plane coordinates of the canonical corners: lower-left first,
    // counter-clockwise, z = 0 suppressed.
    let s = tag_size / 2.0;
    let object = [
        Point2::new(-s, -s),
        Point2::new(s, -s),
        Point2::new(s, s),
        Point2::new(-s, s),
    ];

    let h = homography_from_4pt(&object, &ideal)
        .ok_or(PoseError::SolveFailed("degenerate corner configuration"))?;

    let g = camera_matrix
        .try_inverse()
        .ok_or(PoseError::SolveFailed("singular camera matrix"))?
        * h.h;

    let mut r1 = g.column(0).into_owned();
    let mut r2 = g.column(1).into_owned();
    let norm_sum = r1.norm() + r2.norm();
    if norm_sum < 1e-12 {
        return Err(PoseError::SolveFailed("vanishing homography scale"));
    }
    let lambda = 2.0 / norm_sum;
    r1 *= lambda;
    r2 *= lambda;
    let mut t: Vector3<f64> = g.column(2).into_owned() * lambda;

    // The homography scale carries a sign ambiguity; the tag must sit in
    // front of the camera.
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    if !(t.x.is_finite() && t.y.is_finite() && t.z.is_finite()) || t.z < 1e-12 {
        return Err(PoseError::SolveFailed("tag not in front of the camera"));
    }

    let r3 = r1.cross(&r2);
    let rotation = orthonormalize(Matrix3::from_columns(&[r1, r2, r3]))
        .ok_or(PoseError::SolveFailed("rotation projection failed"))?;

    // Go through axis-angle so a numerically zero rotation maps to the
    // exact identity instead of an arbitrary axis.
    let scaled_axis = rotation.scaled_axis();
    let quat = if scaled_axis.norm() < MIN_ROTATION_ANGLE {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::from_scaled_axis(scaled_axis)
    };

    let mut out = *detection;
    out.pose = Some(Pose {
        rotation: quat,
        translation: t,
    });
    Ok(out)
}

/// Project an approximate rotation matrix onto SO(3).
fn orthonormalize(m: Matrix3<f64>) -> Option<Rotation3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }
    if r.iter().all(|v| v.is_finite()) {
        Some(Rotation3::from_matrix_unchecked(r))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::TagFamily;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn camera_matrix() -> Matrix3<f64> {
        Matrix3::new(
            800.0, 0.0, 320.0, //
            0.0, 800.0, 240.0, //
            0.0, 0.0, 1.0,
        )
    }

    /// Project the four tag corners under a ground-truth pose.
    fn project_corners(
        rotation: &UnitQuaternion<f64>,
        translation: &Vector3<f64>,
        k: &Matrix3<f64>,
        dist: &[f64],
        tag_size: f64,
    ) -> [Point2<f64>; 4] {
        let cam = CameraModel {
            intrinsics: CameraIntrinsics::from_matrix(k),
            distortion: Distortion::from_coeffs(dist).unwrap(),
        };
        let s = tag_size / 2.0;
        let object = [
            Point3::new(-s, -s, 0.0),
            Point3::new(s, -s, 0.0),
            Point3::new(s, s, 0.0),
            Point3::new(-s, s, 0.0),
        ];
        object.map(|p| {
            let pc = rotation * p.coords + translation;
            let n = [pc.x / pc.z, pc.y / pc.z];
            let d = cam.distortion.distort_normalized(n);
            let px = cam.intrinsics.normalized_to_pixel(d);
            Point2::new(px[0], px[1])
        })
    }

    fn detection_with_corners(corners: [Point2<f64>; 4]) -> Detection {
        Detection {
            id: 0,
            family: TagFamily::Tag36h11,
            hamming: 0,
            center: Point2::new(0.0, 0.0),
            corners,
            pose: None,
        }
    }

    #[test]
    fn recovers_ground_truth_pose() {
        let k = camera_matrix();
        let rot = UnitQuaternion::from_scaled_axis(Vector3::new(0.2, -0.15, 0.4));
        let t = Vector3::new(0.05, -0.1, 1.2);
        let tag_size = 0.16;

        let corners = project_corners(&rot, &t, &k, &[], tag_size);
        let det = detection_with_corners(corners);

        let out = estimate(&det, &k, &[], tag_size).expect("pose");
        let pose = out.pose.expect("attached");

        assert_relative_eq!(pose.translation, t, epsilon = 1e-6);
        assert!(pose.rotation.angle_to(&rot) < 1e-6);
    }

    #[test]
    fn recovers_pose_under_distortion() {
        let k = camera_matrix();
        let dist = [-0.2, 0.05, 0.001, -0.0005, 0.01];
        let rot = UnitQuaternion::from_scaled_axis(Vector3::new(-0.1, 0.25, 0.05));
        let t = Vector3::new(-0.03, 0.08, 0.9);
        let tag_size = 0.1;

        let corners = project_corners(&rot, &t, &k, &dist, tag_size);
        let det = detection_with_corners(corners);

        let out = estimate(&det, &k, &dist, tag_size).expect("pose");
        let pose = out.pose.expect("attached");

        assert_relative_eq!(pose.translation, t, epsilon = 1e-5);
        assert!(pose.rotation.angle_to(&rot) < 1e-5);
    }

    #[test]
    fn head_on_tag_yields_identity_rotation() {
        let k = camera_matrix();
        let rot = UnitQuaternion::identity();
        let t = Vector3::new(0.0, 0.0, 1.0);

        let corners = project_corners(&rot, &t, &k, &[], 0.2);
        let det = detection_with_corners(corners);

        let pose = estimate(&det, &k, &[], 0.2).unwrap().pose.unwrap();
        assert!(pose.rotation.angle_to(&UnitQuaternion::identity()) < 1e-9);
    }

    #[test]
    fn rejects_bad_tag_size() {
        let det = detection_with_corners([
            Point2::new(100.0, 200.0),
            Point2::new(200.0, 200.0),
            Point2::new(200.0, 100.0),
            Point2::new(100.0, 100.0),
        ]);
        let k = camera_matrix();

        for bad in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            match estimate(&det, &k, &[], bad) {
                Err(PoseError::InvalidTagSize(_)) => {}
                other => panic!("expected InvalidTagSize, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_collinear_corners() {
        let det = detection_with_corners([
            Point2::new(100.0, 100.0),
            Point2::new(150.0, 100.0),
            Point2::new(200.0, 100.0),
            Point2::new(250.0, 100.0),
        ]);
        let res = estimate(&det, &camera_matrix(), &[], 0.1);
        assert!(matches!(res, Err(PoseError::SolveFailed(_))));
    }

    #[test]
    fn rejects_unsupported_distortion_length() {
        let k = camera_matrix();
        let corners = project_corners(
            &UnitQuaternion::identity(),
            &Vector3::new(0.0, 0.0, 1.0),
            &k,
            &[],
            0.2,
        );
        let det = detection_with_corners(corners);

        let res = estimate(&det, &k, &[0.1, 0.2, 0.3], 0.2);
        assert!(matches!(res, Err(PoseError::SolveFailed(_))));
    }
}
