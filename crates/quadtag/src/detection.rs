//! Detection results and the serializable per-tag record.

use nalgebra::{Point2, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::family::TagFamily;

/// Camera-frame pose of a detected tag.
///
/// `rotation` maps tag-frame vectors into the camera frame; `translation`
/// is the tag center in camera coordinates (same units as the tag size
/// passed to the estimator).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

/// One detected tag.
///
/// Corners follow the canonical winding: index 0 is the tag's lower-left
/// corner in the tag frame, proceeding counter-clockwise in tag coordinates
/// regardless of which engine produced the quad.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Tag id within its family.
    pub id: u32,
    /// Family the id was decoded against.
    pub family: TagFamily,
    /// Bit errors corrected during decoding.
    pub hamming: u8,
    /// Intersection of the quad diagonals, in pixels.
    pub center: Point2<f64>,
    /// Canonically wound corners, in pixels.
    pub corners: [Point2<f64>; 4],
    /// Pose, if estimation has been run for this detection.
    pub pose: Option<Pose>,
}

impl Detection {
    /// Whether a pose has been attached.
    pub fn estimated(&self) -> bool {
        self.pose.is_some()
    }
}

/// Pose block of a [`TagRecord`], present only when a pose was estimated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    /// Tag center in camera coordinates.
    pub position: [f64; 3],
    /// Tag orientation as a unit quaternion.
    pub orientation: UnitQuaternion<f64>,
}

/// Per-tag record for downstream consumers (serialization, messaging).
///
/// Corner points carry `z = 1.0` so they can be treated as homogeneous
/// image coordinates. `estimated` is true iff `pose` is present; the pose
/// block is omitted from serialized output otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: u32,
    pub family: String,
    pub hamming: u8,
    pub center: Point2<f64>,
    pub corners: [Point3<f64>; 4],
    pub estimated: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pose: Option<PoseRecord>,
}

impl From<&Detection> for TagRecord {
    fn from(det: &Detection) -> Self {
        let corners =
            det.corners.map(|c| Point3::new(c.x, c.y, 1.0));
        let pose = det.pose.map(|p| PoseRecord {
            position: [p.translation.x, p.translation.y, p.translation.z],
            orientation: p.rotation,
        });
        Self {
            id: det.id,
            family: det.family.name().to_string(),
            hamming: det.hamming,
            center: det.center,
            corners,
            estimated: pose.is_some(),
            pose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_detection() -> Detection {
        Detection {
            id: 3,
            family: TagFamily::Tag36h11,
            hamming: 1,
            center: Point2::new(100.0, 80.0),
            corners: [
                Point2::new(90.0, 90.0),
                Point2::new(110.0, 90.0),
                Point2::new(110.0, 70.0),
                Point2::new(90.0, 70.0),
            ],
            pose: None,
        }
    }

    #[test]
    fn record_carries_homogeneous_corners() {
        let rec = TagRecord::from(&sample_detection());
        for c in &rec.corners {
            assert_eq!(c.z, 1.0);
        }
        assert_eq!(rec.corners[0].x, 90.0);
        assert_eq!(rec.family, "36h11");
        assert!(!rec.estimated);
        assert!(rec.pose.is_none());
    }

    #[test]
    fn record_copies_all_translation_components() {
        let mut det = sample_detection();
        det.pose = Some(Pose {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::new(0.1, -0.2, 1.5),
        });

        let rec = TagRecord::from(&det);
        assert!(rec.estimated);
        let pose = rec.pose.unwrap();
        assert_eq!(pose.position, [0.1, -0.2, 1.5]);
    }

    #[test]
    fn serialized_record_nests_pose_under_estimated_flag() {
        let mut det = sample_detection();

        let bare: serde_json::Value =
            serde_json::to_value(TagRecord::from(&det)).unwrap();
        assert_eq!(bare["estimated"], serde_json::Value::Bool(false));
        assert!(bare.get("pose").is_none());
        assert!(bare.get("position").is_none());

        det.pose = Some(Pose {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::new(0.1, -0.2, 1.5),
        });
        let full: serde_json::Value =
            serde_json::to_value(TagRecord::from(&det)).unwrap();
        assert_eq!(full["estimated"], serde_json::Value::Bool(true));
        assert!(full["pose"]["position"].is_array());
        assert!(full["pose"].get("orientation").is_some());
    }

    #[test]
    fn record_round_trips_through_json() {
        let mut det = sample_detection();
        det.pose = Some(Pose {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::new(0.0, 0.0, 2.0),
        });

        let rec = TagRecord::from(&det);
        let json = serde_json::to_string(&rec).unwrap();
        let back: TagRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
