//! Wire model for the frames the external pose tracker emits.
//!
//! Field names mirror the tracker's JSON documents. The first fifteen
//! keypoint ids share their order with [`TrackedJoint`], so a person
//! sample converts straight into pose-graph input.

use marionette_core::error::RetargetError;
use marionette_posegraph::joint::TrackedJoint;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One id in the 25-point tracked layout.
///
/// Entries 0..15 are the core joints the pose graph corrects; the rest are
/// face and foot detail points. On the wire an id is a plain integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum KeypointId {
    Head,
    UpperChest,
    RightShoulder,
    RightLowerArm,
    RightHand,
    LeftShoulder,
    LeftLowerArm,
    LeftHand,
    Hips,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    RightEye,
    LeftEye,
    RightEar,
    LeftEar,
    LeftBigToe,
    LeftSmallToe,
    LeftHeel,
    RightBigToe,
    RightSmallToe,
    RightHeel,
}

impl KeypointId {
    pub const COUNT: usize = 25;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Head,
        Self::UpperChest,
        Self::RightShoulder,
        Self::RightLowerArm,
        Self::RightHand,
        Self::LeftShoulder,
        Self::LeftLowerArm,
        Self::LeftHand,
        Self::Hips,
        Self::RightUpperLeg,
        Self::RightLowerLeg,
        Self::RightFoot,
        Self::LeftUpperLeg,
        Self::LeftLowerLeg,
        Self::LeftFoot,
        Self::RightEye,
        Self::LeftEye,
        Self::RightEar,
        Self::LeftEar,
        Self::LeftBigToe,
        Self::LeftSmallToe,
        Self::LeftHeel,
        Self::RightBigToe,
        Self::RightSmallToe,
        Self::RightHeel,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Core joint corrected by the pose graph, when this id maps to one.
    #[must_use]
    pub const fn tracked(self) -> Option<TrackedJoint> {
        let index = self as usize;
        if index < TrackedJoint::COUNT {
            Some(TrackedJoint::ALL[index])
        } else {
            None
        }
    }
}

impl From<KeypointId> for u8 {
    fn from(id: KeypointId) -> Self {
        id as u8
    }
}

impl TryFrom<u8> for KeypointId {
    type Error = RetargetError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(RetargetError::UnknownKeypointId(raw))
    }
}

/// Face orientation in degrees as reported by the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceAngles {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

/// One tracked point with its detection confidence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    #[serde(rename = "pointID")]
    pub id: KeypointId,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint {
    #[must_use]
    pub fn new(id: KeypointId, position: Vector3<f32>, confidence: f32) -> Self {
        Self {
            id,
            confidence,
            x: position.x,
            y: position.y,
            z: position.z,
        }
    }

    #[must_use]
    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// One detected person in a frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersonSample {
    #[serde(rename = "personID")]
    pub person_id: i32,
    #[serde(rename = "has_fallen", default)]
    pub fallen: bool,
    #[serde(rename = "face_rotation", default)]
    pub face: FaceAngles,
    #[serde(rename = "skeleton", default)]
    pub keypoints: Vec<Keypoint>,
}

impl PersonSample {
    /// First keypoint carrying the given id, when the tracker reported one.
    #[must_use]
    pub fn keypoint(&self, id: KeypointId) -> Option<&Keypoint> {
        self.keypoints.iter().find(|point| point.id == id)
    }
}

/// One frame of tracker output, possibly holding several people.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PoseFrame {
    #[serde(rename = "ID_Frame")]
    pub frame_id: u64,
    #[serde(rename = "thingId", default)]
    pub source_id: String,
    #[serde(rename = "People", default)]
    pub people: Vec<PersonSample>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ---- wire parsing ----

    #[test]
    fn tracker_document_parses_with_its_native_field_names() {
        let doc = r#"{
            "ID_Frame": 412,
            "thingId": "camera-7",
            "Has_Fallen": false,
            "People": [
                {
                    "personID": 3,
                    "has_fallen": false,
                    "face_rotation": { "pitch": 4.0, "roll": -1.5, "yaw": 12.0 },
                    "skeleton": [
                        { "pointID": 0, "confidence": 0.91, "x": 0.02, "y": 1.54, "z": 0.01 },
                        { "pointID": 4, "confidence": 0.77, "x": 0.74, "y": 1.41, "z": -0.03 }
                    ]
                }
            ]
        }"#;
        let frame: PoseFrame = serde_json::from_str(doc).expect("frame should parse");
        assert_eq!(frame.frame_id, 412);
        assert_eq!(frame.source_id, "camera-7");
        assert_eq!(frame.people.len(), 1);

        let person = &frame.people[0];
        assert_eq!(person.person_id, 3);
        assert!(!person.fallen);
        assert_relative_eq!(person.face.yaw, 12.0);

        let hand = person
            .keypoint(KeypointId::RightHand)
            .expect("right hand present");
        assert_relative_eq!(hand.position(), Vector3::new(0.74, 1.41, -0.03));
        assert_relative_eq!(hand.confidence, 0.77);
        assert!(person.keypoint(KeypointId::LeftHand).is_none());
    }

    #[test]
    fn unknown_point_id_is_rejected() {
        let doc = r#"{ "pointID": 99, "confidence": 1.0, "x": 0.0, "y": 0.0, "z": 0.0 }"#;
        let parsed: Result<Keypoint, _> = serde_json::from_str(doc);
        assert!(parsed.is_err(), "id 99 is outside the 25-point layout");
    }

    #[test]
    fn keypoints_round_trip_with_integer_ids() {
        let point = Keypoint::new(KeypointId::LeftHeel, Vector3::new(-0.1, 0.02, -0.05), 0.4);
        let json = serde_json::to_string(&point).expect("keypoint should serialize");
        assert!(json.contains("\"pointID\":21"), "json was {json}");
        let back: Keypoint = serde_json::from_str(&json).expect("keypoint should reparse");
        assert_eq!(back.id, KeypointId::LeftHeel);
        assert_relative_eq!(back.position(), point.position());
    }

    // ---- core joint mapping ----

    #[test]
    fn core_ids_map_onto_the_tracked_joints() {
        assert_eq!(KeypointId::Head.tracked(), Some(TrackedJoint::Head));
        assert_eq!(KeypointId::RightHand.tracked(), Some(TrackedJoint::RightHand));
        assert_eq!(KeypointId::LeftFoot.tracked(), Some(TrackedJoint::LeftFoot));
        assert_eq!(KeypointId::RightEye.tracked(), None);
        assert_eq!(KeypointId::RightHeel.tracked(), None);
    }

    #[test]
    fn indices_follow_the_wire_order() {
        for (index, id) in KeypointId::ALL.into_iter().enumerate() {
            assert_eq!(id.index(), index);
            assert_eq!(KeypointId::try_from(index as u8).unwrap(), id);
        }
        assert_eq!(KeypointId::RightEye.index(), 15);
        assert_eq!(KeypointId::RightHeel.index(), 24);
        assert!(KeypointId::try_from(25).is_err());
    }
}
