//! Face normal table and face reading for a standard six-sided die.

use nalgebra::{UnitQuaternion, Vector3};

use crate::Real;

/// A local-space face normal and the pip count printed on that face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceNormalEntry {
    pub axis: [Real; 3],
    pub face_value: u8,
}

impl FaceNormalEntry {
    pub fn local_normal(&self) -> Vector3<Real> {
        Vector3::from(self.axis)
    }
}

const fn entry(x: Real, y: Real, z: Real, face_value: u8) -> FaceNormalEntry {
    FaceNormalEntry {
        axis: [x, y, z],
        face_value,
    }
}

/// One entry per cube axis direction. Opposite faces sum to 7.
/// Ties in face reading go to the earliest entry.
pub const FACE_NORMALS: [FaceNormalEntry; 6] = [
    entry(1.0, 0.0, 0.0, 1),
    entry(-1.0, 0.0, 0.0, 6),
    entry(0.0, 1.0, 0.0, 2),
    entry(0.0, -1.0, 0.0, 5),
    entry(0.0, 0.0, 1.0, 3),
    entry(0.0, 0.0, -1.0, 4),
];

/// The face pointing most nearly up, with its world-space normal.
pub fn upright_face(orientation: &UnitQuaternion<Real>) -> (FaceNormalEntry, Vector3<Real>) {
    let mut best = FACE_NORMALS[0];
    let mut best_world = orientation * best.local_normal();
    for face in &FACE_NORMALS[1..] {
        let world = orientation * face.local_normal();
        if world.y > best_world.y {
            best = *face;
            best_world = world;
        }
    }
    (best, best_world)
}

/// Value shown on top of a die with the given orientation.
pub fn read_face(orientation: &UnitQuaternion<Real>) -> u8 {
    upright_face(orientation).0.face_value
}
