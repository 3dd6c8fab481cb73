use std::fmt;

use nalgebra::{UnitQuaternion, Vector3};

use crate::Real;

/// Index of a die within its roll, in launch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DieId(pub usize);

impl fmt::Display for DieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "die#{}", self.0)
    }
}

/// Linear and angular state of one die.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsState {
    pub position: Vector3<Real>,
    pub velocity: Vector3<Real>,
    pub orientation: UnitQuaternion<Real>,
    pub angular_velocity: Vector3<Real>,
}

impl PhysicsState {
    pub fn at_rest(position: Vector3<Real>) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            angular_velocity: Vector3::zeros(),
        }
    }

    pub fn linear_speed(&self) -> Real {
        self.velocity.norm()
    }

    pub fn angular_speed(&self) -> Real {
        self.angular_velocity.norm()
    }
}

/// Where a die is in its settling lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiePhase {
    /// Off the floor or moving freely. `floor_frames` counts every frame spent
    /// in the floor band so far this roll.
    Tumbling { floor_frames: u32 },
    /// In the floor band with the soft snap pulling it flat.
    Settling { floor_frames: u32 },
    /// At rest for the remainder of the roll.
    Settled { face: u8 },
}

impl DiePhase {
    pub fn floor_frames(&self) -> u32 {
        match *self {
            DiePhase::Tumbling { floor_frames } | DiePhase::Settling { floor_frames } => {
                floor_frames
            }
            DiePhase::Settled { .. } => 0,
        }
    }
}

/// One die in a roll.
#[derive(Clone, Debug)]
pub struct DiceBody {
    pub(crate) id: DieId,
    pub(crate) state: PhysicsState,
    pub(crate) phase: DiePhase,
}

impl DiceBody {
    pub fn new(id: DieId, state: PhysicsState) -> Self {
        Self {
            id,
            state,
            phase: DiePhase::Tumbling { floor_frames: 0 },
        }
    }

    pub fn id(&self) -> DieId {
        self.id
    }

    pub fn state(&self) -> &PhysicsState {
        &self.state
    }

    pub fn phase(&self) -> DiePhase {
        self.phase
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, DiePhase::Settled { .. })
    }

    /// Face value, once settled.
    pub fn face(&self) -> Option<u8> {
        match self.phase {
            DiePhase::Settled { face } => Some(face),
            _ => None,
        }
    }

    /// Mutable physics state, withheld once the die has settled.
    pub fn active_state_mut(&mut self) -> Option<&mut PhysicsState> {
        if self.is_settled() {
            None
        } else {
            Some(&mut self.state)
        }
    }

    /// Roll, pitch and yaw of the current orientation, for renderers that work in Euler angles.
    pub fn euler_angles(&self) -> Vector3<Real> {
        let (roll, pitch, yaw) = self.state.orientation.euler_angles();
        Vector3::new(roll, pitch, yaw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_die_withholds_state() {
        let mut die = DiceBody::new(DieId(0), PhysicsState::at_rest(Vector3::new(0.0, 0.5, 0.0)));
        assert!(die.active_state_mut().is_some());
        assert_eq!(die.face(), None);

        die.phase = DiePhase::Settled { face: 4 };
        assert!(die.active_state_mut().is_none());
        assert_eq!(die.face(), Some(4));
        assert_eq!(die.phase().floor_frames(), 0);
    }

    #[test]
    fn test_euler_view_of_identity() {
        let die = DiceBody::new(DieId(3), PhysicsState::at_rest(Vector3::zeros()));
        assert_eq!(die.euler_angles(), Vector3::zeros());
        assert_eq!(die.id().to_string(), "die#3");
    }
}
