use std::fmt;

use nalgebra::{UnitQuaternion, Vector3};

use crate::faces::upright_face;
use crate::{DiceBody, DiePhase, Real, SimulationConfig};

/// Why a die was declared settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettleReason {
    /// Flat and motionless.
    AtRest,
    /// Nearly flat after lingering on the floor past `stall_frames`.
    Stalled,
    /// The roll ran past `deadline_frames`.
    Deadline,
}

impl fmt::Display for SettleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SettleReason::AtRest => "at_rest",
            SettleReason::Stalled => "stalled",
            SettleReason::Deadline => "deadline",
        })
    }
}

/// Orientation that turns `world_normal` exactly to +Y with the smallest rotation.
fn upright_target(
    orientation: &UnitQuaternion<Real>,
    world_normal: &Vector3<Real>,
) -> UnitQuaternion<Real> {
    UnitQuaternion::rotation_between(world_normal, &Vector3::y())
        .map(|tilt| tilt * *orientation)
        .unwrap_or(*orientation)
}

/// Settling checks for one die, run after collision response each frame.
///
/// In the floor band the die is slerped toward lying flat on whichever face
/// points most nearly up, faster the calmer it is, and slowed further once
/// nearly flat. It settles when flat and motionless, or when it has spent more
/// than `stall_frames` frames on the floor and is at least nearly flat.
/// Returns the reason when the die settled this frame.
pub fn detect_settle(die: &mut DiceBody, config: &SimulationConfig) -> Option<SettleReason> {
    let floor_frames = match die.phase {
        DiePhase::Settled { .. } => return None,
        DiePhase::Tumbling { floor_frames } | DiePhase::Settling { floor_frames } => floor_frames,
    };
    let params = &config.settle;
    let state = &mut die.state;

    if state.position.y - config.rest_height() > params.floor_epsilon {
        die.phase = DiePhase::Tumbling { floor_frames };
        return None;
    }
    let floor_frames = floor_frames.saturating_add(1);

    let (face, world_normal) = upright_face(&state.orientation);
    let mut tilt = 1.0 - world_normal.y;
    if tilt > params.flat_epsilon {
        let target = upright_target(&state.orientation, &world_normal);
        let calm = 1.0 / (1.0 + state.linear_speed() + state.angular_speed());
        let rate = params.snap_rate_min + (params.snap_rate_max - params.snap_rate_min) * calm;
        state.orientation = state
            .orientation
            .try_slerp(&target, rate, 1e-6)
            .unwrap_or(target);
        tilt = 1.0 - (state.orientation * face.local_normal()).y;
    }

    if tilt < params.loose_flat_epsilon {
        state.velocity *= params.flat_friction;
        state.angular_velocity *= params.flat_friction;
    }

    let still = state.linear_speed() < params.linear_epsilon
        && state.angular_speed() < params.angular_epsilon;
    let reason = if tilt < params.flat_epsilon && still {
        Some(SettleReason::AtRest)
    } else if floor_frames > params.stall_frames && tilt < params.loose_flat_epsilon {
        Some(SettleReason::Stalled)
    } else {
        None
    };

    match reason {
        Some(reason) => {
            force_settle(die, config);
            Some(reason)
        }
        None => {
            die.phase = DiePhase::Settling { floor_frames };
            None
        }
    }
}

/// Settle a die where it lies: turn it flat onto its upright face, pin it to
/// resting height and zero its motion. Returns the face value.
pub fn force_settle(die: &mut DiceBody, config: &SimulationConfig) -> u8 {
    if let DiePhase::Settled { face } = die.phase {
        return face;
    }
    let state = &mut die.state;
    let (face, world_normal) = upright_face(&state.orientation);
    state.orientation = upright_target(&state.orientation, &world_normal);
    state.position.y = config.rest_height();
    state.velocity = Vector3::zeros();
    state.angular_velocity = Vector3::zeros();
    die.phase = DiePhase::Settled {
        face: face.face_value,
    };
    face.face_value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::read_face;
    use crate::{DieId, PhysicsState};

    fn resting_die(orientation: UnitQuaternion<Real>) -> DiceBody {
        let cfg = SimulationConfig::default();
        let mut state = PhysicsState::at_rest(Vector3::new(0.0, cfg.rest_height(), 0.0));
        state.orientation = orientation;
        DiceBody::new(DieId(0), state)
    }

    fn tilt_of(die: &DiceBody) -> Real {
        1.0 - upright_face(&die.state().orientation).1.y
    }

    #[test]
    fn test_airborne_die_keeps_tumbling() {
        let cfg = SimulationConfig::default();
        let mut die = resting_die(UnitQuaternion::identity());
        die.state.position.y = 3.0;
        die.phase = DiePhase::Settling { floor_frames: 12 };

        assert_eq!(detect_settle(&mut die, &cfg), None);
        assert_eq!(die.phase(), DiePhase::Tumbling { floor_frames: 12 });
    }

    #[test]
    fn test_flat_still_die_settles_at_rest() {
        let cfg = SimulationConfig::default();
        let q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::PI);
        let mut die = resting_die(q);
        die.state.position.y += 0.01;

        assert_eq!(detect_settle(&mut die, &cfg), Some(SettleReason::AtRest));
        assert_eq!(die.face(), Some(5));
        assert_eq!(die.state().position.y, cfg.rest_height());
        assert_eq!(die.state().velocity, Vector3::zeros());
        assert_eq!(die.state().angular_velocity, Vector3::zeros());
    }

    #[test]
    fn test_soft_snap_reduces_tilt_until_settled() {
        let cfg = SimulationConfig::default();
        let mut die = resting_die(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.4));
        let before = tilt_of(&die);

        assert_eq!(detect_settle(&mut die, &cfg), None);
        assert!(matches!(die.phase(), DiePhase::Settling { floor_frames: 1 }));
        assert!(tilt_of(&die) < before);

        let mut frames = 1;
        while !die.is_settled() {
            detect_settle(&mut die, &cfg);
            frames += 1;
            assert!(frames < 100, "soft snap did not converge");
        }
        assert_eq!(die.face(), Some(2));
        assert!(tilt_of(&die) < 1e-5);
    }

    #[test]
    fn test_fast_die_snaps_slower() {
        let cfg = SimulationConfig::default();
        let tilted = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.4);
        let mut calm = resting_die(tilted);
        let mut busy = resting_die(tilted);
        busy.state.velocity = Vector3::new(4.0, 0.0, 0.0);
        busy.state.angular_velocity = Vector3::new(0.0, 6.0, 0.0);

        detect_settle(&mut calm, &cfg);
        detect_settle(&mut busy, &cfg);
        assert!(tilt_of(&calm) < tilt_of(&busy));
    }

    #[test]
    fn test_stall_fallback_when_flatness_unreachable() {
        let mut cfg = SimulationConfig::default();
        cfg.settle.flat_epsilon = 0.0;
        cfg.settle.stall_frames = 10;
        let mut die = resting_die(UnitQuaternion::identity());

        for _ in 0..10 {
            assert_eq!(detect_settle(&mut die, &cfg), None);
        }
        assert_eq!(detect_settle(&mut die, &cfg), Some(SettleReason::Stalled));
        assert_eq!(die.face(), Some(2));
    }

    #[test]
    fn test_stall_needs_loose_flatness() {
        let mut cfg = SimulationConfig::default();
        cfg.settle.stall_frames = 0;
        cfg.settle.snap_rate_min = 0.0;
        cfg.settle.snap_rate_max = 0.0;
        // 45 degrees off flat, and the snap is disabled
        let mut die = resting_die(UnitQuaternion::from_axis_angle(
            &Vector3::x_axis(),
            std::f32::consts::FRAC_PI_4 * 0.9,
        ));
        for _ in 0..5 {
            assert_eq!(detect_settle(&mut die, &cfg), None);
        }
    }

    #[test]
    fn test_force_settle_mid_air() {
        let cfg = SimulationConfig::default();
        let q = UnitQuaternion::from_euler_angles(0.3, -1.2, 0.7);
        let mut die = resting_die(q);
        die.state.position.y = 2.5;
        die.state.velocity = Vector3::new(1.0, -2.0, 0.5);

        let face = force_settle(&mut die, &cfg);
        assert_eq!(Some(face), die.face());
        assert_eq!(read_face(&die.state().orientation), face);
        assert_eq!(read_face(&q), face);
        assert_eq!(die.state().position.y, cfg.rest_height());
        assert!(tilt_of(&die) < 1e-5);

        // terminal
        assert_eq!(detect_settle(&mut die, &cfg), None);
        assert_eq!(force_settle(&mut die, &cfg), face);
    }
}
