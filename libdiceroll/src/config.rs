//! Tuning parameters for the simulator.
//!
//! None of these numbers has a physical derivation; they were tuned until rolls
//! looked right at 60 frames per second. Only the qualitative behaviour matters.

use serde::{Deserialize, Serialize};

use crate::{DiceError, Real};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DieParams {
    /// Cube edge length in world units.
    pub size: Real,
}

impl Default for DieParams {
    fn default() -> Self {
        Self { size: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorParams {
    /// Vertical acceleration (negative is down).
    pub gravity: Real,
    /// Longest step accepted; longer frames are clamped to this.
    pub max_dt: Real,
}

impl Default for IntegratorParams {
    fn default() -> Self {
        Self {
            gravity: -30.0,
            max_dt: 1.0 / 30.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorParams {
    pub floor_y: Real,
    pub ceiling_y: Real,
    pub restitution: Real,
    /// Multiplier on horizontal velocity per floor contact.
    pub linear_friction: Real,
    /// Multiplier on angular velocity per floor contact.
    pub angular_friction: Real,
    /// Rebound speeds below this are zeroed so resting dice stop bouncing.
    pub rest_speed: Real,
    /// Impact speed above which horizontal momentum turns into spin.
    pub impact_threshold: Real,
    pub impact_torque: Real,
}

impl Default for FloorParams {
    fn default() -> Self {
        Self {
            floor_y: 0.0,
            ceiling_y: 20.0,
            restitution: 0.35,
            linear_friction: 0.92,
            angular_friction: 0.9,
            rest_speed: 0.6,
            impact_threshold: 2.0,
            impact_torque: 0.6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallParams {
    pub restitution: Real,
    pub angular_damping: Real,
    pub impact_torque: Real,
}

impl Default for WallParams {
    fn default() -> Self {
        Self {
            restitution: 0.5,
            angular_damping: 0.8,
            impact_torque: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactParams {
    /// Sequential resolution passes per frame.
    pub iterations: u32,
    /// Minimum centre distance as a multiple of the die size.
    pub separation_factor: Real,
    pub restitution: Real,
    /// Floor on the separating impulse so touching dice never stick.
    pub min_separation_speed: Real,
    /// Scale on the vertical part of the contact normal.
    pub vertical_damping: Real,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            iterations: 3,
            separation_factor: 1.05,
            restitution: 0.3,
            min_separation_speed: 0.4,
            vertical_damping: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleParams {
    /// Height band above resting height counted as "on the floor".
    pub floor_epsilon: Real,
    /// Tilt below which a still die counts as lying flat.
    pub flat_epsilon: Real,
    /// Tilt accepted by the stall fallback.
    pub loose_flat_epsilon: Real,
    pub linear_epsilon: Real,
    pub angular_epsilon: Real,
    /// Slerp fraction per frame for a fast die.
    pub snap_rate_min: Real,
    /// Slerp fraction per frame for a motionless die.
    pub snap_rate_max: Real,
    /// Extra velocity multiplier while nearly flat.
    pub flat_friction: Real,
    /// Floor-contact frames after which a nearly flat die is settled regardless of speed.
    pub stall_frames: u32,
    /// Roll frames after which every remaining die is settled where it is.
    pub deadline_frames: u32,
}

impl Default for SettleParams {
    fn default() -> Self {
        Self {
            floor_epsilon: 0.05,
            flat_epsilon: 1e-3,
            loose_flat_epsilon: 0.05,
            linear_epsilon: 0.05,
            angular_epsilon: 0.05,
            snap_rate_min: 0.02,
            snap_rate_max: 0.25,
            flat_friction: 0.9,
            stall_frames: 120,
            deadline_frames: 1800,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchParams {
    /// Height of the lowest die above resting height.
    pub height: Real,
    /// Vertical gap between consecutive dice, in die sizes.
    pub spacing: Real,
    pub speed_min: Real,
    pub speed_max: Real,
    /// Largest sideways (z) launch speed.
    pub lateral_spread: Real,
    /// Largest initial spin per axis, rad/s.
    pub spin: Real,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            height: 3.0,
            spacing: 1.25,
            speed_min: 3.0,
            speed_max: 6.0,
            lateral_spread: 2.0,
            spin: 15.0,
        }
    }
}

/// Full simulator configuration. Every section falls back to its defaults when
/// missing from a JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub die: DieParams,
    pub integrator: IntegratorParams,
    pub floor: FloorParams,
    pub walls: WallParams,
    pub contacts: ContactParams,
    pub settle: SettleParams,
    pub launch: LaunchParams,
    pub max_dice: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            die: DieParams::default(),
            integrator: IntegratorParams::default(),
            floor: FloorParams::default(),
            walls: WallParams::default(),
            contacts: ContactParams::default(),
            settle: SettleParams::default(),
            launch: LaunchParams::default(),
            max_dice: 10,
        }
    }
}

impl SimulationConfig {
    /// Parse a JSON document and validate the result.
    pub fn from_json_str(json: &str) -> Result<Self, DiceError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn half_size(&self) -> Real {
        self.die.size * 0.5
    }

    /// Centre height of a die lying on the floor.
    pub fn rest_height(&self) -> Real {
        self.floor.floor_y + self.half_size()
    }

    pub fn validate(&self) -> Result<(), DiceError> {
        positive("die.size", self.die.size)?;

        finite("integrator.gravity", self.integrator.gravity)?;
        positive("integrator.max_dt", self.integrator.max_dt)?;

        finite("floor.floor_y", self.floor.floor_y)?;
        finite("floor.ceiling_y", self.floor.ceiling_y)?;
        if self.floor.ceiling_y - self.floor.floor_y <= self.die.size {
            return Err(DiceError::InvalidConfig(format!(
                "ceiling {} leaves no room for a die above floor {}",
                self.floor.ceiling_y, self.floor.floor_y
            )));
        }
        unit("floor.restitution", self.floor.restitution)?;
        unit("floor.linear_friction", self.floor.linear_friction)?;
        unit("floor.angular_friction", self.floor.angular_friction)?;
        non_negative("floor.rest_speed", self.floor.rest_speed)?;
        non_negative("floor.impact_threshold", self.floor.impact_threshold)?;
        non_negative("floor.impact_torque", self.floor.impact_torque)?;

        unit("walls.restitution", self.walls.restitution)?;
        unit("walls.angular_damping", self.walls.angular_damping)?;
        non_negative("walls.impact_torque", self.walls.impact_torque)?;

        if self.contacts.iterations == 0 {
            return Err(DiceError::InvalidConfig(
                "contacts.iterations must be at least 1".into(),
            ));
        }
        positive("contacts.separation_factor", self.contacts.separation_factor)?;
        unit("contacts.restitution", self.contacts.restitution)?;
        non_negative(
            "contacts.min_separation_speed",
            self.contacts.min_separation_speed,
        )?;
        unit("contacts.vertical_damping", self.contacts.vertical_damping)?;

        positive("settle.floor_epsilon", self.settle.floor_epsilon)?;
        non_negative("settle.flat_epsilon", self.settle.flat_epsilon)?;
        positive("settle.loose_flat_epsilon", self.settle.loose_flat_epsilon)?;
        non_negative("settle.linear_epsilon", self.settle.linear_epsilon)?;
        non_negative("settle.angular_epsilon", self.settle.angular_epsilon)?;
        unit("settle.snap_rate_min", self.settle.snap_rate_min)?;
        unit("settle.snap_rate_max", self.settle.snap_rate_max)?;
        if self.settle.snap_rate_min > self.settle.snap_rate_max {
            return Err(DiceError::InvalidConfig(
                "settle.snap_rate_min exceeds settle.snap_rate_max".into(),
            ));
        }
        unit("settle.flat_friction", self.settle.flat_friction)?;
        if self.settle.stall_frames == 0 || self.settle.deadline_frames == 0 {
            return Err(DiceError::InvalidConfig(
                "settle frame thresholds must be at least 1".into(),
            ));
        }

        non_negative("launch.height", self.launch.height)?;
        positive("launch.spacing", self.launch.spacing)?;
        non_negative("launch.speed_min", self.launch.speed_min)?;
        non_negative("launch.speed_max", self.launch.speed_max)?;
        if self.launch.speed_min > self.launch.speed_max {
            return Err(DiceError::InvalidConfig(
                "launch.speed_min exceeds launch.speed_max".into(),
            ));
        }
        non_negative("launch.lateral_spread", self.launch.lateral_spread)?;
        non_negative("launch.spin", self.launch.spin)?;

        if self.max_dice == 0 {
            return Err(DiceError::InvalidConfig("max_dice must be at least 1".into()));
        }

        // Dice launch stacked in one column; every slot must clear the next.
        if self.launch.spacing < self.contacts.separation_factor {
            return Err(DiceError::InvalidConfig(format!(
                "launch.spacing {} is below contacts.separation_factor {}",
                self.launch.spacing, self.contacts.separation_factor
            )));
        }
        let top = self.launch_height(self.max_dice - 1);
        if top > self.floor.ceiling_y - self.half_size() {
            return Err(DiceError::InvalidConfig(format!(
                "launch column for {} dice reaches {top}, above ceiling {}",
                self.max_dice, self.floor.ceiling_y
            )));
        }
        Ok(())
    }

    /// Centre height of the die launched at `index` in a roll.
    pub fn launch_height(&self, index: usize) -> Real {
        let step = self.launch.spacing * self.die.size;
        self.rest_height() + self.launch.height + index as Real * step
    }
}

fn finite(name: &str, v: Real) -> Result<(), DiceError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(DiceError::InvalidConfig(format!("{name} must be finite, got {v}")))
    }
}

fn non_negative(name: &str, v: Real) -> Result<(), DiceError> {
    finite(name, v)?;
    if v < 0.0 {
        return Err(DiceError::InvalidConfig(format!("{name} must be >= 0, got {v}")));
    }
    Ok(())
}

fn positive(name: &str, v: Real) -> Result<(), DiceError> {
    finite(name, v)?;
    if v <= 0.0 {
        return Err(DiceError::InvalidConfig(format!("{name} must be > 0, got {v}")));
    }
    Ok(())
}

fn unit(name: &str, v: Real) -> Result<(), DiceError> {
    non_negative(name, v)?;
    if v > 1.0 {
        return Err(DiceError::InvalidConfig(format!("{name} must be <= 1, got {v}")));
    }
    Ok(())
}
