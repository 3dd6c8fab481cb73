//! Floor, ceiling, wall and dice-to-dice response.
//!
//! Dice are treated as spheres of the die size for dice-to-dice contact, and
//! simultaneous contacts are handled by repeating the pairwise pass rather than
//! by a single consistent solve. Brief jitter in a pile of dice is expected.

use nalgebra::Vector3;

use crate::{Bounds, ContactParams, DiceBody, PhysicsState, Real, SimulationConfig};

const EPS: Real = 1e-5;

/// Floor and ceiling planes. Returns the downward impact speed when the die
/// hit the floor this frame, zero otherwise.
pub fn resolve_floor_and_ceiling(state: &mut PhysicsState, config: &SimulationConfig) -> Real {
    let h = config.half_size();
    let floor = &config.floor;
    let mut impact = 0.0;

    let rest = floor.floor_y + h;
    if state.position.y < rest {
        state.position.y = rest;
        if state.velocity.y < 0.0 {
            impact = -state.velocity.y;
            let bounce = impact * floor.restitution;
            state.velocity.y = if bounce < floor.rest_speed { 0.0 } else { bounce };
        }
        state.velocity.x *= floor.linear_friction;
        state.velocity.z *= floor.linear_friction;
        state.angular_velocity *= floor.angular_friction;

        if impact > floor.impact_threshold {
            // a die sliding along +x rolls about -z, along +z about +x
            state.angular_velocity.x += state.velocity.z * floor.impact_torque;
            state.angular_velocity.z -= state.velocity.x * floor.impact_torque;
        }
    }

    let top = floor.ceiling_y - h;
    if state.position.y > top {
        state.position.y = top;
        if state.velocity.y > 0.0 {
            state.velocity.y = -state.velocity.y * floor.restitution;
        }
        state.velocity.x *= floor.linear_friction;
        state.velocity.z *= floor.linear_friction;
        state.angular_velocity *= floor.angular_friction;
    }

    impact
}

/// The four side walls from `bounds`.
pub fn resolve_walls(state: &mut PhysicsState, bounds: &Bounds, config: &SimulationConfig) {
    let h = config.half_size();
    let walls = &config.walls;

    if state.position.x < bounds.left() + h {
        state.position.x = bounds.left() + h;
        if state.velocity.x < 0.0 {
            let impact = -state.velocity.x;
            state.velocity.x = impact * walls.restitution;
            state.angular_velocity *= walls.angular_damping;
            state.angular_velocity.z += impact * walls.impact_torque;
        }
    } else if state.position.x > bounds.right() - h {
        state.position.x = bounds.right() - h;
        if state.velocity.x > 0.0 {
            let impact = state.velocity.x;
            state.velocity.x = -impact * walls.restitution;
            state.angular_velocity *= walls.angular_damping;
            state.angular_velocity.z -= impact * walls.impact_torque;
        }
    }

    if state.position.z < bounds.back() + h {
        state.position.z = bounds.back() + h;
        if state.velocity.z < 0.0 {
            let impact = -state.velocity.z;
            state.velocity.z = impact * walls.restitution;
            state.angular_velocity *= walls.angular_damping;
            state.angular_velocity.x -= impact * walls.impact_torque;
        }
    } else if state.position.z > bounds.front() - h {
        state.position.z = bounds.front() - h;
        if state.velocity.z > 0.0 {
            let impact = state.velocity.z;
            state.velocity.z = -impact * walls.restitution;
            state.angular_velocity *= walls.angular_damping;
            state.angular_velocity.x += impact * walls.impact_torque;
        }
    }
}

/// Push overlapping dice apart. Runs `contacts.iterations` sequential passes
/// over every pair with at least one unsettled die. Settled dice never move.
pub fn resolve_dice_contacts(dice: &mut [DiceBody], config: &SimulationConfig) {
    let params = &config.contacts;
    let min_dist = config.die.size * params.separation_factor;

    for _ in 0..params.iterations {
        for j in 1..dice.len() {
            let (head, tail) = dice.split_at_mut(j);
            let b = &mut tail[0];
            for a in head.iter_mut() {
                separate_pair(a, b, min_dist, params);
            }
        }
    }
}

fn separate_pair(a: &mut DiceBody, b: &mut DiceBody, min_dist: Real, params: &ContactParams) {
    let a_active = !a.is_settled();
    let b_active = !b.is_settled();
    if !a_active && !b_active {
        return;
    }

    let delta = b.state.position - a.state.position;
    let dist = delta.norm();
    if dist >= min_dist {
        return;
    }

    let normal = contact_normal(&delta, a.id.0 * 7 + b.id.0 * 13, params.vertical_damping);
    let overlap = min_dist - dist;
    let approach = (b.state.velocity - a.state.velocity).dot(&normal);
    let impulse = (-approach * (1.0 + params.restitution)).max(params.min_separation_speed);

    // the moving die takes the whole correction when its partner is settled
    let share = if a_active && b_active { 0.5 } else { 1.0 };
    if let Some(s) = a.active_state_mut() {
        s.position -= normal * (overlap * share);
        s.velocity -= normal * (impulse * share);
    }
    if let Some(s) = b.active_state_mut() {
        s.position += normal * (overlap * share);
        s.velocity += normal * (impulse * share);
    }
}

/// Unit direction from `a` to `b` with its vertical part damped. Dice stacked
/// exactly on top of each other get a horizontal direction picked from `seed`
/// so they slide apart instead of balancing.
fn contact_normal(delta: &Vector3<Real>, seed: usize, vertical_damping: Real) -> Vector3<Real> {
    let mut n = Vector3::new(delta.x, delta.y * vertical_damping, delta.z);
    if delta.x.abs() + delta.z.abs() < EPS {
        let angle = seed as Real;
        n.x = angle.cos();
        n.z = angle.sin();
    }
    n.normalize()
}

/// Clamp a die's centre back inside the box formed by `bounds`, the floor and
/// the ceiling. Position only.
pub fn contain(state: &mut PhysicsState, bounds: &Bounds, config: &SimulationConfig) {
    let h = config.half_size();
    let p = &mut state.position;
    p.x = p.x.max(bounds.left() + h).min(bounds.right() - h);
    p.y = p.y.max(config.floor.floor_y + h).min(config.floor.ceiling_y - h);
    p.z = p.z.max(bounds.back() + h).min(bounds.front() - h);
}
