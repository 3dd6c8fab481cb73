use nalgebra::{Quaternion, UnitQuaternion};

use crate::{IntegratorParams, PhysicsState, Real};

/// Clamp a frame delta into `[0, max_dt]`. Non-finite deltas become zero.
pub fn clamp_dt(dt: Real, max_dt: Real) -> Real {
    if dt.is_finite() {
        dt.clamp(0.0, max_dt)
    } else {
        0.0
    }
}

/// Advance one die by `dt` under gravity (explicit Euler).
pub fn integrate(state: &mut PhysicsState, dt: Real, params: &IntegratorParams) {
    let dt = clamp_dt(dt, params.max_dt);
    if dt == 0.0 {
        return;
    }

    state.velocity.y += params.gravity * dt;
    state.position += state.velocity * dt;

    // q' = 0.5 * w * q
    let w = state.angular_velocity;
    let q = *state.orientation.quaternion();
    let dq = Quaternion::from_parts(0.0, w) * q * (0.5 * dt);
    state.orientation = UnitQuaternion::new_normalize(q + dq);
}
