//! libdiceroll: frame-stepped cube dice simulation for a tabletop dice game.
//!
//! - Launches up to `max_dice` six-sided dice into a rectangular floor region
//! - Explicit Euler integration under gravity, one step per animation frame
//! - Floor/ceiling/wall response and iterative dice-to-dice separation
//! - Soft-snap settling with a stall fallback and a hard frame deadline
//! - Face reading from the final orientation
//!
//! Public API:
//! - Bounds: floor rectangle (left/right/front/back), validated on construction
//! - RollSession::with_rng(config, rng) / RollSession::new(config)
//! - session.start(dice_count, bounds), session.tick(dt) -> FrameOutcome
//! - session.run(&mut FixedStep::new(dt)) -> Option<RollResult>
//!
//! Example (three dice, fixed seed):
//! let mut session = RollSession::with_rng(SimulationConfig::default(), StdRng::seed_from_u64(7))?;
//! session.start(3, Bounds::new(-4.0, 4.0, 4.0, -4.0)?)?;
//! let result = session.run(&mut FixedStep::new(1.0 / 60.0));
//! result.unwrap().total() -> sum of the three faces

pub use nalgebra::{UnitQuaternion, Vector3};

mod body;
mod bounds;
mod collision;
mod config;
mod error;
mod faces;
mod integrator;
mod session;
mod settle;

pub use body::{DiceBody, DieId, DiePhase, PhysicsState};
pub use bounds::{Bounds, BoundsProvider};
pub use collision::{contain, resolve_dice_contacts, resolve_floor_and_ceiling, resolve_walls};
pub use config::{
    ContactParams, DieParams, FloorParams, IntegratorParams, LaunchParams, SettleParams,
    SimulationConfig, WallParams,
};
pub use error::DiceError;
pub use faces::{read_face, upright_face, FaceNormalEntry, FACE_NORMALS};
pub use integrator::{clamp_dt, integrate};
pub use session::{
    FixedStep, FrameOutcome, FrameScheduler, RollResult, RollSession, SessionPhase, StartOutcome,
};
pub use settle::{detect_settle, force_settle, SettleReason};

pub type Real = f32;
