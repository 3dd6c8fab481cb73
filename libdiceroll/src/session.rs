//! Roll session: owns the dice of the current roll and advances them one
//! frame per `tick`. Idle -> Rolling -> Complete.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collision::{contain, resolve_dice_contacts, resolve_floor_and_ceiling, resolve_walls};
use crate::faces::read_face;
use crate::integrator::{clamp_dt, integrate};
use crate::settle::{detect_settle, force_settle, SettleReason};
use crate::{
    Bounds, BoundsProvider, DiceBody, DiceError, DieId, PhysicsState, Real, SimulationConfig,
};

/// Face values of a finished roll, in launch order, and their sum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RollResult {
    face_values: Vec<u8>,
    total: u32,
}

impl RollResult {
    pub fn new(face_values: Vec<u8>) -> Self {
        let total = face_values.iter().map(|&v| u32::from(v)).sum();
        Self { face_values, total }
    }

    pub fn face_values(&self) -> &[u8] {
        &self.face_values
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionPhase {
    Idle,
    Rolling { frame: u32, bounds: Bounds },
    Complete(RollResult),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { dice: usize },
    /// A roll is already in flight; nothing changed.
    AlreadyRolling,
}

/// What a single `tick` did.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Not rolling (idle, complete or cleared). Nothing was touched.
    Stopped,
    /// Stepped one frame; `settled` of `dice` are at rest.
    Advanced { settled: usize, dice: usize },
    /// The last die settled on this frame.
    Completed(RollResult),
}

/// Source of frame deltas. Returning `None` ends the loop.
pub trait FrameScheduler {
    fn next_frame(&mut self) -> Option<Real>;
}

/// Fixed frame delta, optionally limited to a number of frames.
#[derive(Clone, Debug)]
pub struct FixedStep {
    dt: Real,
    remaining: Option<u32>,
}

impl FixedStep {
    pub fn new(dt: Real) -> Self {
        Self { dt, remaining: None }
    }

    pub fn with_budget(dt: Real, frames: u32) -> Self {
        Self {
            dt,
            remaining: Some(frames),
        }
    }
}

impl FrameScheduler for FixedStep {
    fn next_frame(&mut self) -> Option<Real> {
        match self.remaining.as_mut() {
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(self.dt)
            }
            None => Some(self.dt),
        }
    }
}

/// Drives one roll at a time. The session is the only writer of die state;
/// callers read `live_results`, `dice` and the final `RollResult`.
pub struct RollSession<R: RngCore = StdRng> {
    config: SimulationConfig,
    rng: R,
    dice: Vec<DiceBody>,
    phase: SessionPhase,
    live: Vec<u8>,
    round: usize,
}

impl RollSession<StdRng> {
    /// Session with an entropy-seeded RNG.
    pub fn new(config: SimulationConfig) -> Result<Self, DiceError> {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: RngCore> RollSession<R> {
    pub fn with_rng(config: SimulationConfig, rng: R) -> Result<Self, DiceError> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            dice: Vec::new(),
            phase: SessionPhase::Idle,
            live: Vec::new(),
            round: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_rolling(&self) -> bool {
        matches!(self.phase, SessionPhase::Rolling { .. })
    }

    pub fn dice(&self) -> &[DiceBody] {
        &self.dice
    }

    /// Faces of the dice settled so far, in launch order.
    pub fn live_results(&self) -> &[u8] {
        &self.live
    }

    pub fn result(&self) -> Option<&RollResult> {
        match &self.phase {
            SessionPhase::Complete(result) => Some(result),
            _ => None,
        }
    }

    /// Rounds started since the session was created or last cleared.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Dice the next call to `start_next_round` will throw.
    pub fn next_round_dice(&self) -> usize {
        (self.round + 1).min(self.config.max_dice)
    }

    pub fn start(&mut self, dice_count: usize, bounds: Bounds) -> Result<StartOutcome, DiceError> {
        self.start_from(dice_count, &bounds)
    }

    /// Begin the next round, which throws one more die than the last (up to `max_dice`).
    pub fn start_next_round<P>(&mut self, provider: &P) -> Result<StartOutcome, DiceError>
    where
        P: BoundsProvider + ?Sized,
    {
        self.start_from(self.next_round_dice(), provider)
    }

    /// Launch `dice_count` dice (capped at `max_dice`) into the provider's
    /// bounds. Dice from the previous roll are discarded. No-op while a roll
    /// is in flight.
    pub fn start_from<P>(
        &mut self,
        dice_count: usize,
        provider: &P,
    ) -> Result<StartOutcome, DiceError>
    where
        P: BoundsProvider + ?Sized,
    {
        if self.is_rolling() {
            debug!("start ignored, roll already in flight");
            return Ok(StartOutcome::AlreadyRolling);
        }
        if dice_count == 0 {
            return Err(DiceError::NoDice);
        }
        let bounds = provider.floor_bounds()?;
        bounds.check_fits(self.config.die.size)?;

        let count = dice_count.min(self.config.max_dice);
        if count < dice_count {
            debug!(requested = dice_count, count, "dice count capped");
        }

        self.dice.clear();
        self.live.clear();
        for index in 0..count {
            let die = launch_die(&mut self.rng, &self.config, &bounds, index);
            self.dice.push(die);
        }
        self.round += 1;
        self.phase = SessionPhase::Rolling { frame: 0, bounds };
        debug!(round = self.round, dice = count, ?bounds, "roll started");
        Ok(StartOutcome::Started { dice: count })
    }

    /// Drop every die and return to idle. Safe mid-roll: the next `tick`
    /// sees the idle phase and touches nothing.
    pub fn clear(&mut self) {
        if self.is_rolling() {
            debug!("roll cleared in flight");
        }
        self.dice.clear();
        self.live.clear();
        self.round = 0;
        self.phase = SessionPhase::Idle;
    }

    /// Advance the roll by one frame.
    pub fn tick(&mut self, dt: Real) -> FrameOutcome {
        let (frame, bounds) = match self.phase {
            SessionPhase::Rolling { frame, bounds } => (frame.saturating_add(1), bounds),
            _ => return FrameOutcome::Stopped,
        };
        let config = &self.config;
        let dt = clamp_dt(dt, config.integrator.max_dt);

        for die in &mut self.dice {
            if let Some(state) = die.active_state_mut() {
                integrate(state, dt, &config.integrator);
                resolve_floor_and_ceiling(state, config);
                resolve_walls(state, &bounds, config);
            }
        }

        resolve_dice_contacts(&mut self.dice, config);

        for die in &mut self.dice {
            if let Some(state) = die.active_state_mut() {
                contain(state, &bounds, config);
            }
            if let Some(reason) = detect_settle(die, config) {
                debug!(die = %die.id(), face = ?die.face(), %reason, frame, "die settled");
            }
        }

        if frame >= config.settle.deadline_frames {
            for die in self.dice.iter_mut().filter(|d| !d.is_settled()) {
                let face = force_settle(die, config);
                warn!(
                    die = %die.id(),
                    face,
                    reason = %SettleReason::Deadline,
                    frame,
                    "die force-settled"
                );
            }
        }

        self.live.clear();
        self.live.extend(self.dice.iter().filter_map(DiceBody::face));

        if self.live.len() < self.dice.len() {
            self.phase = SessionPhase::Rolling { frame, bounds };
            return FrameOutcome::Advanced {
                settled: self.live.len(),
                dice: self.dice.len(),
            };
        }

        let faces: Vec<u8> = self
            .dice
            .iter()
            .map(|d| read_face(&d.state().orientation))
            .collect();
        debug_assert_eq!(faces, self.live);
        let result = RollResult::new(faces);
        info!(
            faces = ?result.face_values(),
            total = result.total(),
            frames = frame,
            "roll complete"
        );
        self.phase = SessionPhase::Complete(result.clone());
        FrameOutcome::Completed(result)
    }

    /// Tick until the roll completes, the scheduler runs dry, or the session
    /// stops rolling. Returns the result only if the roll completed here.
    pub fn run<S>(&mut self, scheduler: &mut S) -> Option<RollResult>
    where
        S: FrameScheduler + ?Sized,
    {
        while let Some(dt) = scheduler.next_frame() {
            match self.tick(dt) {
                FrameOutcome::Completed(result) => return Some(result),
                FrameOutcome::Stopped => return None,
                FrameOutcome::Advanced { .. } => {}
            }
        }
        None
    }
}

fn span<R: Rng + ?Sized>(rng: &mut R, lo: Real, hi: Real) -> Real {
    lo + (hi - lo) * rng.gen::<Real>()
}

/// Throw one die in from the right half of the floor, stacked `index` places
/// up the launch column so freshly launched dice never overlap.
fn launch_die<R: Rng + ?Sized>(
    rng: &mut R,
    config: &SimulationConfig,
    bounds: &Bounds,
    index: usize,
) -> DiceBody {
    let h = config.half_size();
    let launch = &config.launch;

    let mid_x = (bounds.left() + bounds.right()) * 0.5;
    let x = span(rng, mid_x.max(bounds.left() + h), bounds.right() - h);
    let z = span(rng, bounds.back() + h, bounds.front() - h);
    let y = config.launch_height(index);

    let speed = span(rng, launch.speed_min, launch.speed_max);
    let velocity = Vector3::new(
        -speed,
        -span(rng, 0.0, speed * 0.25),
        span(rng, -launch.lateral_spread, launch.lateral_spread),
    );
    let angular_velocity = Vector3::new(
        span(rng, -launch.spin, launch.spin),
        span(rng, -launch.spin, launch.spin),
        span(rng, -launch.spin, launch.spin),
    );

    DiceBody::new(
        DieId(index),
        PhysicsState {
            position: Vector3::new(x, y, z),
            velocity,
            orientation: random_orientation(rng),
            angular_velocity,
        },
    )
}

/// Uniformly distributed orientation.
fn random_orientation<R: Rng + ?Sized>(rng: &mut R) -> UnitQuaternion<Real> {
    let u1: Real = rng.gen();
    let u2: Real = rng.gen();
    let u3: Real = rng.gen();
    let q1 = (1.0 - u1).sqrt();
    let q2 = u1.sqrt();
    let theta1 = 2.0 * std::f32::consts::PI * u2;
    let theta2 = 2.0 * std::f32::consts::PI * u3;
    UnitQuaternion::from_quaternion(Quaternion::new(
        q1 * theta1.cos(),
        q1 * theta1.sin(),
        q2 * theta2.cos(),
        q2 * theta2.sin(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiePhase;
    use std::cell::Cell;

    fn session(seed: u64) -> RollSession<StdRng> {
        RollSession::with_rng(SimulationConfig::default(), StdRng::seed_from_u64(seed))
            .expect("session")
    }

    fn bounds() -> Bounds {
        Bounds::new(-4.0, 4.0, 4.0, -4.0).unwrap()
    }

    #[test]
    fn test_roll_result_total() {
        let r = RollResult::new(vec![6, 6, 6, 1]);
        assert_eq!(r.total(), 19);
        assert_eq!(r.face_values(), &[6, 6, 6, 1]);
        assert_eq!(RollResult::new(Vec::new()).total(), 0);
    }

    #[test]
    fn test_fixed_step_budget() {
        let mut s = FixedStep::with_budget(0.5, 2);
        assert_eq!(s.next_frame(), Some(0.5));
        assert_eq!(s.next_frame(), Some(0.5));
        assert_eq!(s.next_frame(), None);
        assert_eq!(FixedStep::new(0.25).next_frame(), Some(0.25));
    }

    #[test]
    fn test_idle_tick_is_stopped() {
        let mut s = session(1);
        assert_eq!(s.tick(1.0 / 60.0), FrameOutcome::Stopped);
        assert_eq!(s.phase(), &SessionPhase::Idle);
    }

    #[test]
    fn test_launch_inside_bounds_without_overlap() {
        let mut s = session(2);
        assert_eq!(s.start(10, bounds()).unwrap(), StartOutcome::Started { dice: 10 });
        let h = s.config().half_size();
        let min_gap = s.config().die.size * s.config().contacts.separation_factor;
        for (i, a) in s.dice().iter().enumerate() {
            let p = a.state().position;
            assert!(p.x >= 0.0 && p.x <= 4.0 - h);
            assert!(p.z >= -4.0 + h && p.z <= 4.0 - h);
            assert!(p.y > s.config().rest_height());
            assert!(a.state().velocity.x < 0.0);
            assert_eq!(a.phase(), DiePhase::Tumbling { floor_frames: 0 });
            for b in &s.dice()[i + 1..] {
                assert!((b.state().position - p).norm() >= min_gap);
            }
        }
    }

    #[test]
    fn test_launch_column_under_low_ceiling() {
        let mut cfg = SimulationConfig::default();
        cfg.floor.ceiling_y = 5.0;
        cfg.launch.height = 1.0;
        cfg.max_dice = 3;
        let mut s = RollSession::with_rng(cfg, StdRng::seed_from_u64(21)).unwrap();
        assert_eq!(s.start(10, bounds()).unwrap(), StartOutcome::Started { dice: 3 });

        let cfg = s.config();
        let min_gap = cfg.die.size * cfg.contacts.separation_factor;
        let top = cfg.floor.ceiling_y - cfg.half_size();
        for (i, a) in s.dice().iter().enumerate() {
            let p = a.state().position;
            assert_eq!(p.y, cfg.launch_height(i));
            assert!(p.y <= top);
            for b in &s.dice()[i + 1..] {
                assert!((b.state().position - p).norm() >= min_gap);
            }
        }
    }

    struct CountingProvider {
        calls: Cell<usize>,
        fail: bool,
    }

    impl BoundsProvider for CountingProvider {
        fn floor_bounds(&self) -> Result<Bounds, DiceError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(DiceError::DegenerateBounds {
                    left: 0.0,
                    right: 0.0,
                    front: 0.0,
                    back: 0.0,
                });
            }
            Bounds::centered(3.0 + self.calls.get() as Real, 4.0)
        }
    }

    #[test]
    fn test_bounds_read_once_per_roll() {
        let provider = CountingProvider {
            calls: Cell::new(0),
            fail: false,
        };
        let mut s = session(22);
        s.start_next_round(&provider).unwrap();
        assert_eq!(provider.calls.get(), 1);
        let expected = Bounds::centered(4.0, 4.0).unwrap();
        assert!(matches!(s.phase(), SessionPhase::Rolling { bounds, .. } if *bounds == expected));

        // in flight: the provider is not consulted again
        assert_eq!(s.start_next_round(&provider).unwrap(), StartOutcome::AlreadyRolling);
        assert_eq!(provider.calls.get(), 1);

        s.run(&mut FixedStep::new(1.0 / 60.0)).expect("first roll");
        s.start_next_round(&provider).unwrap();
        assert_eq!(provider.calls.get(), 2);
        let expected = Bounds::centered(5.0, 4.0).unwrap();
        assert!(matches!(s.phase(), SessionPhase::Rolling { bounds, .. } if *bounds == expected));
        assert_eq!(s.dice().len(), 2);
    }

    #[test]
    fn test_provider_error_leaves_session_idle() {
        let provider = CountingProvider {
            calls: Cell::new(0),
            fail: true,
        };
        let mut s = session(23);
        assert!(matches!(
            s.start_from(3, &provider),
            Err(DiceError::DegenerateBounds { .. })
        ));
        assert_eq!(provider.calls.get(), 1);
        assert_eq!(s.phase(), &SessionPhase::Idle);
        assert!(s.dice().is_empty());
        assert_eq!(s.round(), 0);
        assert_eq!(s.tick(1.0 / 60.0), FrameOutcome::Stopped);
    }

    #[test]
    fn test_second_start_is_noop() {
        let mut s = session(3);
        s.start(2, bounds()).unwrap();
        s.tick(1.0 / 60.0);
        let snapshot: Vec<_> = s.dice().iter().map(|d| d.state().clone()).collect();

        assert_eq!(s.start(5, bounds()).unwrap(), StartOutcome::AlreadyRolling);
        assert_eq!(s.dice().len(), 2);
        assert_eq!(s.round(), 1);
        let after: Vec<_> = s.dice().iter().map(|d| d.state().clone()).collect();
        assert_eq!(snapshot, after);
        assert!(matches!(s.phase(), SessionPhase::Rolling { frame: 1, .. }));
    }

    #[test]
    fn test_start_rejects_bad_input() {
        let mut s = session(4);
        assert!(matches!(s.start(0, bounds()), Err(DiceError::NoDice)));
        let tiny = Bounds::centered(0.2, 0.2).unwrap();
        assert!(matches!(s.start(1, tiny), Err(DiceError::BoundsTooSmall { .. })));
        assert_eq!(s.phase(), &SessionPhase::Idle);
    }

    #[test]
    fn test_dice_count_capped() {
        let mut s = session(5);
        assert_eq!(s.start(25, bounds()).unwrap(), StartOutcome::Started { dice: 10 });
        assert_eq!(s.dice().len(), 10);
    }

    #[test]
    fn test_rounds_add_one_die() {
        let mut s = session(6);
        for expected in 1..=3 {
            assert_eq!(s.next_round_dice(), expected);
            s.start_next_round(&bounds()).unwrap();
            assert_eq!(s.dice().len(), expected);
            assert!(s.run(&mut FixedStep::new(1.0 / 60.0)).is_some());
        }
        assert_eq!(s.round(), 3);
    }

    #[test]
    fn test_clear_mid_roll_stops_loop() {
        let mut s = session(7);
        s.start(4, bounds()).unwrap();
        for _ in 0..5 {
            s.tick(1.0 / 60.0);
        }
        s.clear();
        assert!(s.dice().is_empty());
        assert!(s.live_results().is_empty());
        assert_eq!(s.tick(1.0 / 60.0), FrameOutcome::Stopped);
        assert_eq!(s.run(&mut FixedStep::with_budget(1.0 / 60.0, 10)), None);
        assert_eq!(s.round(), 0);
    }

    #[test]
    fn test_deadline_force_settles() {
        let mut cfg = SimulationConfig::default();
        cfg.settle.deadline_frames = 1;
        let mut s = RollSession::with_rng(cfg, StdRng::seed_from_u64(8)).unwrap();
        s.start(3, bounds()).unwrap();

        match s.tick(1.0 / 60.0) {
            FrameOutcome::Completed(result) => {
                assert_eq!(result.face_values().len(), 3);
                assert_eq!(s.live_results(), result.face_values());
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(s.dice().iter().all(DiceBody::is_settled));
        assert_eq!(s.tick(1.0 / 60.0), FrameOutcome::Stopped);
    }

    #[test]
    fn test_restart_after_complete() {
        let mut s = session(9);
        s.start(2, bounds()).unwrap();
        let first = s.run(&mut FixedStep::new(1.0 / 60.0)).expect("first roll");
        assert_eq!(s.result(), Some(&first));

        assert_eq!(s.start(3, bounds()).unwrap(), StartOutcome::Started { dice: 3 });
        assert!(s.dice().iter().all(|d| !d.is_settled()));
        assert!(s.live_results().is_empty());
        assert_eq!(s.result(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = SimulationConfig::default();
        cfg.max_dice = 0;
        assert!(RollSession::with_rng(cfg, StdRng::seed_from_u64(0)).is_err());
    }
}
