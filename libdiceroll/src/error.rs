//! Error types for dice simulation.

use thiserror::Error;

use crate::Real;

/// Errors raised while setting up a roll. Stepping itself never fails.
#[derive(Error, Debug)]
pub enum DiceError {
    /// The floor rectangle is empty, inverted or not finite.
    #[error("degenerate bounds: left {left}, right {right}, front {front}, back {back}")]
    DegenerateBounds {
        left: Real,
        right: Real,
        front: Real,
        back: Real,
    },

    /// The floor rectangle cannot hold a single die.
    #[error("bounds {width}x{depth} cannot hold a die of size {die_size}")]
    BoundsTooSmall {
        width: Real,
        depth: Real,
        die_size: Real,
    },

    /// A roll with no dice was requested.
    #[error("a roll needs at least one die")]
    NoDice,

    /// A tuning parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
