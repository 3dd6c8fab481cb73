use crate::{DiceError, Real};

/// Rectangular floor region dice are kept inside. `left..right` spans x,
/// `back..front` spans z. Always non-degenerate once constructed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    left: Real,
    right: Real,
    front: Real,
    back: Real,
}

impl Bounds {
    pub fn new(left: Real, right: Real, front: Real, back: Real) -> Result<Self, DiceError> {
        let finite = [left, right, front, back].iter().all(|v| v.is_finite());
        if !finite || right <= left || front <= back {
            return Err(DiceError::DegenerateBounds {
                left,
                right,
                front,
                back,
            });
        }
        Ok(Self {
            left,
            right,
            front,
            back,
        })
    }

    /// Rectangle centred on the origin.
    pub fn centered(half_width: Real, half_depth: Real) -> Result<Self, DiceError> {
        Self::new(-half_width, half_width, half_depth, -half_depth)
    }

    pub fn left(&self) -> Real {
        self.left
    }

    pub fn right(&self) -> Real {
        self.right
    }

    pub fn front(&self) -> Real {
        self.front
    }

    pub fn back(&self) -> Real {
        self.back
    }

    pub fn width(&self) -> Real {
        self.right - self.left
    }

    pub fn depth(&self) -> Real {
        self.front - self.back
    }

    /// Reject a floor that cannot hold one die of the given size.
    pub fn check_fits(&self, die_size: Real) -> Result<(), DiceError> {
        if self.width() < die_size || self.depth() < die_size {
            return Err(DiceError::BoundsTooSmall {
                width: self.width(),
                depth: self.depth(),
                die_size,
            });
        }
        Ok(())
    }
}

/// Source of the floor rectangle, usually derived from camera framing.
/// Queried once per roll.
pub trait BoundsProvider {
    fn floor_bounds(&self) -> Result<Bounds, DiceError>;
}

impl BoundsProvider for Bounds {
    fn floor_bounds(&self) -> Result<Bounds, DiceError> {
        Ok(*self)
    }
}
