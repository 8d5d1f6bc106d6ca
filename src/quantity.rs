pub mod cost;
pub mod energy;
pub mod power;
pub mod rate;
pub mod time;

use std::ops::Mul;

use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    PartialEq,
    PartialOrd,
    Serialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Neg,
    derive_more::Sub,
    derive_more::SubAssign,
    derive_more::Sum,
)]
#[serde(transparent)]
pub struct Quantity<const POWER: isize, const TIME: isize, const COST: isize>(pub f64);

impl<const POWER: isize, const TIME: isize, const COST: isize> Quantity<POWER, TIME, COST> {
    pub const ZERO: Self = Self(0.0);

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Mul<f64>
    for Quantity<POWER, TIME, COST>
{
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    type Bare = Quantity<0, 0, 0>;

    #[test]
    fn test_scale() {
        assert_abs_diff_eq!((Bare::from(1.5) * 2.0).0, 3.0);
    }

    #[test]
    fn test_is_finite() {
        assert!(Bare::ZERO.is_finite());
        assert!(!Bare::from(f64::NAN).is_finite());
    }
}
