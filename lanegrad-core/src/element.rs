use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// A numeric type usable as the element of node values and compiled programs.
///
/// Two families implement it: plain `f32`, and the fixed-width lane vectors of
/// [`crate::simd`], where every operation acts on each lane independently. Code
/// written against `Element` therefore evaluates one example per lane without
/// knowing how many lanes there are.
///
/// Comparisons produce masks (`1.0` where true, `0.0` where false) instead of
/// `bool`, so that branching becomes multiplication and stays lane-parallel.
pub trait Element:
    Copy
    + Debug
    + PartialEq
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + Send
    + Sync
    + 'static
{
    /// Number of independent scalars packed into one element.
    const LANES: usize;

    /// Broadcasts a scalar into every lane.
    fn splat(value: f32) -> Self;

    /// Builds an element lane by lane.
    fn from_lane_fn<F: FnMut(usize) -> f32>(f: F) -> Self;

    /// Reads one lane. For `f32`, every lane index reads the value itself.
    fn lane(&self, lane: usize) -> f32;

    /// Horizontal sum over all lanes.
    fn sum_lanes(&self) -> f32;

    /// `1.0` in every lane where `self < rhs`, else `0.0`.
    fn lt_mask(self, rhs: Self) -> Self {
        Self::from_lane_fn(|l| if self.lane(l) < rhs.lane(l) { 1.0 } else { 0.0 })
    }

    /// `1.0` in every lane where `self == rhs`, else `0.0`.
    fn eq_mask(self, rhs: Self) -> Self {
        Self::from_lane_fn(|l| if self.lane(l) == rhs.lane(l) { 1.0 } else { 0.0 })
    }

    fn max_elem(self, rhs: Self) -> Self {
        Self::from_lane_fn(|l| self.lane(l).max(rhs.lane(l)))
    }

    fn exp(self) -> Self {
        Self::from_lane_fn(|l| self.lane(l).exp())
    }

    fn ln(self) -> Self {
        Self::from_lane_fn(|l| self.lane(l).ln())
    }

    fn tanh(self) -> Self {
        Self::from_lane_fn(|l| self.lane(l).tanh())
    }

    fn sqrt(self) -> Self {
        Self::from_lane_fn(|l| self.lane(l).sqrt())
    }
}

impl Element for f32 {
    const LANES: usize = 1;

    #[inline]
    fn splat(value: f32) -> Self {
        value
    }

    #[inline]
    fn from_lane_fn<F: FnMut(usize) -> f32>(mut f: F) -> Self {
        f(0)
    }

    #[inline]
    fn lane(&self, _lane: usize) -> f32 {
        *self
    }

    #[inline]
    fn sum_lanes(&self) -> f32 {
        *self
    }

    #[inline]
    fn lt_mask(self, rhs: Self) -> Self {
        if self < rhs {
            1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn eq_mask(self, rhs: Self) -> Self {
        if self == rhs {
            1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn max_elem(self, rhs: Self) -> Self {
        f32::max(self, rhs)
    }

    #[inline]
    fn exp(self) -> Self {
        f32::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f32::ln(self)
    }

    #[inline]
    fn tanh(self) -> Self {
        f32::tanh(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }
}

/// Re-expresses `value` as another element type. Lanes are read modulo the
/// source width, so a plain `f32` is broadcast into every lane.
pub fn broadcast_lanes<S: Element, T: Element>(value: S) -> T {
    T::from_lane_fn(|l| value.lane(l % S::LANES))
}

/// Moves a gradient into another element type. A narrower target lane `l`
/// receives the sum of source lanes `l, l + T::LANES, ...` (a single-lane
/// target gets the sum of all lanes); a target at least as wide receives the
/// source lane by lane.
pub fn fold_lanes<S: Element, T: Element>(value: S) -> T {
    if T::LANES == 1 {
        T::splat(value.sum_lanes())
    } else if T::LANES >= S::LANES {
        broadcast_lanes(value)
    } else {
        T::from_lane_fn(|l| (l..S::LANES).step_by(T::LANES).map(|k| value.lane(k)).sum())
    }
}
