//! Fixed-width lane vectors.
//!
//! `FVector<W>` packs `W` independent `f32` values and implements the full
//! [`Element`] surface lane by lane. The loops below are plain fixed-length
//! array loops, which the compiler turns into vector instructions; no
//! platform intrinsics are involved.
//!
//! A program compiled over `F32x8` evaluates eight examples per pass: lane `n`
//! of every input belongs to example `n`, and lane `n` of the result is that
//! example's output.

use crate::element::Element;
use num_traits::{One, Zero};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

/// A vector of `W` lanes of `f32`.
#[derive(Clone, Copy, PartialEq)]
#[repr(C, align(32))]
pub struct FVector<const W: usize>(pub [f32; W]);

/// Four lanes.
pub type F32x4 = FVector<4>;
/// Eight lanes.
pub type F32x8 = FVector<8>;

impl<const W: usize> FVector<W> {
    pub const fn new(lanes: [f32; W]) -> Self {
        FVector(lanes)
    }

    #[inline]
    pub fn splat(value: f32) -> Self {
        FVector([value; W])
    }

    pub fn lanes(&self) -> &[f32; W] {
        &self.0
    }

    pub fn set_lane(&mut self, lane: usize, value: f32) {
        self.0[lane] = value;
    }

    /// Horizontal sum.
    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    #[inline]
    fn zip_with(self, rhs: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let mut out = self.0;
        for (o, r) in out.iter_mut().zip(rhs.0.iter()) {
            *o = f(*o, *r);
        }
        FVector(out)
    }

    #[inline]
    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        let mut out = self.0;
        for o in out.iter_mut() {
            *o = f(*o);
        }
        FVector(out)
    }
}

impl<const W: usize> Default for FVector<W> {
    fn default() -> Self {
        FVector([0.0; W])
    }
}

impl<const W: usize> From<f32> for FVector<W> {
    fn from(value: f32) -> Self {
        FVector::splat(value)
    }
}

impl<const W: usize> From<[f32; W]> for FVector<W> {
    fn from(lanes: [f32; W]) -> Self {
        FVector(lanes)
    }
}

impl<const W: usize> Index<usize> for FVector<W> {
    type Output = f32;

    fn index(&self, lane: usize) -> &f32 {
        &self.0[lane]
    }
}

impl<const W: usize> IndexMut<usize> for FVector<W> {
    fn index_mut(&mut self, lane: usize) -> &mut f32 {
        &mut self.0[lane]
    }
}

macro_rules! lane_binop {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:tt) => {
        impl<const W: usize> $trait for FVector<W> {
            type Output = Self;

            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.zip_with(rhs, |a, b| a $op b)
            }
        }

        impl<const W: usize> $trait<f32> for FVector<W> {
            type Output = Self;

            #[inline]
            fn $method(self, rhs: f32) -> Self {
                self.map(|a| a $op rhs)
            }
        }

        impl<const W: usize> $trait<FVector<W>> for f32 {
            type Output = FVector<W>;

            #[inline]
            fn $method(self, rhs: FVector<W>) -> FVector<W> {
                rhs.map(|b| self $op b)
            }
        }

        impl<const W: usize> $assign_trait for FVector<W> {
            #[inline]
            fn $assign_method(&mut self, rhs: Self) {
                for (o, r) in self.0.iter_mut().zip(rhs.0.iter()) {
                    *o = *o $op *r;
                }
            }
        }

        impl<const W: usize> $assign_trait<f32> for FVector<W> {
            #[inline]
            fn $assign_method(&mut self, rhs: f32) {
                for o in self.0.iter_mut() {
                    *o = *o $op rhs;
                }
            }
        }
    };
}

lane_binop!(Add, add, AddAssign, add_assign, +);
lane_binop!(Sub, sub, SubAssign, sub_assign, -);
lane_binop!(Mul, mul, MulAssign, mul_assign, *);
lane_binop!(Div, div, DivAssign, div_assign, /);

impl<const W: usize> Neg for FVector<W> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        self.map(|a| -a)
    }
}

impl<const W: usize> Zero for FVector<W> {
    fn zero() -> Self {
        FVector([0.0; W])
    }

    fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl<const W: usize> One for FVector<W> {
    fn one() -> Self {
        FVector([1.0; W])
    }
}

impl<const W: usize> Sum for FVector<W> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc + v)
    }
}

impl<const W: usize> Element for FVector<W> {
    const LANES: usize = W;

    #[inline]
    fn splat(value: f32) -> Self {
        FVector([value; W])
    }

    #[inline]
    fn from_lane_fn<F: FnMut(usize) -> f32>(mut f: F) -> Self {
        let mut out = [0.0; W];
        for (l, o) in out.iter_mut().enumerate() {
            *o = f(l);
        }
        FVector(out)
    }

    #[inline]
    fn lane(&self, lane: usize) -> f32 {
        self.0[lane]
    }

    #[inline]
    fn sum_lanes(&self) -> f32 {
        self.sum()
    }

    #[inline]
    fn lt_mask(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| if a < b { 1.0 } else { 0.0 })
    }

    #[inline]
    fn eq_mask(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| if a == b { 1.0 } else { 0.0 })
    }

    #[inline]
    fn max_elem(self, rhs: Self) -> Self {
        self.zip_with(rhs, f32::max)
    }

    #[inline]
    fn exp(self) -> Self {
        self.map(f32::exp)
    }

    #[inline]
    fn ln(self) -> Self {
        self.map(f32::ln)
    }

    #[inline]
    fn tanh(self) -> Self {
        self.map(f32::tanh)
    }

    #[inline]
    fn sqrt(self) -> Self {
        self.map(f32::sqrt)
    }
}

impl<const W: usize> fmt::Debug for FVector<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<const W: usize> fmt::Display for FVector<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "simd_test.rs"]
mod tests;
