use crate::element::Element;
use std::fmt;

/// Elementwise transforms a `Func` node can apply, each paired with its derivative.
///
/// The discriminant is stable: compiled programs store it as the function
/// selector of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnaryFunc {
    Sigmoid = 0,
    Relu = 1,
    Exp = 2,
    Log = 3,
    Tanh = 4,
    Square = 5,
}

/// `log(0)` evaluates to this instead of `-inf`.
pub const LOG_ZERO: f32 = -80.0;

impl UnaryFunc {
    pub const ALL: [UnaryFunc; 6] = [
        UnaryFunc::Sigmoid,
        UnaryFunc::Relu,
        UnaryFunc::Exp,
        UnaryFunc::Log,
        UnaryFunc::Tanh,
        UnaryFunc::Square,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<UnaryFunc> {
        UnaryFunc::ALL.get(index as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryFunc::Sigmoid => "sigmoid",
            UnaryFunc::Relu => "relu",
            UnaryFunc::Exp => "exp",
            UnaryFunc::Log => "log",
            UnaryFunc::Tanh => "tanh",
            UnaryFunc::Square => "square",
        }
    }

    /// Applies the transform. Branch-free, so every lane of a lane type is
    /// handled independently.
    #[inline]
    pub fn apply<T: Element>(self, x: T) -> T {
        match self {
            UnaryFunc::Sigmoid => sigmoid(x),
            UnaryFunc::Relu => T::zero().lt_mask(x) * x,
            UnaryFunc::Exp => x.exp(),
            UnaryFunc::Log => {
                let zero_mask = x.eq_mask(T::zero());
                let safe = x + zero_mask;
                safe.ln() * (T::one() - zero_mask) + zero_mask * T::splat(LOG_ZERO)
            }
            UnaryFunc::Tanh => x.tanh(),
            UnaryFunc::Square => x * x,
        }
    }

    /// Derivative of the transform evaluated at `x`.
    #[inline]
    pub fn derivative<T: Element>(self, x: T) -> T {
        match self {
            UnaryFunc::Sigmoid => {
                let s = sigmoid(x);
                s * (T::one() - s)
            }
            // 1 at zero
            UnaryFunc::Relu => T::one() - x.lt_mask(T::zero()),
            UnaryFunc::Exp => x.exp(),
            UnaryFunc::Log => {
                let zero_mask = x.eq_mask(T::zero());
                let safe = x + zero_mask;
                (T::one() / safe) * (T::one() - zero_mask) + zero_mask * T::splat(-LOG_ZERO)
            }
            UnaryFunc::Tanh => {
                let t = x.tanh();
                T::one() - t * t
            }
            UnaryFunc::Square => T::splat(2.0) * x,
        }
    }
}

impl fmt::Display for UnaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn sigmoid<T: Element>(x: T) -> T {
    T::one() / (T::one() + (-x).exp())
}

#[cfg(test)]
#[path = "func_test.rs"]
mod tests;
