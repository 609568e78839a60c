use crate::error::LaneGradError;

/// Common interface of the parameter update rules.
///
/// Optimizers read the accumulated gradient of each Parameter they own, so a
/// training loop runs `accum_grads` after every example's backward pass and
/// calls [`Optimizer::step`] once per batch.
pub trait Optimizer {
    /// Applies one update to every owned Parameter.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the step was successful, or a `LaneGradError` otherwise.
    fn step(&mut self) -> Result<(), LaneGradError>;

    /// Starts a new batch: snapshots the accumulated gradients for momentum
    /// and clears both the accumulator and the single-pass gradient.
    fn zero_grad(&mut self);
}
