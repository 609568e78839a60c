use crate::element::Element;
use crate::error::LaneGradError;
use crate::node::Node;
use crate::optim::optimizer_trait::Optimizer;

/// Hyperparameters of [`SgdOptimizer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdConfig {
    pub lr: f32,
    /// Weight of the current batch's accumulated gradient. The previous
    /// batch's sum is added unweighted.
    pub momentum: f32,
    /// Examples per batch; the effective step is `lr / batch_size`.
    pub batch_size: usize,
}

impl Default for SgdConfig {
    fn default() -> Self {
        SgdConfig {
            lr: 0.01,
            momentum: 0.9,
            batch_size: 1,
        }
    }
}

/// Stochastic gradient descent over accumulated batch gradients.
///
/// For every Parameter: `update = momentum * accum_grad + prev_accum_grad`,
/// then `value -= (lr / batch_size) * update`. With `momentum` 1 and a
/// cleared previous batch this is plain gradient descent.
#[derive(Debug)]
pub struct SgdOptimizer<T: Element = f32> {
    params: Vec<Node<T>>,
    config: SgdConfig,
    steps: usize,
}

impl<T: Element> SgdOptimizer<T> {
    /// Creates a new `SgdOptimizer`.
    ///
    /// # Arguments
    ///
    /// * `params`: the Parameter nodes to update.
    /// * `config`: learning rate, momentum and batch size.
    pub fn new(params: impl IntoIterator<Item = Node<T>>, config: SgdConfig) -> Result<Self, LaneGradError> {
        if config.batch_size == 0 {
            return Err(LaneGradError::InvalidArgument("SGD batch size must be at least 1".to_string()));
        }
        let params: Vec<Node<T>> = params.into_iter().collect();
        if let Some(p) = params.iter().find(|p| !p.is_parameter()) {
            return Err(LaneGradError::NotAParameter {
                operation: format!("SGD over node {}", p.id()),
            });
        }
        Ok(SgdOptimizer {
            params,
            config,
            steps: 0,
        })
    }

    pub fn config(&self) -> &SgdConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SgdConfig {
        &mut self.config
    }

    pub fn params(&self) -> &[Node<T>] {
        &self.params
    }

    /// Number of completed steps.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl<T: Element> Optimizer for SgdOptimizer<T> {
    fn step(&mut self) -> Result<(), LaneGradError> {
        let rate = T::splat(self.config.lr / self.config.batch_size as f32);
        let momentum = T::splat(self.config.momentum);

        for param in &self.params {
            let mut guard = param.write_data();
            if guard.accum_grad.is_empty() {
                log::warn!("SGD: parameter {} has no accumulated gradient, skipping", guard.id);
                continue;
            }
            let update = guard
                .accum_grad
                .zip_map(&guard.prev_accum_grad, "sgd momentum", |a, p| momentum * a + p)?;
            let next = guard.value.zip_map(&update, "sgd step", |v, u| v - rate * u)?;
            guard.value = next;
        }
        self.steps += 1;
        log::debug!(
            "SGD step {}: {} parameters, lr {} / batch {}, momentum {}",
            self.steps,
            self.params.len(),
            self.config.lr,
            self.config.batch_size,
            self.config.momentum
        );
        Ok(())
    }

    fn zero_grad(&mut self) {
        for param in &self.params {
            let mut guard = param.write_data();
            guard.roll_accum_grad();
            guard.clear_grad();
        }
    }
}

#[cfg(test)]
#[path = "sgd_test.rs"]
mod tests;
