use crate::error::Result;

/// The model side of a training run.
///
/// The trainer never looks inside a model. It only flips the train/eval mode
/// flag, toggles gradient tracking around evaluation, feeds back the gradient
/// produced by the loss callable, and asks for norm clipping.
pub trait Model {
    /// Gradient of the loss with respect to the model output, as produced by
    /// the loss callable and consumed by `backward`.
    type Grad;

    fn is_training(&self) -> bool;

    fn set_training(&mut self, training: bool);

    /// Turned off for the duration of the evaluation passes.
    fn set_grad_enabled(&mut self, _enabled: bool) {}

    /// Accumulates parameter gradients for the most recent forward pass.
    fn backward(&mut self, grad: &Self::Grad) -> Result<()>;

    /// L2 norm over every accumulated parameter gradient.
    fn grad_norm(&self) -> f64;

    fn scale_grads(&mut self, factor: f64);

    /// Rescales gradients so their total norm is at most `max_norm`.
    /// Returns the norm measured before clipping.
    fn clip_grad_norm(&mut self, max_norm: f64) -> f64 {
        let norm = self.grad_norm();
        let coef = max_norm / (norm + 1e-6);
        if coef < 1.0 {
            self.scale_grads(coef);
        }
        norm
    }
}

/// Exposes `(parameter, gradient)` pairs so optimizers can be written once for
/// every model.
pub trait Parameterized {
    fn for_each_param(&mut self, f: &mut dyn FnMut(&mut f64, &mut f64));

    fn param_count(&mut self) -> usize {
        let mut n = 0;
        self.for_each_param(&mut |_, _| n += 1);
        n
    }
}

pub trait Optimizer<M: Model> {
    /// Clears the gradients accumulated by the previous step.
    fn zero_grad(&mut self, model: &mut M);

    fn step(&mut self, model: &mut M) -> Result<()>;
}

/// Scalar loss for one batch plus the gradient `backward` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct LossOutput<G> {
    pub value: f64,
    pub grad: G,
}

impl<G> LossOutput<G> {
    pub fn new(value: f64, grad: G) -> Self {
        LossOutput { value, grad }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Grads {
        grads: Vec<f64>,
        training: bool,
    }

    impl Model for Grads {
        type Grad = ();

        fn is_training(&self) -> bool {
            self.training
        }

        fn set_training(&mut self, training: bool) {
            self.training = training;
        }

        fn backward(&mut self, _grad: &()) -> Result<()> {
            Ok(())
        }

        fn grad_norm(&self) -> f64 {
            self.grads.iter().map(|g| g * g).sum::<f64>().sqrt()
        }

        fn scale_grads(&mut self, factor: f64) {
            self.grads.iter_mut().for_each(|g| *g *= factor);
        }
    }

    #[test]
    fn clip_scales_down_large_gradients() {
        let mut m = Grads { grads: vec![3.0, 4.0], training: true };
        let norm = m.clip_grad_norm(1.0);
        assert_eq!(norm, 5.0);
        assert!((m.grad_norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn clip_leaves_small_gradients_alone() {
        let mut m = Grads { grads: vec![0.3, 0.4], training: true };
        m.clip_grad_norm(1.0);
        assert_eq!(m.grads, vec![0.3, 0.4]);
    }
}
