use crate::error::{Result, TrainError};
use crate::model::traits::{Model, Optimizer, Parameterized};

/// Stochastic gradient descent with optional classical momentum.
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: Vec<f64>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, velocity: Vec::new() }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Sgd {
        self.momentum = momentum;
        self
    }
}

impl<M: Model + Parameterized> Optimizer<M> for Sgd {
    fn zero_grad(&mut self, model: &mut M) {
        model.for_each_param(&mut |_, g| *g = 0.0);
    }

    /// Applies one update `p -= lr * v`, where `v = momentum * v + grad`.
    fn step(&mut self, model: &mut M) -> Result<()> {
        let mut non_finite = false;
        model.for_each_param(&mut |_, g| non_finite |= !g.is_finite());
        if non_finite {
            return Err(TrainError::computation("non-finite gradient in optimizer step"));
        }

        let lr = self.learning_rate;
        let momentum = self.momentum;
        let velocity = &mut self.velocity;
        let mut idx = 0;

        model.for_each_param(&mut |p, g| {
            if velocity.len() <= idx {
                velocity.push(0.0);
            }
            let v = momentum * velocity[idx] + *g;
            velocity[idx] = v;
            *p -= lr * v;
            idx += 1;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearModel;
    use approx::assert_abs_diff_eq;

    #[test]
    fn step_moves_against_the_gradient() {
        let mut model = LinearModel::zeros(1, 1);
        model.forward(&[vec![2.0]]).unwrap();
        model.backward(&vec![vec![1.0]]).unwrap();

        let mut opt = Sgd::new(0.1);
        opt.step(&mut model).unwrap();
        assert_abs_diff_eq!(model.weight(0, 0), -0.2);
        assert_abs_diff_eq!(model.biases[0], -0.1);
    }

    #[test]
    fn zero_grad_clears_gradients() {
        let mut model = LinearModel::zeros(2, 1);
        model.forward(&[vec![1.0, 1.0]]).unwrap();
        model.backward(&vec![vec![3.0]]).unwrap();
        assert!(model.grad_norm() > 0.0);

        let mut opt = Sgd::new(0.1);
        Optimizer::<LinearModel>::zero_grad(&mut opt, &mut model);
        assert_eq!(model.grad_norm(), 0.0);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut model = LinearModel::zeros(1, 1);
        let mut opt = Sgd::new(1.0).with_momentum(0.5);
        for _ in 0..2 {
            Optimizer::<LinearModel>::zero_grad(&mut opt, &mut model);
            model.forward(&[vec![0.0]]).unwrap();
            model.backward(&vec![vec![1.0]]).unwrap();
            opt.step(&mut model).unwrap();
        }
        // bias velocity: 1.0 then 0.5 * 1.0 + 1.0
        assert_abs_diff_eq!(model.biases[0], -2.5);
    }

    #[test]
    fn non_finite_gradients_are_rejected() {
        let mut model = LinearModel::zeros(1, 1);
        model.forward(&[vec![1.0]]).unwrap();
        model.backward(&vec![vec![f64::NAN]]).unwrap();
        assert!(Sgd::new(0.1).step(&mut model).is_err());
    }
}
