use rand::Rng;

use crate::error::{Result, TrainError};
use crate::model::traits::{Model, Parameterized};

/// Dense affine map `y = x·W + b`, trained through the `Model` trait.
///
/// `forward` caches the batch inputs while gradient tracking is on so that
/// `backward` only needs the output-space gradient. Gradients accumulate
/// until an optimizer zeroes them.
#[derive(Debug, Clone)]
pub struct LinearModel {
    pub input_size: usize,
    pub output_size: usize,
    /// Row-major, `input_size × output_size`.
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
    weight_grads: Vec<f64>,
    bias_grads: Vec<f64>,
    cached_inputs: Option<Vec<Vec<f64>>>,
    grad_enabled: bool,
    training: bool,
}

impl LinearModel {
    /// Weights and biases drawn uniformly from [-1, 1).
    pub fn new(input_size: usize, output_size: usize) -> LinearModel {
        let mut rng = rand::thread_rng();
        let weights = (0..input_size * output_size)
            .map(|_| rng.gen::<f64>() * 2.0 - 1.0)
            .collect();
        let biases = (0..output_size)
            .map(|_| rng.gen::<f64>() * 2.0 - 1.0)
            .collect();
        LinearModel::from_parts(input_size, output_size, weights, biases)
    }

    pub fn zeros(input_size: usize, output_size: usize) -> LinearModel {
        LinearModel::from_parts(
            input_size,
            output_size,
            vec![0.0; input_size * output_size],
            vec![0.0; output_size],
        )
    }

    fn from_parts(
        input_size: usize,
        output_size: usize,
        weights: Vec<f64>,
        biases: Vec<f64>,
    ) -> LinearModel {
        LinearModel {
            input_size,
            output_size,
            weight_grads: vec![0.0; weights.len()],
            bias_grads: vec![0.0; biases.len()],
            weights,
            biases,
            cached_inputs: None,
            grad_enabled: true,
            training: true,
        }
    }

    pub fn weight(&self, input: usize, output: usize) -> f64 {
        self.weights[input * self.output_size + output]
    }

    /// Forward pass over a batch of input rows.
    pub fn forward(&mut self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let outputs = inputs
            .iter()
            .map(|x| self.predict(x))
            .collect::<Result<Vec<_>>>()?;
        self.cached_inputs = if self.grad_enabled { Some(inputs.to_vec()) } else { None };
        Ok(outputs)
    }

    /// Single-row inference; never touches the gradient cache.
    pub fn predict(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.input_size {
            return Err(TrainError::computation(format!(
                "expected {} input features, got {}",
                self.input_size,
                x.len()
            )));
        }
        let mut y = self.biases.clone();
        for (i, xi) in x.iter().enumerate() {
            let row = &self.weights[i * self.output_size..(i + 1) * self.output_size];
            for (yj, w) in y.iter_mut().zip(row) {
                *yj += xi * w;
            }
        }
        Ok(y)
    }
}

impl Model for LinearModel {
    /// `∂L/∂y`, one row per sample of the last forward batch.
    type Grad = Vec<Vec<f64>>;

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
        if !enabled {
            self.cached_inputs = None;
        }
    }

    fn backward(&mut self, grad: &Vec<Vec<f64>>) -> Result<()> {
        let inputs = self
            .cached_inputs
            .as_ref()
            .ok_or_else(|| {
                TrainError::computation("backward called without a tracked forward pass")
            })?;
        if inputs.len() != grad.len() {
            return Err(TrainError::computation(format!(
                "gradient has {} rows but the forward batch had {}",
                grad.len(),
                inputs.len()
            )));
        }

        let out = self.output_size;
        for (x, g) in inputs.iter().zip(grad) {
            if g.len() != out {
                return Err(TrainError::computation(format!(
                    "expected {} output gradients, got {}",
                    out,
                    g.len()
                )));
            }
            for (i, xi) in x.iter().enumerate() {
                for (j, gj) in g.iter().enumerate() {
                    self.weight_grads[i * out + j] += xi * gj;
                }
            }
            for (bg, gj) in self.bias_grads.iter_mut().zip(g) {
                *bg += gj;
            }
        }
        Ok(())
    }

    fn grad_norm(&self) -> f64 {
        self.weight_grads
            .iter()
            .chain(&self.bias_grads)
            .map(|g| g * g)
            .sum::<f64>()
            .sqrt()
    }

    fn scale_grads(&mut self, factor: f64) {
        self.weight_grads
            .iter_mut()
            .chain(self.bias_grads.iter_mut())
            .for_each(|g| *g *= factor);
    }
}

impl Parameterized for LinearModel {
    fn for_each_param(&mut self, f: &mut dyn FnMut(&mut f64, &mut f64)) {
        for (w, g) in self.weights.iter_mut().zip(self.weight_grads.iter_mut()) {
            f(w, g);
        }
        for (b, g) in self.biases.iter_mut().zip(self.bias_grads.iter_mut()) {
            f(b, g);
        }
    }
}
