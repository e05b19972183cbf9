//! Fully connected layer implementation
//!
//! Affine transform followed by ReLU, trained by immediate per-weight
//! gradient descent during the backward pass.

use crate::layers::{Layer, LayerData};
use crate::utils::SimpleRng;

/// Slope used on the backward path for non-positive pre-activations.
const LEAK: f64 = 0.01;

/// Fully connected layer with a seeded-Gaussian weight matrix.
///
/// Forward: `z[j] = sum_i x[i] * w[i][j]`, output `max(0, z[j])`.
///
/// The forward activation is a hard ReLU while the backward derivative uses a
/// leaky slope of 0.01 for non-positive pre-activations; the asymmetry is
/// load-bearing for trained behavior and both sides are kept exactly as-is.
///
/// # Example
///
/// ```
/// use convnet::layers::{FullyConnectedLayer, Layer};
///
/// let layer = FullyConnectedLayer::new(128, 10, 42, 0.1);
/// assert_eq!(layer.output_elements(), 10);
/// ```
pub struct FullyConnectedLayer {
    in_length: usize,
    out_length: usize,
    learning_rate: f64,
    // Row-major in_length x out_length.
    weights: Vec<Vec<f64>>,
    last_input: Option<Vec<f64>>,
    last_pre_activation: Option<Vec<f64>>,
}

impl FullyConnectedLayer {
    /// Create a new FullyConnectedLayer.
    ///
    /// Every weight is drawn independently from a seeded standard-normal
    /// distribution, so the same seed and shape reproduce the same matrix.
    pub fn new(in_length: usize, out_length: usize, seed: u64, learning_rate: f64) -> Self {
        let mut rng = SimpleRng::new(seed);
        let weights = (0..in_length)
            .map(|_| (0..out_length).map(|_| rng.next_gaussian()).collect())
            .collect();

        Self {
            in_length,
            out_length,
            learning_rate,
            weights,
            last_input: None,
            last_pre_activation: None,
        }
    }

    /// Affine transform plus hard ReLU; caches input and pre-activation.
    pub fn forward_pass(&mut self, input: Vec<f64>) -> Vec<f64> {
        assert_eq!(
            input.len(),
            self.in_length,
            "fully connected input has length {}, expected {}",
            input.len(),
            self.in_length
        );

        let mut z = vec![0.0; self.out_length];
        for (i, &x) in input.iter().enumerate() {
            for (j, zj) in z.iter_mut().enumerate() {
                *zj += x * self.weights[i][j];
            }
        }

        let output = z.iter().map(|&zj| relu(zj)).collect();
        self.last_input = Some(input);
        self.last_pre_activation = Some(z);
        output
    }

    /// Update every weight in place and return the input gradient.
    ///
    /// For each (k, j) pair the weight gradient is
    /// `dLdO[j] * relu'(z[j]) * x[k]`; the input gradient accumulates
    /// `dLdO[j] * relu'(z[j]) * w[k][j]` using the weight value as it stood
    /// before this layer's own update. Shapes are validated before any weight
    /// is touched, so a contract violation never leaves the matrix partially
    /// updated.
    pub fn backward_pass(&mut self, grad: &[f64]) -> Vec<f64> {
        assert_eq!(
            grad.len(),
            self.out_length,
            "fully connected gradient has length {}, expected {}",
            grad.len(),
            self.out_length
        );
        let last_input = self
            .last_input
            .take()
            .expect("backward called before any forward pass");
        let last_z = self
            .last_pre_activation
            .take()
            .expect("backward called before any forward pass");

        let mut grad_input = vec![0.0; self.in_length];

        for (k, &x) in last_input.iter().enumerate() {
            let mut sum = 0.0;

            for j in 0..self.out_length {
                let d_out_d_z = relu_derivative(last_z[j]);
                let d_z_d_x = self.weights[k][j];

                let weight_gradient = grad[j] * d_out_d_z * x;
                self.weights[k][j] -= self.learning_rate * weight_gradient;

                sum += grad[j] * d_out_d_z * d_z_d_x;
            }

            grad_input[k] = sum;
        }

        grad_input
    }

    /// Read-only view of the weight matrix.
    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }
}

fn relu(input: f64) -> f64 {
    if input <= 0.0 {
        0.0
    } else {
        input
    }
}

fn relu_derivative(input: f64) -> f64 {
    if input <= 0.0 {
        LEAK
    } else {
        1.0
    }
}

impl Layer for FullyConnectedLayer {
    fn forward(&mut self, input: LayerData) -> LayerData {
        LayerData::Vector(self.forward_pass(input.into_vector()))
    }

    fn backward(&mut self, grad: LayerData) -> LayerData {
        LayerData::Vector(self.backward_pass(&grad.into_vector()))
    }

    // Spatial shape queries are not meaningful for a flat-vector layer.
    fn output_channels(&self) -> usize {
        0
    }

    fn output_rows(&self) -> usize {
        0
    }

    fn output_cols(&self) -> usize {
        0
    }

    fn output_elements(&self) -> usize {
        self.out_length
    }

    fn parameter_count(&self) -> usize {
        self.in_length * self.out_length
    }
}
