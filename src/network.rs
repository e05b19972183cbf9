//! Network orchestrator
//!
//! This module owns the ordered layer chain and drives per-sample training
//! and evaluation. The chain is an arena of boxed layers walked front-to-back
//! for the forward pass and back-to-front for backpropagation; layers never
//! reference each other directly.

use crate::data::LabeledSample;
use crate::layers::{
    ConvolutionLayer, FullyConnectedLayer, Layer, LayerData, MaxPoolLayer,
};
use crate::utils::matrix::scalar_multiply;

/// A feed-forward network trained sample-by-sample with plain SGD.
///
/// One sample completes its full forward + backward cycle before the next
/// begins: every layer caches per-call state (last input, pooling index map)
/// that the matching backward pass consumes.
pub struct NeuralNetwork {
    layers: Vec<Box<dyn Layer>>,
    scale_factor: f64,
    num_classes: usize,
}

impl NeuralNetwork {
    /// Run one sample through the whole chain and return the class scores.
    pub fn forward(&mut self, sample: &LabeledSample) -> Vec<f64> {
        let scaled = scalar_multiply(&sample.data, 1.0 / self.scale_factor);
        let mut data = LayerData::Tensor(vec![scaled]);

        for layer in &mut self.layers {
            data = layer.forward(data);
        }

        data.into_vector()
    }

    fn backward(&mut self, grad: Vec<f64>) {
        let mut data = LayerData::Vector(grad);
        for layer in self.layers.iter_mut().rev() {
            data = layer.backward(data);
        }
    }

    /// Gradient of the squared error against the one-hot target:
    /// `output - target`.
    fn error_gradient(&self, output: &[f64], label: usize) -> Vec<f64> {
        assert!(
            label < self.num_classes,
            "label {} out of range for {} classes",
            label,
            self.num_classes
        );

        output
            .iter()
            .enumerate()
            .map(|(i, &score)| if i == label { score - 1.0 } else { score })
            .collect()
    }

    /// Train on every sample in order: forward pass, error gradient, backward
    /// pass with in-place weight updates.
    pub fn train(&mut self, samples: &[LabeledSample]) {
        for sample in samples {
            let output = self.forward(sample);
            let grad = self.error_gradient(&output, sample.label);
            self.backward(grad);
        }
    }

    /// Predicted class for one sample: index of the highest score.
    pub fn guess(&mut self, sample: &LabeledSample) -> usize {
        let output = self.forward(sample);

        let mut best = 0;
        for (i, &score) in output.iter().enumerate() {
            if score > output[best] {
                best = i;
            }
        }
        best
    }

    /// Fraction of samples whose predicted class matches the label.
    pub fn test(&mut self, samples: &[LabeledSample]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let correct = samples
            .iter()
            .filter(|sample| self.guess(sample) == sample.label)
            .count();
        correct as f32 / samples.len() as f32
    }

    /// Total trainable parameter count across the chain.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    /// Number of layers in the chain.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

/// Builder that assembles a layer chain, deriving each layer's input shape
/// from the previous layer's shape queries.
///
/// # Example
///
/// ```
/// use convnet::network::NetworkBuilder;
///
/// let mut builder = NetworkBuilder::new(28, 28, 256.0);
/// builder.add_convolution_layer(8, 5, 1, 0.1, 123);
/// builder.add_max_pool_layer(2, 2);
/// builder.add_fully_connected_layer(10, 0.1, 123);
/// let net = builder.build();
/// assert_eq!(net.layer_count(), 3);
/// ```
pub struct NetworkBuilder {
    layers: Vec<Box<dyn Layer>>,
    input_rows: usize,
    input_cols: usize,
    scale_factor: f64,
}

impl NetworkBuilder {
    /// Start a chain for single-channel images of `input_rows` x `input_cols`
    /// whose pixel values are divided by `scale_factor` before the first
    /// layer.
    pub fn new(input_rows: usize, input_cols: usize, scale_factor: f64) -> Self {
        assert!(scale_factor > 0.0, "scale factor must be positive");
        Self {
            layers: Vec::new(),
            input_rows,
            input_cols,
            scale_factor,
        }
    }

    // Shape of the data entering the next layer: the image for an empty
    // chain, otherwise the previous layer's output shape.
    fn incoming_shape(&self) -> (usize, usize, usize) {
        match self.layers.last() {
            Some(prev) => (prev.output_channels(), prev.output_rows(), prev.output_cols()),
            None => (1, self.input_rows, self.input_cols),
        }
    }

    fn incoming_elements(&self) -> usize {
        match self.layers.last() {
            Some(prev) => prev.output_elements(),
            None => self.input_rows * self.input_cols,
        }
    }

    /// Append a convolution layer with `num_filters` kernels of
    /// `kernel_size` x `kernel_size` at `stride`.
    pub fn add_convolution_layer(
        &mut self,
        num_filters: usize,
        kernel_size: usize,
        stride: usize,
        learning_rate: f64,
        seed: u64,
    ) {
        let (channels, rows, cols) = self.incoming_shape();
        self.layers.push(Box::new(ConvolutionLayer::new(
            kernel_size,
            stride,
            channels,
            rows,
            cols,
            seed,
            num_filters,
            learning_rate,
        )));
    }

    /// Append a max-pool layer with the given window and stride.
    pub fn add_max_pool_layer(&mut self, window_size: usize, stride: usize) {
        let (channels, rows, cols) = self.incoming_shape();
        self.layers.push(Box::new(MaxPoolLayer::new(
            stride,
            window_size,
            channels,
            rows,
            cols,
        )));
    }

    /// Append a fully connected layer producing `out_length` scores.
    pub fn add_fully_connected_layer(
        &mut self,
        out_length: usize,
        learning_rate: f64,
        seed: u64,
    ) {
        let in_length = self.incoming_elements();
        self.layers.push(Box::new(FullyConnectedLayer::new(
            in_length,
            out_length,
            seed,
            learning_rate,
        )));
    }

    /// Finish the chain.
    ///
    /// # Panics
    ///
    /// Panics if the chain is empty or the terminal layer does not produce a
    /// flat score vector.
    pub fn build(self) -> NeuralNetwork {
        let last = self
            .layers
            .last()
            .expect("cannot build a network with no layers");
        assert_eq!(
            last.output_channels(),
            0,
            "terminal layer must be fully connected to produce a score vector"
        );
        let num_classes = last.output_elements();

        NeuralNetwork {
            layers: self.layers,
            scale_factor: self.scale_factor,
            num_classes,
        }
    }
}
