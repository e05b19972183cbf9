//! Max-pooling layer implementation
//!
//! Downsamples each channel by taking the maximum over a sliding window and
//! records where each maximum came from so the backward pass can route the
//! gradient back to exactly that position (argmax routing).

use crate::layers::{Layer, LayerData};
use crate::utils::matrix::{vector_to_tensor, zeros, Matrix, Tensor};

/// Max-pooling layer; holds no trainable parameters.
///
/// The running maximum for each window starts at 0.0, not negative infinity:
/// a window whose entries are all non-positive yields output 0 with no
/// recorded source. That floor is only valid because upstream activations are
/// non-negative, which is a documented precondition of this layer.
///
/// The per-channel argmax maps are valid only between one forward pass and
/// its matching backward pass; they are overwritten on the next forward call.
pub struct MaxPoolLayer {
    stride: usize,
    window_size: usize,
    in_channels: usize,
    in_rows: usize,
    in_cols: usize,
    // One map per channel: source (row, col) per output cell, None when the
    // window held no strictly positive value.
    last_max_source: Vec<Vec<Vec<Option<(usize, usize)>>>>,
}

impl MaxPoolLayer {
    /// Create a new MaxPoolLayer.
    ///
    /// # Panics
    ///
    /// Panics if the window does not fit the input or the stride does not
    /// evenly tile it.
    pub fn new(
        stride: usize,
        window_size: usize,
        in_channels: usize,
        in_rows: usize,
        in_cols: usize,
    ) -> Self {
        assert!(stride > 0, "stride must be positive");
        assert!(
            window_size <= in_rows && window_size <= in_cols,
            "window {}x{} does not fit input {}x{}",
            window_size,
            window_size,
            in_rows,
            in_cols
        );
        assert!(
            (in_rows - window_size) % stride == 0 && (in_cols - window_size) % stride == 0,
            "stride {} does not evenly tile input {}x{} with window {}",
            stride,
            in_rows,
            in_cols,
            window_size
        );

        Self {
            stride,
            window_size,
            in_channels,
            in_rows,
            in_cols,
            last_max_source: Vec::new(),
        }
    }

    /// Pool every channel, caching the argmax maps for the backward pass.
    pub fn forward_pass(&mut self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.len(),
            self.in_channels,
            "max-pool input has {} channels, expected {}",
            input.len(),
            self.in_channels
        );

        self.last_max_source = Vec::with_capacity(input.len());
        input.iter().map(|channel| self.pool(channel)).collect()
    }

    fn pool(&mut self, input: &Matrix) -> Matrix {
        assert!(
            input.len() == self.in_rows && input.iter().all(|r| r.len() == self.in_cols),
            "max-pool channel is {}x{}, expected {}x{}",
            input.len(),
            input.first().map_or(0, Vec::len),
            self.in_rows,
            self.in_cols
        );

        let out_rows = self.output_rows();
        let out_cols = self.output_cols();
        let mut output = zeros(out_rows, out_cols);
        let mut sources = vec![vec![None; out_cols]; out_rows];

        for r in 0..out_rows {
            for c in 0..out_cols {
                let mut max = 0.0;
                let mut source = None;

                for x in 0..self.window_size {
                    for y in 0..self.window_size {
                        let row = r * self.stride + x;
                        let col = c * self.stride + y;
                        if input[row][col] > max {
                            max = input[row][col];
                            source = Some((row, col));
                        }
                    }
                }

                output[r][c] = max;
                sources[r][c] = source;
            }
        }

        self.last_max_source.push(sources);
        output
    }

    /// Scatter each gradient value back to its recorded argmax position.
    ///
    /// The scatter is additive: an input position recorded by several output
    /// cells receives the sum of their gradients. Output cells with no
    /// recorded source (all-non-positive window) scatter nothing.
    pub fn backward_pass(&self, grad: &Tensor) -> Tensor {
        assert_eq!(
            grad.len(),
            self.last_max_source.len(),
            "max-pool gradient has {} channels, expected {}",
            grad.len(),
            self.last_max_source.len()
        );

        let mut grad_input = Vec::with_capacity(grad.len());

        for (channel_grad, sources) in grad.iter().zip(&self.last_max_source) {
            assert!(
                channel_grad.len() == self.output_rows()
                    && channel_grad.iter().all(|r| r.len() == self.output_cols()),
                "max-pool gradient channel is {}x{}, expected {}x{}",
                channel_grad.len(),
                channel_grad.first().map_or(0, Vec::len),
                self.output_rows(),
                self.output_cols()
            );

            let mut error = zeros(self.in_rows, self.in_cols);
            for (r, row) in channel_grad.iter().enumerate() {
                for (c, &value) in row.iter().enumerate() {
                    if let Some((source_row, source_col)) = sources[r][c] {
                        error[source_row][source_col] += value;
                    }
                }
            }

            grad_input.push(error);
        }

        grad_input
    }
}

impl Layer for MaxPoolLayer {
    fn forward(&mut self, input: LayerData) -> LayerData {
        let tensor = match input {
            LayerData::Tensor(tensor) => tensor,
            LayerData::Vector(vector) => {
                vector_to_tensor(&vector, self.in_channels, self.in_rows, self.in_cols)
            }
        };
        LayerData::Tensor(self.forward_pass(&tensor))
    }

    fn backward(&mut self, grad: LayerData) -> LayerData {
        let tensor = match grad {
            LayerData::Tensor(tensor) => tensor,
            LayerData::Vector(vector) => vector_to_tensor(
                &vector,
                self.output_channels(),
                self.output_rows(),
                self.output_cols(),
            ),
        };
        LayerData::Tensor(self.backward_pass(&tensor))
    }

    fn output_channels(&self) -> usize {
        self.in_channels
    }

    fn output_rows(&self) -> usize {
        (self.in_rows - self.window_size) / self.stride + 1
    }

    fn output_cols(&self) -> usize {
        (self.in_cols - self.window_size) / self.stride + 1
    }

    fn output_elements(&self) -> usize {
        self.in_channels * self.output_rows() * self.output_cols()
    }

    fn parameter_count(&self) -> usize {
        0
    }
}
