//! Convolution layer implementation
//!
//! This module provides a ConvolutionLayer that cross-correlates every input
//! channel against a bank of square filters. All arithmetic is explicit loops
//! over `f64` matrices; the backward pass redistributes gradients with a full
//! convolution against the 180-degree-rotated, stride-spaced output gradient.

use crate::layers::{Layer, LayerData};
use crate::utils::matrix::{
    add, flip_horizontally, flip_vertically, scalar_multiply, vector_to_tensor, zeros, Matrix,
    Tensor,
};
use crate::utils::SimpleRng;

/// Convolution layer with a learnable filter bank.
///
/// Forward propagation is a valid (no padding) cross-correlation of each input
/// channel against each filter at the configured stride, so the output holds
/// `in_channels * num_filters` channels, input channel outer, filter inner.
///
/// Filters are square, drawn once from a seeded standard-normal distribution:
/// two layers built with the same seed and shape hold identical filter banks.
///
/// # Example
///
/// ```
/// use convnet::layers::{ConvolutionLayer, Layer};
///
/// // 8 filters of 5x5 over a single 28x28 channel, stride 1
/// let layer = ConvolutionLayer::new(5, 1, 1, 28, 28, 123, 8, 0.1);
/// assert_eq!(layer.output_channels(), 8);
/// assert_eq!(layer.output_rows(), 24);
/// ```
pub struct ConvolutionLayer {
    kernel_size: usize,
    stride: usize,
    in_channels: usize,
    in_rows: usize,
    in_cols: usize,
    num_filters: usize,
    learning_rate: f64,
    filters: Vec<Matrix>,
    last_input: Option<Tensor>,
}

impl ConvolutionLayer {
    /// Create a new ConvolutionLayer with a seeded Gaussian filter bank.
    ///
    /// # Arguments
    ///
    /// * `kernel_size` - Side of each square filter
    /// * `stride` - Step between successive filter placements
    /// * `in_channels` - Number of input channels
    /// * `in_rows` / `in_cols` - Spatial shape of each input channel
    /// * `seed` - Seed for the filter initialisation
    /// * `num_filters` - Number of filters in the bank
    /// * `learning_rate` - Step size for the in-place filter updates
    ///
    /// # Panics
    ///
    /// Panics if the kernel does not fit the input or if the stride does not
    /// evenly tile it, i.e. `(in_dim - kernel_size) % stride != 0`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel_size: usize,
        stride: usize,
        in_channels: usize,
        in_rows: usize,
        in_cols: usize,
        seed: u64,
        num_filters: usize,
        learning_rate: f64,
    ) -> Self {
        assert!(stride > 0, "stride must be positive");
        assert!(
            kernel_size <= in_rows && kernel_size <= in_cols,
            "kernel {}x{} does not fit input {}x{}",
            kernel_size,
            kernel_size,
            in_rows,
            in_cols
        );
        assert!(
            (in_rows - kernel_size) % stride == 0 && (in_cols - kernel_size) % stride == 0,
            "stride {} does not evenly tile input {}x{} with kernel {}",
            stride,
            in_rows,
            in_cols,
            kernel_size
        );

        let mut rng = SimpleRng::new(seed);
        let filters = (0..num_filters)
            .map(|_| {
                (0..kernel_size)
                    .map(|_| (0..kernel_size).map(|_| rng.next_gaussian()).collect())
                    .collect()
            })
            .collect();

        Self {
            kernel_size,
            stride,
            in_channels,
            in_rows,
            in_cols,
            num_filters,
            learning_rate,
            filters,
            last_input: None,
        }
    }

    /// Run the forward pass on a channel list.
    ///
    /// Caches the input for the matching backward call and returns one output
    /// channel per (input channel, filter) pair, input channel outer.
    pub fn forward_pass(&mut self, input: Tensor) -> Tensor {
        self.check_tensor_shape(&input, self.in_channels, self.in_rows, self.in_cols, "input");

        let mut output = Vec::with_capacity(self.in_channels * self.num_filters);
        for channel in &input {
            for filter in &self.filters {
                output.push(convolve(channel, filter, self.stride));
            }
        }

        self.last_input = Some(input);
        output
    }

    /// Reinsert zero gaps into a strided gradient.
    ///
    /// Restores the pre-subsampling resolution by placing entry (i, j) at
    /// (i * stride, j * stride); a no-op for stride 1.
    fn space_array(&self, input: &Matrix) -> Matrix {
        if self.stride == 1 {
            return input.clone();
        }

        let out_rows = (input.len() - 1) * self.stride + 1;
        let out_cols = (input[0].len() - 1) * self.stride + 1;
        let mut output = zeros(out_rows, out_cols);

        for (i, row) in input.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                output[i * self.stride][j * self.stride] = value;
            }
        }

        output
    }

    /// Backward pass over a gradient tensor shaped like the last forward
    /// output.
    ///
    /// Accumulates `-learning_rate * dL/dFilter` per filter across all input
    /// channels, applies the accumulated deltas to the filter bank in place,
    /// and returns the per-input-channel gradient.
    pub fn backward_pass(&mut self, grad: &Tensor) -> Tensor {
        let last_input = self
            .last_input
            .as_ref()
            .expect("backward called before any forward pass");
        self.check_tensor_shape(
            grad,
            self.output_channels(),
            self.output_rows(),
            self.output_cols(),
            "gradient",
        );

        let mut filter_deltas: Vec<Matrix> = (0..self.num_filters)
            .map(|_| zeros(self.kernel_size, self.kernel_size))
            .collect();
        let mut grad_input = Vec::with_capacity(self.in_channels);

        for (i, input_channel) in last_input.iter().enumerate() {
            let mut error_for_input = zeros(self.in_rows, self.in_cols);

            for (f, filter) in self.filters.iter().enumerate() {
                let error = &grad[i * self.num_filters + f];
                let spaced_error = self.space_array(error);

                let dldf = convolve(input_channel, &spaced_error, 1);
                filter_deltas[f] = add(
                    &filter_deltas[f],
                    &scalar_multiply(&dldf, -self.learning_rate),
                );

                let flipped_error = flip_horizontally(&flip_vertically(&spaced_error));
                error_for_input = add(&error_for_input, &full_convolve(filter, &flipped_error));
            }

            grad_input.push(error_for_input);
        }

        for (filter, delta) in self.filters.iter_mut().zip(&filter_deltas) {
            *filter = add(delta, filter);
        }

        grad_input
    }

    /// Read-only view of the filter bank.
    pub fn filters(&self) -> &[Matrix] {
        &self.filters
    }

    fn check_tensor_shape(
        &self,
        tensor: &Tensor,
        channels: usize,
        rows: usize,
        cols: usize,
        what: &str,
    ) {
        assert_eq!(
            tensor.len(),
            channels,
            "convolution {} has {} channels, expected {}",
            what,
            tensor.len(),
            channels
        );
        for channel in tensor {
            assert!(
                channel.len() == rows && channel.iter().all(|r| r.len() == cols),
                "convolution {} channel is {}x{}, expected {}x{}",
                what,
                channel.len(),
                channel.first().map_or(0, Vec::len),
                rows,
                cols
            );
        }
    }
}

/// Valid cross-correlation of `input` against `filter` at `stride`.
///
/// The output at (i, j) is the sum over the kernel footprint of
/// `filter[x][y] * input[i*stride + x][j*stride + y]`; no padding is applied.
pub(crate) fn convolve(input: &Matrix, filter: &Matrix, stride: usize) -> Matrix {
    let in_rows = input.len();
    let in_cols = input[0].len();
    let f_rows = filter.len();
    let f_cols = filter[0].len();

    let out_rows = (in_rows - f_rows) / stride + 1;
    let out_cols = (in_cols - f_cols) / stride + 1;
    let mut output = zeros(out_rows, out_cols);

    let mut out_row = 0;
    let mut i = 0;
    while i + f_rows <= in_rows {
        let mut out_col = 0;
        let mut j = 0;
        while j + f_cols <= in_cols {
            let mut sum = 0.0;
            for x in 0..f_rows {
                for y in 0..f_cols {
                    sum += filter[x][y] * input[i + x][j + y];
                }
            }
            output[out_row][out_col] = sum;
            out_col += 1;
            j += stride;
        }
        out_row += 1;
        i += stride;
    }

    output
}

/// Full convolution: correlation extended to every kernel/input overlap.
///
/// The kernel slides from one-past the top-left corner to one-before the
/// bottom-right, and any tap landing outside the input contributes zero
/// (implicit zero padding), so the output is
/// `(in_rows + f_rows - 1) x (in_cols + f_cols - 1)`. Used to redistribute
/// output gradients to every input position that influenced them, including
/// edge positions only partially covered by the kernel.
pub(crate) fn full_convolve(input: &Matrix, filter: &Matrix) -> Matrix {
    let in_rows = input.len() as isize;
    let in_cols = input[0].len() as isize;
    let f_rows = filter.len() as isize;
    let f_cols = filter[0].len() as isize;

    let out_rows = (in_rows + f_rows - 1) as usize;
    let out_cols = (in_cols + f_cols - 1) as usize;
    let mut output = zeros(out_rows, out_cols);

    let mut out_row = 0;
    for i in (1 - f_rows)..in_rows {
        let mut out_col = 0;
        for j in (1 - f_cols)..in_cols {
            let mut sum = 0.0;
            for x in 0..f_rows {
                for y in 0..f_cols {
                    let input_row = i + x;
                    let input_col = j + y;
                    if input_row >= 0 && input_col >= 0 && input_row < in_rows && input_col < in_cols
                    {
                        sum += filter[x as usize][y as usize]
                            * input[input_row as usize][input_col as usize];
                    }
                }
            }
            output[out_row][out_col] = sum;
            out_col += 1;
        }
        out_row += 1;
    }

    output
}

impl Layer for ConvolutionLayer {
    fn forward(&mut self, input: LayerData) -> LayerData {
        let tensor = match input {
            LayerData::Tensor(tensor) => tensor,
            LayerData::Vector(vector) => {
                vector_to_tensor(&vector, self.in_channels, self.in_rows, self.in_cols)
            }
        };
        LayerData::Tensor(self.forward_pass(tensor))
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
        self.num_filters * self.in_channels
    }

    fn output_rows(&self) -> usize {
        (self.in_rows - self.kernel_size) / self.stride + 1
    }

    fn output_cols(&self) -> usize {
        (self.in_cols - self.kernel_size) / self.stride + 1
    }

    fn output_elements(&self) -> usize {
        self.output_channels() * self.output_rows() * self.output_cols()
    }

    fn parameter_count(&self) -> usize {
        self.num_filters * self.kernel_size * self.kernel_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_initialization() {
        let layer1 = ConvolutionLayer::new(3, 1, 1, 8, 8, 12345, 4, 0.1);
        let layer2 = ConvolutionLayer::new(3, 1, 1, 8, 8, 12345, 4, 0.1);

        assert_eq!(layer1.filters(), layer2.filters());
    }

    #[test]
    fn test_output_shape_queries() {
        let layer = ConvolutionLayer::new(3, 2, 2, 9, 7, 1, 4, 0.1);

        assert_eq!(layer.output_channels(), 8); // 4 filters x 2 channels
        assert_eq!(layer.output_rows(), 4); // (9 - 3) / 2 + 1
        assert_eq!(layer.output_cols(), 3); // (7 - 3) / 2 + 1
        assert_eq!(layer.output_elements(), 8 * 4 * 3);
        assert_eq!(layer.parameter_count(), 4 * 9);
    }

    #[test]
    #[should_panic(expected = "does not evenly tile")]
    fn test_invalid_stride_rejected() {
        // (8 - 3) % 2 != 0
        ConvolutionLayer::new(3, 2, 1, 8, 8, 1, 1, 0.1);
    }

    #[test]
    fn test_convolve_known_values() {
        let input = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];
        let filter = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        // Each output is the sum of the main diagonal of its 2x2 window.
        let output = convolve(&input, &filter, 1);
        assert_eq!(output, vec![vec![6.0, 8.0], vec![12.0, 14.0]]);
    }

    #[test]
    fn test_convolve_stride_two() {
        let input = vec![
            vec![1.0, 0.0, 2.0, 0.0, 3.0],
            vec![0.0, 0.0, 0.0, 0.0, 0.0],
            vec![4.0, 0.0, 5.0, 0.0, 6.0],
            vec![0.0, 0.0, 0.0, 0.0, 0.0],
            vec![7.0, 0.0, 8.0, 0.0, 9.0],
        ];
        let filter = vec![vec![1.0]];

        let output = convolve(&input, &filter, 2);
        assert_eq!(
            output,
            vec![
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, 6.0],
                vec![7.0, 8.0, 9.0],
            ]
        );
    }

    #[test]
    fn test_space_array_round_trip() {
        let layer = ConvolutionLayer::new(3, 2, 1, 9, 9, 1, 1, 0.1);
        let grad = vec![vec![1.0, 2.0], vec![3.0, 4.0]];

        let spaced = layer.space_array(&grad);
        assert_eq!(spaced.len(), 3);
        assert_eq!(spaced[0], vec![1.0, 0.0, 2.0]);
        assert_eq!(spaced[1], vec![0.0, 0.0, 0.0]);
        assert_eq!(spaced[2], vec![3.0, 0.0, 4.0]);

        // A stride-1 pick of every stride-th entry recovers the original.
        let recovered = convolve(&spaced, &vec![vec![1.0]], 2);
        assert_eq!(recovered, grad);
    }

    #[test]
    fn test_space_array_identity_for_stride_one() {
        let layer = ConvolutionLayer::new(2, 1, 1, 4, 4, 1, 1, 0.1);
        let grad = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(layer.space_array(&grad), grad);
    }

    #[test]
    fn test_full_convolve_single_cell() {
        // Every placement of the 3x3 kernel over a 1x1 input has exactly one
        // in-bounds tap, so all nine outputs equal the input value.
        let input = vec![vec![2.5]];
        let filter = vec![vec![1.0; 3]; 3];

        let output = full_convolve(&input, &filter);
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].len(), 3);
        for row in &output {
            for &value in row {
                assert_eq!(value, 2.5);
            }
        }
    }

    #[test]
    fn test_forward_output_channel_order() {
        // Two channels, two filters: output must be ordered
        // (c0 f0, c0 f1, c1 f0, c1 f1).
        let mut layer = ConvolutionLayer::new(1, 1, 2, 1, 1, 9, 2, 0.1);
        let f0 = layer.filters()[0][0][0];
        let f1 = layer.filters()[1][0][0];

        let input = vec![vec![vec![1.0]], vec![vec![10.0]]];
        let output = layer.forward_pass(input);

        assert_eq!(output.len(), 4);
        assert_eq!(output[0][0][0], f0);
        assert_eq!(output[1][0][0], f1);
        assert_eq!(output[2][0][0], 10.0 * f0);
        assert_eq!(output[3][0][0], 10.0 * f1);
    }

    #[test]
    fn test_all_ones_filter_scenario() {
        // 4x4 input, one 2x2 all-ones filter, stride 1: each forward cell is
        // the sum of its 2x2 window; an all-ones output gradient yields a
        // filter gradient of window-aligned input sums and an input gradient
        // equal to the number of windows covering each position.
        let mut layer = ConvolutionLayer::new(2, 1, 1, 4, 4, 1, 1, 0.01);
        layer.filters = vec![vec![vec![1.0; 2]; 2]];

        let input: Matrix = (0..4)
            .map(|r| (0..4).map(|c| (r * 4 + c + 1) as f64).collect())
            .collect();
        let output = layer.forward_pass(vec![input]);

        assert_eq!(
            output[0],
            vec![
                vec![14.0, 18.0, 22.0],
                vec![30.0, 34.0, 38.0],
                vec![46.0, 50.0, 54.0],
            ]
        );

        let grad = vec![vec![vec![1.0; 3]; 3]];
        let grad_input = layer.backward_pass(&grad);

        // dL/dF[x][y] = sum of input over the 3x3 block starting at (x, y),
        // applied as filter -= learning_rate * dL/dF.
        let expected_dldf = [[54.0, 63.0], [90.0, 99.0]];
        for x in 0..2 {
            for y in 0..2 {
                let expected = 1.0 - 0.01 * expected_dldf[x][y];
                assert!((layer.filters[0][x][y] - expected).abs() < 1e-12);
            }
        }

        // Corner positions sit under exactly 1 window, edges under 2, the
        // center under 4.
        let expected_grad = [
            [1.0, 2.0, 2.0, 1.0],
            [2.0, 4.0, 4.0, 2.0],
            [2.0, 4.0, 4.0, 2.0],
            [1.0, 2.0, 2.0, 1.0],
        ];
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(grad_input[0][r][c], expected_grad[r][c]);
            }
        }
    }

    #[test]
    #[should_panic(expected = "convolution gradient has 3 channels, expected 2")]
    fn test_backward_wrong_channel_count() {
        let mut layer = ConvolutionLayer::new(2, 1, 1, 4, 4, 7, 2, 0.1);
        layer.forward_pass(vec![zeros(4, 4)]);
        layer.backward_pass(&vec![zeros(3, 3); 3]);
    }
}
