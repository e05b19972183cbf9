// Tests for backpropagation through individual layers and whole chains.

use convnet::data::LabeledSample;
use convnet::layers::{ConvolutionLayer, Layer, MaxPoolLayer};
use convnet::network::NetworkBuilder;
use convnet::utils::matrix::zeros;

fn uniform_sample(value: f64, rows: usize, cols: usize, label: usize) -> LabeledSample {
    LabeledSample {
        data: vec![vec![value; cols]; rows],
        label,
    }
}

fn squared_error(output: &[f64], label: usize) -> f64 {
    output
        .iter()
        .enumerate()
        .map(|(i, &score)| {
            let target = if i == label { 1.0 } else { 0.0 };
            (score - target) * (score - target)
        })
        .sum()
}

#[test]
fn test_training_step_reduces_loss() {
    // Seed chosen so the untrained network emits positive scores; the
    // learning rate is small enough that one step does not overshoot.
    let mut builder = NetworkBuilder::new(8, 8, 1.0);
    builder.add_convolution_layer(2, 3, 1, 0.005, 1);
    builder.add_max_pool_layer(2, 2);
    builder.add_fully_connected_layer(3, 0.005, 1);
    let mut net = builder.build();

    let sample = uniform_sample(0.7, 8, 8, 1);
    let before = squared_error(&net.forward(&sample), sample.label);

    net.train(std::slice::from_ref(&sample));

    let after = squared_error(&net.forward(&sample), sample.label);
    assert!(
        after < before,
        "loss did not decrease: {} -> {}",
        before,
        after
    );
}

#[test]
fn test_max_pool_routes_gradient_to_argmax() {
    let mut layer = MaxPoolLayer::new(2, 2, 2, 4, 4);

    // Channel 0 peaks on the main diagonal, channel 1 in the top-left of
    // each window.
    let mut channel0 = zeros(4, 4);
    channel0[0][0] = 1.0;
    channel0[1][3] = 2.0;
    channel0[2][1] = 3.0;
    channel0[3][3] = 4.0;
    let mut channel1 = zeros(4, 4);
    channel1[0][0] = 5.0;
    channel1[0][2] = 6.0;
    channel1[2][0] = 7.0;
    channel1[2][2] = 8.0;

    layer.forward_pass(&vec![channel0, channel1]);

    let grad = vec![
        vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        vec![vec![5.0, 6.0], vec![7.0, 8.0]],
    ];
    let grad_input = layer.backward_pass(&grad);

    // Every gradient value lands exactly on its recorded source.
    assert_eq!(grad_input[0][0][0], 1.0);
    assert_eq!(grad_input[0][1][3], 2.0);
    assert_eq!(grad_input[0][2][1], 3.0);
    assert_eq!(grad_input[0][3][3], 4.0);
    assert_eq!(grad_input[1][0][0], 5.0);
    assert_eq!(grad_input[1][0][2], 6.0);
    assert_eq!(grad_input[1][2][0], 7.0);
    assert_eq!(grad_input[1][2][2], 8.0);

    let mass: f64 = grad_input.iter().flatten().flatten().sum();
    let expected: f64 = grad.iter().flatten().flatten().sum();
    assert_eq!(mass, expected);
}

#[test]
fn test_conv_zero_gradient_is_a_fixed_point() {
    let mut layer = ConvolutionLayer::new(3, 1, 1, 6, 6, 11, 2, 0.1);
    let filters_before: Vec<_> = layer.filters().to_vec();

    layer.forward_pass(vec![vec![vec![0.3; 6]; 6]]);
    let grad_input = layer.backward_pass(&vec![zeros(4, 4); 2]);

    // No error anywhere: filters unchanged, nothing propagated upstream.
    assert_eq!(layer.filters(), filters_before.as_slice());
    assert_eq!(grad_input, vec![zeros(6, 6)]);
}

#[test]
fn test_conv_backward_shapes_match_input() {
    let mut layer = ConvolutionLayer::new(3, 2, 2, 9, 9, 13, 2, 0.01);
    let input = vec![vec![vec![0.5; 9]; 9]; 2];

    let output = layer.forward_pass(input);
    assert_eq!(output.len(), 4);
    assert_eq!(output[0].len(), 4); // (9 - 3) / 2 + 1

    let grad = vec![vec![vec![0.1; 4]; 4]; 4];
    let grad_input = layer.backward_pass(&grad);

    assert_eq!(grad_input.len(), 2);
    assert_eq!(grad_input[0].len(), 9);
    assert_eq!(grad_input[0][0].len(), 9);
}

#[test]
#[should_panic(expected = "max-pool gradient has 1 channels, expected 2")]
fn test_max_pool_gradient_channel_mismatch() {
    let mut layer = MaxPoolLayer::new(2, 2, 2, 4, 4);
    layer.forward_pass(&vec![zeros(4, 4), zeros(4, 4)]);
    layer.backward_pass(&vec![zeros(2, 2)]);
}
