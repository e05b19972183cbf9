// End-to-end tests: a small network learning to separate two patterns, and
// the JSON configuration path building a trainable network.

use convnet::config::{build_network, load_config};
use convnet::data::LabeledSample;
use convnet::network::NetworkBuilder;
use std::io::Write;
use tempfile::NamedTempFile;

// Label 0: bright top half. Label 1: bright bottom half.
fn pattern(top: bool) -> LabeledSample {
    let mut data = vec![vec![0.0; 8]; 8];
    let rows = if top { 0..4 } else { 4..8 };
    for r in rows {
        for c in 0..8 {
            data[r][c] = 1.0;
        }
    }
    LabeledSample {
        data,
        label: usize::from(!top),
    }
}

#[test]
fn test_learns_to_separate_two_patterns() {
    // Seed chosen so the initial filters respond to both patterns; hard ReLU
    // with no bias can otherwise leave the network dead from the start.
    let mut builder = NetworkBuilder::new(8, 8, 1.0);
    builder.add_convolution_layer(2, 3, 1, 0.01, 6);
    builder.add_max_pool_layer(2, 2);
    builder.add_fully_connected_layer(3, 0.01, 6);
    let mut net = builder.build();

    let samples = vec![pattern(true), pattern(false)];
    for _ in 0..30 {
        net.train(&samples);
    }

    assert_eq!(net.guess(&samples[0]), 0);
    assert_eq!(net.guess(&samples[1]), 1);
    assert_eq!(net.test(&samples), 1.0);
}

#[test]
fn test_config_round_trip_builds_trainable_network() {
    let json_content = r#"{
  "input_rows": 8,
  "input_cols": 8,
  "scale_factor": 1.0,
  "seed": 6,
  "learning_rate": 0.01,
  "layers": [
    { "layer_type": "convolution", "num_filters": 2, "kernel_size": 3 },
    { "layer_type": "max_pool", "window_size": 2, "stride": 2 },
    { "layer_type": "fully_connected", "out_length": 3 }
  ]
}"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(json_content.as_bytes()).unwrap();

    let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
    let mut net = build_network(&config).unwrap();
    assert_eq!(net.layer_count(), 3);

    // The configured network matches one assembled by hand with the same
    // seed and shapes.
    let mut builder = NetworkBuilder::new(8, 8, 1.0);
    builder.add_convolution_layer(2, 3, 1, 0.01, 6);
    builder.add_max_pool_layer(2, 2);
    builder.add_fully_connected_layer(3, 0.01, 6);
    let mut reference = builder.build();

    let sample = pattern(true);
    assert_eq!(net.forward(&sample), reference.forward(&sample));

    net.train(std::slice::from_ref(&sample));
    reference.train(std::slice::from_ref(&sample));
    assert_eq!(net.forward(&sample), reference.forward(&sample));
}
