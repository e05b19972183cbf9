// mnist_cnn.rs
// Train a small CNN on MNIST read from CSV files (label, then 784 row-major
// pixels per line).
//
// Expected files (override with the first two command line arguments):
//   ./data/mnist_train.csv
//   ./data/mnist_test.csv
//
// Output:
//   - prints test accuracy after every epoch

use convnet::data::read_csv;
use convnet::network::NetworkBuilder;
use convnet::utils::SimpleRng;
use std::env;
use std::process;

// MNIST images are 28x28 grayscale.
const IMG_H: usize = 28;
const IMG_W: usize = 28;
const NUM_CLASSES: usize = 10;

// Topology: 1x28x28 -> conv(8 filters, 5x5) -> 2x2 maxpool -> FC(10).
const NUM_FILTERS: usize = 8;
const KERNEL: usize = 5;
const POOL: usize = 2;

// Training hyperparameters.
const SEED: u64 = 123;
const LEARNING_RATE: f64 = 0.1;
const SCALE_FACTOR: f64 = 256.0 * 100.0;
const EPOCHS: usize = 3;

fn main() {
    let args: Vec<String> = env::args().collect();
    let train_path = args.get(1).map_or("data/mnist_train.csv", String::as_str);
    let test_path = args.get(2).map_or("data/mnist_test.csv", String::as_str);

    println!("Loading data....");
    let mut training = read_csv(train_path, IMG_H, IMG_W).unwrap_or_else(|e| {
        eprintln!("Could not read {}: {}", train_path, e);
        process::exit(1);
    });
    let test = read_csv(test_path, IMG_H, IMG_W).unwrap_or_else(|e| {
        eprintln!("Could not read {}: {}", test_path, e);
        process::exit(1);
    });

    println!("Train: {} | Test: {}", training.len(), test.len());

    let mut builder = NetworkBuilder::new(IMG_H, IMG_W, SCALE_FACTOR);
    builder.add_convolution_layer(NUM_FILTERS, KERNEL, 1, LEARNING_RATE, SEED);
    builder.add_max_pool_layer(POOL, POOL);
    builder.add_fully_connected_layer(NUM_CLASSES, LEARNING_RATE, SEED);
    let mut net = builder.build();

    println!("Parameters: {}", net.parameter_count());

    let rate = net.test(&test);
    println!("Success rate before training: {:.4}", rate);

    let mut rng = SimpleRng::new(SEED);
    for epoch in 0..EPOCHS {
        println!("Epoch {}", epoch);
        rng.shuffle(&mut training);
        net.train(&training);

        let rate = net.test(&test);
        println!("Success rate after epoch {}: {:.4}", epoch, rate);
    }
}
