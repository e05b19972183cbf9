//! Convolutional Network Engine
//!
//! A from-scratch feed-forward/convolutional network: a chain of
//! differentiable layers transforming a fixed-size image into a class-score
//! vector, trained sample-by-sample via backpropagation and plain gradient
//! descent. All numeric work is explicit loops over `f64` matrices.
//!
//! # Modules
//!
//! - `layers`: Layer trait and implementations (convolution, max-pool, fully connected)
//! - `network`: NeuralNetwork orchestrator and NetworkBuilder
//! - `data`: Labeled samples and the CSV data source
//! - `config`: JSON network configuration
//! - `utils`: Shared utilities (matrix/tensor helpers, seeded RNG)

pub mod config;
pub mod data;
pub mod layers;
pub mod network;
pub mod utils;
