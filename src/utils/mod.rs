//! Shared utilities for the network layers
//!
//! This module provides the matrix/tensor helpers and the seeded random
//! number generation used across layer implementations.

pub mod matrix;
pub mod rng;

pub use matrix::{Matrix, Tensor};
pub use rng::SimpleRng;
