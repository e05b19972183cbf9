//! Network configuration structures
//!
//! This module provides configuration structures for defining a network via
//! JSON files, enabling architecture experimentation without code changes.
//! Different layer types require different optional fields:
//!
//! - **convolution**: `num_filters`, `kernel_size`, and optional `stride`
//!   (default 1)
//! - **max_pool**: `window_size` and optional `stride` (default 1)
//! - **fully_connected**: `out_length`

use crate::network::{NetworkBuilder, NeuralNetwork};
use serde::Deserialize;
use std::error::Error;
use std::fs;

/// Configuration for a single layer in the chain.
///
/// # Example
///
/// ```json
/// {
///   "layer_type": "convolution",
///   "num_filters": 8,
///   "kernel_size": 5,
///   "stride": 1
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "convolution", "max_pool", or "fully_connected"
    pub layer_type: String,

    // Convolution parameters
    /// Number of filters for a convolution layer
    pub num_filters: Option<usize>,
    /// Kernel size for a convolution layer (square kernel)
    pub kernel_size: Option<usize>,

    // Max-pool parameters
    /// Window size for a max-pool layer (square window)
    pub window_size: Option<usize>,

    /// Stride for convolution and max-pool layers (default: 1)
    pub stride: Option<usize>,

    // Fully connected parameters
    /// Output length for a fully connected layer
    pub out_length: Option<usize>,
}

/// Configuration for the whole network.
///
/// # Example
///
/// ```json
/// {
///   "input_rows": 28,
///   "input_cols": 28,
///   "scale_factor": 25600.0,
///   "seed": 123,
///   "learning_rate": 0.1,
///   "layers": [
///     { "layer_type": "convolution", "num_filters": 8, "kernel_size": 5 },
///     { "layer_type": "max_pool", "window_size": 2, "stride": 2 },
///     { "layer_type": "fully_connected", "out_length": 10 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Image rows
    pub input_rows: usize,
    /// Image columns
    pub input_cols: usize,
    /// Divisor applied to raw pixel values before the first layer
    pub scale_factor: f64,
    /// Seed for all parameter initialisation
    pub seed: u64,
    /// Learning rate shared by all trainable layers
    pub learning_rate: f64,
    /// Ordered layer configurations
    pub layers: Vec<LayerConfig>,
}

/// Loads a network configuration from a JSON file.
///
/// # Returns
///
/// `Ok(NetworkConfig)` on success, or an error if the file cannot be read or
/// the JSON is invalid.
pub fn load_config(path: &str) -> Result<NetworkConfig, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: NetworkConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(message: String) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    ))
}

fn validate_config(config: &NetworkConfig) -> Result<(), Box<dyn Error>> {
    if config.input_rows == 0 || config.input_cols == 0 {
        return Err(invalid("image dimensions must be positive".to_string()));
    }
    if config.scale_factor <= 0.0 {
        return Err(invalid("scale_factor must be positive".to_string()));
    }
    if config.learning_rate <= 0.0 {
        return Err(invalid("learning_rate must be positive".to_string()));
    }
    if config.layers.is_empty() {
        return Err(invalid("network must have at least one layer".to_string()));
    }

    for (i, layer) in config.layers.iter().enumerate() {
        validate_layer(layer, i)?;
    }

    match config.layers.last().map(|l| l.layer_type.as_str()) {
        Some("fully_connected") => Ok(()),
        _ => Err(invalid(
            "last layer must be fully_connected to produce class scores".to_string(),
        )),
    }
}

fn validate_layer(layer: &LayerConfig, index: usize) -> Result<(), Box<dyn Error>> {
    match layer.layer_type.as_str() {
        "convolution" => {
            let num_filters = layer
                .num_filters
                .ok_or_else(|| invalid(format!("layer {}: convolution requires 'num_filters'", index)))?;
            let kernel_size = layer
                .kernel_size
                .ok_or_else(|| invalid(format!("layer {}: convolution requires 'kernel_size'", index)))?;
            if num_filters == 0 || kernel_size == 0 {
                return Err(invalid(format!(
                    "layer {}: num_filters and kernel_size must be positive",
                    index
                )));
            }
        }
        "max_pool" => {
            let window_size = layer
                .window_size
                .ok_or_else(|| invalid(format!("layer {}: max_pool requires 'window_size'", index)))?;
            if window_size == 0 {
                return Err(invalid(format!(
                    "layer {}: window_size must be positive",
                    index
                )));
            }
        }
        "fully_connected" => {
            let out_length = layer
                .out_length
                .ok_or_else(|| invalid(format!("layer {}: fully_connected requires 'out_length'", index)))?;
            if out_length == 0 {
                return Err(invalid(format!(
                    "layer {}: out_length must be positive",
                    index
                )));
            }
        }
        other => {
            return Err(invalid(format!(
                "layer {}: invalid layer type '{}'. Must be one of: convolution, max_pool, fully_connected",
                index, other
            )));
        }
    }

    if let Some(stride) = layer.stride {
        if stride == 0 {
            return Err(invalid(format!("layer {}: stride must be positive", index)));
        }
    }

    Ok(())
}

/// Builds a network from a validated configuration.
///
/// Layer input shapes are derived by the builder from the chain so far; the
/// stride formula `(in - kernel) / stride + 1` must yield an exact integer at
/// every spatial layer or construction panics with the offending dimensions.
pub fn build_network(config: &NetworkConfig) -> Result<NeuralNetwork, Box<dyn Error>> {
    validate_config(config)?;

    let mut builder =
        NetworkBuilder::new(config.input_rows, config.input_cols, config.scale_factor);

    for (i, layer) in config.layers.iter().enumerate() {
        let stride = layer.stride.unwrap_or(1);
        match layer.layer_type.as_str() {
            "convolution" => {
                let num_filters = layer.num_filters.ok_or_else(|| {
                    invalid(format!("layer {}: convolution requires 'num_filters'", i))
                })?;
                let kernel_size = layer.kernel_size.ok_or_else(|| {
                    invalid(format!("layer {}: convolution requires 'kernel_size'", i))
                })?;
                builder.add_convolution_layer(
                    num_filters,
                    kernel_size,
                    stride,
                    config.learning_rate,
                    config.seed,
                );
            }
            "max_pool" => {
                let window_size = layer.window_size.ok_or_else(|| {
                    invalid(format!("layer {}: max_pool requires 'window_size'", i))
                })?;
                builder.add_max_pool_layer(window_size, stride);
            }
            "fully_connected" => {
                let out_length = layer.out_length.ok_or_else(|| {
                    invalid(format!("layer {}: fully_connected requires 'out_length'", i))
                })?;
                builder.add_fully_connected_layer(out_length, config.learning_rate, config.seed);
            }
            other => {
                return Err(invalid(format!("layer {}: invalid layer type '{}'", i, other)));
            }
        }
    }

    Ok(builder.build())
}
