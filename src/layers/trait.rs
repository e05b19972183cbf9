//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types must implement,
//! together with the [`LayerData`] value that flows between layers. The layer
//! chain itself is owned by the network as an ordered `Vec<Box<dyn Layer>>`;
//! the network walks it front-to-back for the forward pass and back-to-front
//! for backpropagation, so layers never hold references to their neighbours.

use crate::utils::matrix::{tensor_to_vector, Tensor};

/// Data crossing a layer boundary: either a multi-channel tensor or a flat
/// vector.
///
/// Convolution and pooling layers naturally produce tensors while the fully
/// connected layer produces vectors; each layer accepts either form and
/// reshapes to its native representation using its construction-time shape
/// knowledge.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
    /// Ordered list of 2-D feature-map channels.
    Tensor(Tensor),
    /// Flat vector, channel-major then row-major order.
    Vector(Vec<f64>),
}

impl LayerData {
    /// Flatten to a vector regardless of representation.
    pub fn into_vector(self) -> Vec<f64> {
        match self {
            LayerData::Tensor(tensor) => tensor_to_vector(&tensor),
            LayerData::Vector(vector) => vector,
        }
    }
}

/// Core trait for neural network layers.
///
/// All layer types (convolution, max-pool, fully connected) implement this
/// trait to provide a uniform interface for forward and backward propagation
/// plus the shape queries used to size buffers when crossing the
/// tensor/vector boundary between layers.
///
/// # Caching contract
///
/// A forward call caches whatever the layer needs for its matching backward
/// call (the last input for convolution, the pooling index map for max-pool,
/// the last input and pre-activation for the fully connected layer). The
/// backward call must follow with a gradient shaped like that forward call's
/// output before another forward call is issued; the cached state is
/// overwritten per call and is not protected by any synchronisation.
///
/// # Panics
///
/// Implementations panic if a gradient or input does not match the shape the
/// layer was constructed for; these are programming errors in the caller, not
/// recoverable runtime states.
pub trait Layer {
    /// Forward propagation through this layer.
    ///
    /// Consumes the previous layer's output (or the network input) and
    /// produces this layer's output, caching intermediate state for the
    /// matching backward call.
    fn forward(&mut self, input: LayerData) -> LayerData;

    /// Backward propagation through this layer.
    ///
    /// Given the gradient of the loss with respect to this layer's output,
    /// updates the layer's parameters in place (if it has any) and returns
    /// the gradient with respect to this layer's input, for the network to
    /// hand to the preceding layer. The chain head's return value is simply
    /// dropped.
    fn backward(&mut self, grad: LayerData) -> LayerData;

    /// Number of channels this layer outputs.
    ///
    /// Degenerate (0) for layers whose output is a flat vector.
    fn output_channels(&self) -> usize;

    /// Rows per output channel (0 for flat-vector layers).
    fn output_rows(&self) -> usize;

    /// Columns per output channel (0 for flat-vector layers).
    fn output_cols(&self) -> usize;

    /// Total number of scalars this layer outputs.
    fn output_elements(&self) -> usize;

    /// Number of trainable parameters held by this layer.
    fn parameter_count(&self) -> usize;
}
