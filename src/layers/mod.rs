//! Layer abstractions for the network
//!
//! This module provides the Layer trait, the data value exchanged between
//! layers, and the three concrete layer types: convolution, max-pool, and
//! fully connected.

mod r#trait;
pub mod conv;
pub mod dense;
pub mod maxpool;

pub use conv::ConvolutionLayer;
pub use dense::FullyConnectedLayer;
pub use maxpool::MaxPoolLayer;
pub use r#trait::{Layer, LayerData};
