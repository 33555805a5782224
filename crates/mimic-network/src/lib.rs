//! Feedforward network weights shared by the evolutionary loop and the
//! imitation-learning engine.
//!
//! A network is described by its layer sizes, e.g. `[8, 12, 4]` for eight
//! sensor inputs, one hidden layer of twelve neurons and four action
//! outputs. Connection layer `l` links the `layer_sizes[l]` source neurons
//! to the `layer_sizes[l + 1]` destination neurons, so the network above
//! has two connection layers.
//!
//! # Storage
//!
//! Conceptually the weights form a ragged 3-D tensor indexed by
//! `(layer, source, destination)`. [`NetworkWeights`] keeps them in a
//! single flat buffer, row-major within each layer and layers stored one
//! after another. This is exactly the order of the flattened array in the
//! on-disk [`WeightPayload`], so flattening is free and rebuilding only
//! needs the layer-size array.
//!
//! # Modules
//!
//! - [`network`]: the tensor itself, feedforward evaluation and blending
//! - [`weights`]: operators over raw weight slices (initialization,
//!   crossover, mutation, convex blend)
//! - [`payload`]: JSON payload codec with tolerant rebuilding
//!
//! # Example
//!
//! ```
//! use mimic_network::NetworkWeights;
//!
//! let mut net = NetworkWeights::zeros(&[2, 3, 1]).unwrap();
//! assert_eq!(net.layer_count(), 2);
//! assert_eq!(net.layer_dims(0), Some((2, 3)));
//! net.set(1, 2, 0, 0.5).unwrap();
//! assert_eq!(net.get(1, 2, 0), Some(0.5));
//! ```

pub use self::{network::*, payload::*};

pub mod network;
pub mod payload;
pub mod weights;

/// Weights produced by initialization and mutation stay within
/// `[-WEIGHT_LIMIT, WEIGHT_LIMIT]`.
pub const WEIGHT_LIMIT: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ShapeError {
    #[display("a network needs at least two layers, got {count}")]
    TooFewLayers { count: usize },
    #[display("layer {layer} has zero neurons")]
    EmptyLayer { layer: usize },
    #[display("connection layer {layer} out of range (network has {layer_count})")]
    LayerOutOfRange { layer: usize, layer_count: usize },
    #[display("weight ({layer}, {row}, {col}) out of range")]
    IndexOutOfRange { layer: usize, row: usize, col: usize },
    #[display("layer {layer} expects {expected} weights, got {actual}")]
    LengthMismatch {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    #[display("network expects {expected} inputs, got {actual}")]
    InputWidth { expected: usize, actual: usize },
}
