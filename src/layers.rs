//! The primitive stages that convolutional blocks are assembled from.

mod activation;
pub use activation::{ActivationLayer, Relu};

mod batch_norm;
pub use batch_norm::BatchNorm2d;

mod conv;
pub use conv::{Conv2d, ConvOptions};
