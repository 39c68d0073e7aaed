use std::fmt::Debug;

use ndarray::prelude::*;

/// A stage in a convolutional pipeline: a transformer from one image tensor
/// to another.
///
/// Tensors are `f32` arrays of shape `(batch, channels, height, width)`.
/// Axis 0 is always the mini-batch axis. Stages own whatever learned
/// parameters they carry; evaluation never mutates them.
pub trait Layer: Debug {
    /// For input of the given shape, compute the output shape.
    ///
    /// *Panics* if the input shape is unusable for this stage, for example a
    /// channel count that disagrees with the stage's configuration or a
    /// kernel that does not fit the padded input.
    fn output_shape(&self, input_shape: Ix4) -> Ix4;

    /// Compute the output of this stage for the input `x`.
    ///
    /// The output has shape `self.output_shape(x.raw_dim())`.
    fn apply(&self, x: ArrayView4<'_, f32>) -> Array4<f32>;
}

/// An elementwise activation function.
pub trait ActivationFn: Copy + Clone + Debug {
    fn f(self, x: f32) -> f32;
}
