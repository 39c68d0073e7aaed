use ndarray::prelude::*;

use crate::{ActivationFn, Layer};

/// Layer that applies the same real-valued function to each element.
#[derive(Debug)]
pub struct ActivationLayer<F> {
    f: F,
}

impl<F> ActivationLayer<F>
where
    F: ActivationFn,
{
    pub fn new(f: F) -> Self {
        ActivationLayer { f }
    }
}

impl<F> Layer for ActivationLayer<F>
where
    F: ActivationFn,
{
    fn output_shape(&self, input_shape: Ix4) -> Ix4 {
        input_shape
    }

    fn apply(&self, x: ArrayView4<'_, f32>) -> Array4<f32> {
        let f = self.f;
        x.mapv(move |v| f.f(v))
    }
}

/// Rectified linear unit activation function.
#[derive(Debug, Clone, Copy)]
pub struct Relu;

impl ActivationFn for Relu {
    fn f(self, x: f32) -> f32 {
        if x >= 0.0 {
            x
        } else {
            0.0
        }
    }
}
