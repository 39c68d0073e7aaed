//! Per-channel batch normalization.

use ndarray::prelude::*;

use crate::error::{require_positive, LayerError};
use crate::Layer;

/// Batch normalization over `(batch, channels, height, width)` data.
///
/// Each channel is rescaled with its accumulated running statistics:
///
/// ```text
/// y = gamma * (x - running_mean) / sqrt(running_var + eps) + beta
/// ```
///
/// The running statistics belong to whatever trained the surrounding model;
/// a freshly constructed layer starts from mean 0 and variance 1, with gamma
/// at one and beta at zero.
///
/// Reference: Ioffe & Szegedy, "Batch Normalization: Accelerating Deep
/// Network Training by Reducing Internal Covariate Shift" (2015).
#[derive(Debug)]
pub struct BatchNorm2d {
    gamma: Array1<f32>,
    beta: Array1<f32>,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,
    num_features: usize,
    eps: f32,
}

impl BatchNorm2d {
    /// Create a batch normalization layer for `num_features` channels, with
    /// the conventional epsilon of `1e-5`.
    pub fn new(num_features: usize) -> Result<Self, LayerError> {
        Self::with_config(num_features, 1e-5)
    }

    /// Create a batch normalization layer with a custom epsilon.
    pub fn with_config(num_features: usize, eps: f32) -> Result<Self, LayerError> {
        Self::from_parameters(
            Array1::ones(num_features),
            Array1::zeros(num_features),
            Array1::zeros(num_features),
            Array1::ones(num_features),
            eps,
        )
    }

    /// Assemble a batch normalization layer around externally learned
    /// parameters and statistics. All four arrays must have one entry per
    /// channel.
    pub fn from_parameters(
        gamma: Array1<f32>,
        beta: Array1<f32>,
        running_mean: Array1<f32>,
        running_var: Array1<f32>,
        eps: f32,
    ) -> Result<Self, LayerError> {
        let num_features = gamma.len();
        require_positive(num_features, "num_features")?;
        if beta.len() != num_features
            || running_mean.len() != num_features
            || running_var.len() != num_features
        {
            return Err(LayerError::invalid(format!(
                "parameter lengths disagree: gamma={}, beta={}, running_mean={}, running_var={}",
                gamma.len(),
                beta.len(),
                running_mean.len(),
                running_var.len()
            )));
        }
        if !(eps > 0.0 && eps.is_finite()) {
            return Err(LayerError::invalid(format!(
                "eps must be a positive finite number, got {eps}"
            )));
        }
        Ok(BatchNorm2d {
            gamma,
            beta,
            running_mean,
            running_var,
            num_features,
            eps,
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }
}

impl Layer for BatchNorm2d {
    fn output_shape(&self, input_shape: Ix4) -> Ix4 {
        let (_, xc, _, _) = input_shape.into_pattern();
        assert_eq!(
            xc, self.num_features,
            "incompatible number of channels: input={xc}, layer={}",
            self.num_features
        );
        input_shape
    }

    fn apply(&self, x: ArrayView4<'_, f32>) -> Array4<f32> {
        self.output_shape(x.raw_dim());
        let mut y = x.to_owned();
        // Fold the affine transform into one multiply-add per element.
        for (c, mut channel) in y.axis_iter_mut(Axis(1)).enumerate() {
            let scale = self.gamma[c] / (self.running_var[c] + self.eps).sqrt();
            let shift = self.beta[c] - self.running_mean[c] * scale;
            channel.mapv_inplace(|v| v * scale + shift);
        }
        y
    }
}
