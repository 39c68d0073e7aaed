//! Composite building blocks assembled from the primitive stages.

use ndarray::prelude::*;

use crate::layers::{ActivationLayer, BatchNorm2d, Conv2d, ConvOptions, Relu};
use crate::{Layer, LayerError};

/// Configuration for [`TwoConvBnRelu`].
///
/// `kernel_size`, `padding` and the [`ConvOptions`] apply to both
/// convolutions; `stride` applies to the first convolution only.
#[derive(Debug, Clone)]
pub struct TwoConvBnReluConfig {
    pub kernel_size: (usize, usize),
    pub padding: (usize, usize),
    pub stride: (usize, usize),
    /// Channel count between the two convolutions. `None` means use the
    /// block's output channel count.
    pub mid_channels: Option<usize>,
    /// Options forwarded verbatim to both convolutions.
    pub conv: ConvOptions,
}

impl Default for TwoConvBnReluConfig {
    fn default() -> Self {
        TwoConvBnReluConfig {
            kernel_size: (3, 3),
            padding: (1, 1),
            stride: (1, 1),
            mid_channels: None,
            conv: ConvOptions::default(),
        }
    }
}

/// Two rounds of convolution, batch normalization and ReLU, applied in
/// sequence.
///
/// The first convolution maps `in_channels` to `mid_channels` and carries
/// the configured stride, so one block can downsample while it mixes
/// channels. The second maps `mid_channels` to `out_channels` with the same
/// kernel and padding but stride 1, preserving the (possibly reduced)
/// resolution.
#[derive(Debug)]
pub struct TwoConvBnRelu {
    /// The six stages, in evaluation order. Fixed at construction.
    stages: Vec<Box<dyn Layer>>,
    in_channels: usize,
    mid_channels: usize,
    out_channels: usize,
}

impl TwoConvBnRelu {
    /// Create a block with the default configuration: 3x3 kernels, padding 1,
    /// stride 1, `mid_channels` equal to `out_channels`.
    pub fn new(in_channels: usize, out_channels: usize) -> Result<Self, LayerError> {
        Self::with_config(in_channels, out_channels, TwoConvBnReluConfig::default())
    }

    /// Create a block with an explicit configuration.
    ///
    /// All validation happens in the stage constructors; whatever they
    /// reject propagates out unchanged.
    pub fn with_config(
        in_channels: usize,
        out_channels: usize,
        config: TwoConvBnReluConfig,
    ) -> Result<Self, LayerError> {
        let mid_channels = config.mid_channels.unwrap_or(out_channels);
        let stages: Vec<Box<dyn Layer>> = vec![
            Box::new(Conv2d::with_options(
                in_channels,
                mid_channels,
                config.kernel_size,
                config.padding,
                config.stride,
                &config.conv,
            )?),
            Box::new(BatchNorm2d::new(mid_channels)?),
            Box::new(ActivationLayer::new(Relu)),
            Box::new(Conv2d::with_options(
                mid_channels,
                out_channels,
                config.kernel_size,
                config.padding,
                (1, 1),
                &config.conv,
            )?),
            Box::new(BatchNorm2d::new(out_channels)?),
            Box::new(ActivationLayer::new(Relu)),
        ];
        Ok(TwoConvBnRelu {
            stages,
            in_channels,
            mid_channels,
            out_channels,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Channel count between the two convolutions.
    pub fn mid_channels(&self) -> usize {
        self.mid_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl Layer for TwoConvBnRelu {
    fn output_shape(&self, input_shape: Ix4) -> Ix4 {
        self.stages
            .iter()
            .fold(input_shape, |shape, stage| stage.output_shape(shape))
    }

    fn apply(&self, x: ArrayView4<'_, f32>) -> Array4<f32> {
        let mut y = self.stages[0].apply(x);
        for stage in &self.stages[1..] {
            y = stage.apply(y.view());
        }
        y
    }
}
