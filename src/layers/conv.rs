//! Convolutions for image processing.
//!
//! Inputs have the shape `(batch, in_channels, height, width)`. Convolution
//! kernels have the shape `(out_channels, in_channels / groups, kernel_h,
//! kernel_w)`.

use ndarray::prelude::*;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rayon::prelude::*;

use crate::error::{require_positive, LayerError};
use crate::Layer;

/// Options forwarded to a convolution beyond its basic shape parameters.
#[derive(Debug, Clone, Copy)]
pub struct ConvOptions {
    /// Spacing between kernel taps, `(dilation_h, dilation_w)`.
    pub dilation: (usize, usize),
    /// Number of blocked channel groups. Both channel counts must be
    /// divisible by this.
    pub groups: usize,
    /// Whether each output channel gets a learned constant added to it.
    pub bias: bool,
}

impl Default for ConvOptions {
    fn default() -> Self {
        ConvOptions {
            dilation: (1, 1),
            groups: 1,
            bias: true,
        }
    }
}

/// 2D convolution over `(batch, channels, height, width)` data.
///
/// Output spatial dimensions follow the usual arithmetic:
///
/// ```text
/// h' = (h + 2*pad_h - dilation_h*(kernel_h - 1) - 1) / stride_h + 1
/// w' = (w + 2*pad_w - dilation_w*(kernel_w - 1) - 1) / stride_w + 1
/// ```
#[derive(Debug)]
pub struct Conv2d {
    /// Kernel parameters, `(out_channels, in_channels / groups, kernel_h,
    /// kernel_w)`.
    weight: Array4<f32>,
    /// Per-output-channel constant, if configured.
    bias: Option<Array1<f32>>,
    in_channels: usize,
    out_channels: usize,
    kernel_size: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
    dilation: (usize, usize),
    groups: usize,
}

impl Conv2d {
    /// Create a convolution with default options (no dilation, one group,
    /// with bias).
    ///
    /// Weights draw from a normal distribution scaled by the kernel fan-in;
    /// bias starts at zero.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        padding: (usize, usize),
        stride: (usize, usize),
    ) -> Result<Self, LayerError> {
        Self::with_options(
            in_channels,
            out_channels,
            kernel_size,
            padding,
            stride,
            &ConvOptions::default(),
        )
    }

    /// Create a convolution with explicit [`ConvOptions`].
    pub fn with_options(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        padding: (usize, usize),
        stride: (usize, usize),
        options: &ConvOptions,
    ) -> Result<Self, LayerError> {
        require_positive(in_channels, "in_channels")?;
        let groups = options.groups;
        require_positive(groups, "groups")?;
        if in_channels % groups != 0 {
            return Err(LayerError::invalid(format!(
                "groups ({groups}) must divide in_channels ({in_channels})"
            )));
        }
        require_positive(kernel_size.0, "kernel_h")?;
        require_positive(kernel_size.1, "kernel_w")?;
        let (kernel_h, kernel_w) = kernel_size;
        let in_per_group = in_channels / groups;

        let fan_in = (in_per_group * kernel_h * kernel_w) as f32;
        let weight = (2.0 / fan_in).sqrt()
            * Array::random((out_channels, in_per_group, kernel_h, kernel_w), StandardNormal);
        let bias = options.bias.then(|| Array1::zeros(out_channels));
        Self::from_parameters(weight, bias, padding, stride, options.dilation, groups)
    }

    /// Assemble a convolution around externally learned parameters.
    ///
    /// The channel counts and kernel size are read off the weight shape,
    /// `(out_channels, in_channels / groups, kernel_h, kernel_w)`.
    pub fn from_parameters(
        weight: Array4<f32>,
        bias: Option<Array1<f32>>,
        padding: (usize, usize),
        stride: (usize, usize),
        dilation: (usize, usize),
        groups: usize,
    ) -> Result<Self, LayerError> {
        let (out_channels, in_per_group, kernel_h, kernel_w) = weight.raw_dim().into_pattern();
        require_positive(out_channels, "out_channels")?;
        require_positive(in_per_group, "in_channels")?;
        require_positive(kernel_h, "kernel_h")?;
        require_positive(kernel_w, "kernel_w")?;
        require_positive(stride.0, "stride_h")?;
        require_positive(stride.1, "stride_w")?;
        require_positive(dilation.0, "dilation_h")?;
        require_positive(dilation.1, "dilation_w")?;
        require_positive(groups, "groups")?;
        if out_channels % groups != 0 {
            return Err(LayerError::invalid(format!(
                "groups ({groups}) must divide out_channels ({out_channels})"
            )));
        }
        if let Some(ref bias) = bias {
            if bias.len() != out_channels {
                return Err(LayerError::invalid(format!(
                    "bias has {} entries but the layer has {out_channels} output channels",
                    bias.len()
                )));
            }
        }
        Ok(Conv2d {
            in_channels: in_per_group * groups,
            out_channels,
            kernel_size: (kernel_h, kernel_w),
            stride,
            padding,
            dilation,
            groups,
            weight,
            bias,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Convolve one image. `x` is `(in_channels, h, w)`; `y` is the matching
    /// `(out_channels, h', w')` output.
    fn apply_single(&self, x: ArrayView3<'_, f32>, mut y: ArrayViewMut3<'_, f32>) {
        let (_, xh, xw) = x.raw_dim().into_pattern();
        let (_, yh, yw) = y.raw_dim().into_pattern();
        let (kernel_h, kernel_w) = self.kernel_size;
        let (stride_h, stride_w) = self.stride;
        let (pad_h, pad_w) = self.padding;
        let (dilation_h, dilation_w) = self.dilation;
        let in_per_group = self.in_channels / self.groups;
        let out_per_group = self.out_channels / self.groups;

        for oc in 0..self.out_channels {
            // First input channel of the group this output channel reads.
            let ic0 = oc / out_per_group * in_per_group;
            let start = match &self.bias {
                Some(bias) => bias[oc],
                None => 0.0,
            };
            for oy in 0..yh {
                for ox in 0..yw {
                    let mut acc = start;
                    for ky in 0..kernel_h {
                        let iy = (oy * stride_h + ky * dilation_h) as isize - pad_h as isize;
                        if iy < 0 || iy >= xh as isize {
                            continue;
                        }
                        for kx in 0..kernel_w {
                            let ix = (ox * stride_w + kx * dilation_w) as isize - pad_w as isize;
                            if ix < 0 || ix >= xw as isize {
                                continue;
                            }
                            for ic in 0..in_per_group {
                                acc += self.weight[[oc, ic, ky, kx]]
                                    * x[[ic0 + ic, iy as usize, ix as usize]];
                            }
                        }
                    }
                    y[[oc, oy, ox]] = acc;
                }
            }
        }
    }
}

impl Layer for Conv2d {
    fn output_shape(&self, input_shape: Ix4) -> Ix4 {
        let (batch, xc, xh, xw) = input_shape.into_pattern();
        assert_eq!(
            xc, self.in_channels,
            "incompatible number of channels: input={xc}, layer={}",
            self.in_channels
        );
        let (kernel_h, kernel_w) = self.kernel_size;
        let (pad_h, pad_w) = self.padding;
        let (dilation_h, dilation_w) = self.dilation;
        let span_h = dilation_h * (kernel_h - 1) + 1;
        let span_w = dilation_w * (kernel_w - 1) + 1;
        assert!(
            span_h <= xh + 2 * pad_h && span_w <= xw + 2 * pad_w,
            "kernel span {span_h}x{span_w} does not fit padded input {}x{}",
            xh + 2 * pad_h,
            xw + 2 * pad_w
        );
        Ix4(
            batch,
            self.out_channels,
            (xh + 2 * pad_h - span_h) / self.stride.0 + 1,
            (xw + 2 * pad_w - span_w) / self.stride.1 + 1,
        )
    }

    fn apply(&self, x: ArrayView4<'_, f32>) -> Array4<f32> {
        let mut y = Array4::zeros(self.output_shape(x.raw_dim()));
        let yi = y.axis_iter_mut(Axis(0)).into_par_iter();
        let xi = x.axis_iter(Axis(0)).into_par_iter();
        yi.zip(xi).for_each(|(y, x)| self.apply_single(x, y));
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_shape_arithmetic() {
        let conv = Conv2d::new(3, 8, (3, 3), (1, 1), (1, 1)).unwrap();
        assert_eq!(conv.output_shape(Ix4(2, 3, 32, 32)), Ix4(2, 8, 32, 32));

        let conv = Conv2d::new(3, 8, (3, 3), (1, 1), (2, 2)).unwrap();
        assert_eq!(conv.output_shape(Ix4(1, 3, 32, 32)), Ix4(1, 8, 16, 16));

        let conv = Conv2d::new(1, 1, (5, 3), (0, 0), (1, 1)).unwrap();
        assert_eq!(conv.output_shape(Ix4(1, 1, 9, 9)), Ix4(1, 1, 5, 7));

        let dilated = ConvOptions {
            dilation: (2, 2),
            ..ConvOptions::default()
        };
        let conv = Conv2d::with_options(1, 1, (3, 3), (1, 1), (1, 1), &dilated).unwrap();
        assert_eq!(conv.output_shape(Ix4(1, 1, 10, 10)), Ix4(1, 1, 8, 8));
    }

    #[test]
    #[should_panic]
    fn output_shape_rejects_wrong_channel_count() {
        let conv = Conv2d::new(3, 8, (3, 3), (1, 1), (1, 1)).unwrap();
        conv.output_shape(Ix4(1, 4, 32, 32));
    }

    #[test]
    #[should_panic]
    fn output_shape_rejects_oversized_kernel() {
        let conv = Conv2d::new(1, 1, (7, 7), (0, 0), (1, 1)).unwrap();
        conv.output_shape(Ix4(1, 1, 5, 5));
    }
}
