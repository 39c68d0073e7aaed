//! End-to-end tests for the two-stage convolution block.

use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use conv_blocks::layers::ConvOptions;
use conv_blocks::{Layer, LayerError, TwoConvBnRelu, TwoConvBnReluConfig};

#[test]
fn stride_two_halves_spatial_dims_once() {
    let block = TwoConvBnRelu::with_config(
        3,
        16,
        TwoConvBnReluConfig {
            stride: (2, 2),
            ..TwoConvBnReluConfig::default()
        },
    )
    .unwrap();

    // Only the first convolution strides; the second keeps the halved size.
    assert_eq!(block.output_shape(Ix4(1, 3, 32, 32)), Ix4(1, 16, 16, 16));

    let x = Array::random((1, 3, 32, 32), Uniform::new(-1.0, 1.0));
    let y = block.apply(x.view());
    assert_eq!(y.raw_dim(), Ix4(1, 16, 16, 16));
}

#[test]
fn default_stride_preserves_spatial_dims() {
    let block = TwoConvBnRelu::new(8, 8).unwrap();
    assert_eq!(block.output_shape(Ix4(2, 8, 7, 5)), Ix4(2, 8, 7, 5));

    let x = Array::random((2, 8, 7, 5), Uniform::new(-1.0, 1.0));
    let y = block.apply(x.view());
    assert_eq!(y.raw_dim(), x.raw_dim());
}

#[test]
fn mid_channels_defaults_to_out_channels() {
    let block = TwoConvBnRelu::new(3, 16).unwrap();
    assert_eq!(block.in_channels(), 3);
    assert_eq!(block.mid_channels(), 16);
    assert_eq!(block.out_channels(), 16);
}

#[test]
fn explicit_mid_channels_narrow_the_middle() {
    let block = TwoConvBnRelu::with_config(
        16,
        32,
        TwoConvBnReluConfig {
            mid_channels: Some(8),
            ..TwoConvBnReluConfig::default()
        },
    )
    .unwrap();
    assert_eq!(block.mid_channels(), 8);

    let x = Array::random((1, 16, 9, 9), Uniform::new(-1.0, 1.0));
    let y = block.apply(x.view());
    assert_eq!(y.raw_dim(), Ix4(1, 32, 9, 9));
}

#[test]
fn zero_input_is_safe() {
    let block = TwoConvBnRelu::new(3, 4).unwrap();
    let x = Array4::zeros((1, 3, 8, 8));
    let y = block.apply(x.view());
    assert_eq!(y.raw_dim(), Ix4(1, 4, 8, 8));
    // The block ends in a ReLU, so nothing can come out negative.
    assert!(y.iter().all(|&v| v >= 0.0));
}

#[test]
fn rejects_zero_channel_counts() {
    let err = TwoConvBnRelu::new(3, 0).unwrap_err();
    assert!(matches!(err, LayerError::InvalidConfiguration { .. }));

    let err = TwoConvBnRelu::new(0, 16).unwrap_err();
    assert!(matches!(err, LayerError::InvalidConfiguration { .. }));

    let err = TwoConvBnRelu::with_config(
        3,
        16,
        TwoConvBnReluConfig {
            mid_channels: Some(0),
            ..TwoConvBnReluConfig::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, LayerError::InvalidConfiguration { .. }));
}

#[test]
fn conv_options_forward_to_both_convolutions() {
    let block = TwoConvBnRelu::with_config(
        4,
        4,
        TwoConvBnReluConfig {
            conv: ConvOptions {
                dilation: (2, 2),
                groups: 2,
                bias: false,
            },
            ..TwoConvBnReluConfig::default()
        },
    )
    .unwrap();

    // With a dilated 3x3 kernel and padding 1, each convolution trims two
    // rows and columns, and both convolutions are dilated.
    assert_eq!(block.output_shape(Ix4(1, 4, 12, 12)), Ix4(1, 4, 8, 8));

    let x = Array::random((1, 4, 12, 12), Uniform::new(-1.0, 1.0));
    let y = block.apply(x.view());
    assert_eq!(y.raw_dim(), Ix4(1, 4, 8, 8));
}
