//! Push a batch of random images through a stride-2 block and report the
//! shapes involved.
//!
//! Run with `cargo run --example downsample`.

use std::time::Instant;

use ndarray::prelude::*;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;

use conv_blocks::{Layer, LayerError, TwoConvBnRelu, TwoConvBnReluConfig};

fn main() -> Result<(), LayerError> {
    let images: Array4<f32> = Array::random((4, 3, 64, 64), StandardNormal);

    let block = TwoConvBnRelu::with_config(
        3,
        16,
        TwoConvBnReluConfig {
            stride: (2, 2),
            ..TwoConvBnReluConfig::default()
        },
    )?;

    let t0 = Instant::now();
    let features = block.apply(images.view());
    let elapsed = t0.elapsed();

    println!(
        "input  {:?} -> output {:?} ({} -> {} channels, stride 2)",
        images.shape(),
        features.shape(),
        block.in_channels(),
        block.out_channels()
    );
    println!("evaluated in {elapsed:?}");
    Ok(())
}
