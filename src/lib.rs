mod error;
pub use error::LayerError;

mod traits;
pub use traits::{ActivationFn, Layer};

pub mod layers;

mod blocks;
pub use blocks::{TwoConvBnRelu, TwoConvBnReluConfig};
