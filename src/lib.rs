//! From-scratch, CPU-resident neural-network framework covering
//! feed-forward supervised learning and unsupervised Hebbian feature
//! extraction over dense 2-D tensors.

pub mod bag;
pub mod error;
pub mod landscape;
pub mod layer;
pub mod loss;
pub mod network;
pub mod optimizer;
pub mod tensor;
pub mod util;

pub use bag::NamedTensorBag;
pub use error::NnError;
pub use layer::Layer;
pub use network::{BackpropagationNetwork, HebbianNetwork, Network};
pub use tensor::{handle, Tensor, TensorHandle};
