//! External configuration adapter (spec §6): a JSON description of a
//! network's architecture and training hyperparameters, external to
//! the core contract.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerSpec {
    Linear { input_size: usize, output_size: usize },
    SparseLinear { input_size: usize, output_size: usize },
    Identity { size: usize },
    Convolution { height: usize, width: usize, in_depth: usize, filters: usize, k: usize, stride: usize },
    MaxPooling { height: usize, width: usize, depth: usize, k: usize },
    Padding { height: usize, width: usize, depth: usize, p: usize },
    Cropping { height: usize, width: usize, depth: usize, p: usize },
    Dropout { size: usize, keep_ratio: f64 },
    ReLU { size: usize },
    Sigmoid { size: usize },
    ELU { size: usize },
    Softmax { size: usize },
    HebbianLinear { input_size: usize, output_size: usize },
    BinaryCorrelator { input_size: usize, output_size: usize, permanence_threshold: f64, proximal_threshold: f64 },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum OptimizerKind {
    GradientDescent,
    Momentum,
    AdaGrad,
    RmsProp,
    AdaDelta,
    Adam,
    GradPid,
    HebbianRule,
    NormalizedHebbianRule,
    NormalizedZeroSumHebbianRule,
    BinaryCorrelatorLearningRule,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum LossKind {
    SquaredError,
    CrossEntropy,
    LogLikelihood,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub display_name: String,
    pub layers: Vec<LayerSpec>,
    pub optimizer: OptimizerKind,
    pub loss: LossKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub epochs: usize,
    pub learning_rate: f64,
    #[serde(default)]
    pub decay: f64,
    pub batch_size: usize,
}
