use mlnn::layer::activation::{ActivationKind, ActivationLayer};
use mlnn::layer::convolution::ConvolutionLayer;
use mlnn::layer::dropout::DropoutLayer;
use mlnn::layer::hebbian::{BinaryCorrelatorLayer, HebbianLinearLayer};
use mlnn::layer::linear::{IdentityLayer, LinearLayer};
use mlnn::layer::padding::{CroppingLayer, PaddingLayer};
use mlnn::layer::pooling::MaxPoolingLayer;
use mlnn::layer::softmax::SoftmaxLayer;
use mlnn::loss::{CrossEntropyLoss, Loss, LogLikelihoodLoss, SquaredErrorLoss};
use mlnn::optimizer::*;
use mlnn::{BackpropagationNetwork, Layer};
use ndarray::Array2;
use serde::Deserialize;

use crate::config::{Hyperparameters, LayerSpec, LossKind, NetworkSpec, OptimizerKind};

/// Deserialized training and validation data, row-major per sample.
#[derive(Deserialize, Debug, Clone)]
pub struct DataDe {
    train_inputs: Vec<Vec<f64>>,
    train_outputs: Vec<Vec<f64>>,
    test_inputs: Vec<Vec<f64>>,
    test_outputs: Vec<Vec<f64>>,
}

fn rows_to_columns(rows: &[Vec<f64>]) -> Array2<f64> {
    let n = rows.len();
    let m = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flatten().cloned().collect();
    Array2::from_shape_vec((n, m), flat).unwrap().reversed_axes()
}

/// Container for a constructed network plus its deserialized training
/// and validation sets.
pub struct NetworkDataDe {
    pub train_inputs: Array2<f64>,
    pub train_outputs: Array2<f64>,
    pub test_inputs: Array2<f64>,
    pub test_outputs: Array2<f64>,
    pub hyperparams: Hyperparameters,
    network_spec: NetworkSpec,
}

impl NetworkDataDe {
    /// # Arguments
    ///
    /// * `data_json` - Raw contents of JSON file containing training
    /// and validation data
    /// * `network_json` - Raw contents of JSON file containing network
    /// architecture and hyperparameters
    pub fn from_json(data_json: &str, network_json: &str) -> Result<NetworkDataDe, String> {
        let data_de: DataDe = serde_json::from_str(data_json).map_err(|e| e.to_string())?;
        let network_spec: NetworkSpec = serde_json::from_str(network_json).map_err(|e| e.to_string())?;
        let hyperparams: Hyperparameters = serde_json::from_str(network_json).map_err(|e| e.to_string())?;

        let train_inputs = rows_to_columns(&data_de.train_inputs);
        let train_outputs = rows_to_columns(&data_de.train_outputs);
        let test_inputs = rows_to_columns(&data_de.test_inputs);
        let test_outputs = rows_to_columns(&data_de.test_outputs);

        if train_inputs.ncols() != train_outputs.ncols() {
            return Err(format!(
                "Number of training samples ({}) != number of training targets ({})",
                train_inputs.ncols(),
                train_outputs.ncols()
            ));
        }
        if test_inputs.ncols() != test_outputs.ncols() {
            return Err(format!(
                "Number of validation samples ({}) != number of validation targets ({})",
                test_inputs.ncols(),
                test_outputs.ncols()
            ));
        }

        Ok(NetworkDataDe {
            train_inputs,
            train_outputs,
            test_inputs,
            test_outputs,
            hyperparams,
            network_spec,
        })
    }

    /// Builds a fresh `BackpropagationNetwork` from the deserialized
    /// architecture, with optimizers installed on every layer.
    pub fn create_network(&self) -> BackpropagationNetwork {
        let mut network = BackpropagationNetwork::new(self.network_spec.display_name.clone(), build_loss(self.network_spec.loss));
        for layer_spec in &self.network_spec.layers {
            network.network.push_layer(build_layer(layer_spec));
        }
        network.network.install_optimizer(optimizer_factory(self.network_spec.optimizer));
        network
    }
}

fn build_layer(spec: &LayerSpec) -> Layer {
    match spec {
        LayerSpec::Linear { input_size, output_size } => Layer::Linear(LinearLayer::new(*input_size, *output_size, "linear")),
        LayerSpec::SparseLinear { input_size, output_size } => {
            Layer::SparseLinear(LinearLayer::new(*input_size, *output_size, "sparse_linear"))
        }
        LayerSpec::Identity { size } => Layer::Identity(IdentityLayer::new(*size, "identity")),
        LayerSpec::Convolution { height, width, in_depth, filters, k, stride } => {
            Layer::Convolution(ConvolutionLayer::new(*height, *width, *in_depth, *filters, *k, *stride, "conv").unwrap())
        }
        LayerSpec::MaxPooling { height, width, depth, k } => {
            Layer::MaxPooling(MaxPoolingLayer::new(*height, *width, *depth, *k, "pool"))
        }
        LayerSpec::Padding { height, width, depth, p } => Layer::Padding(PaddingLayer::new(*height, *width, *depth, *p, "pad")),
        LayerSpec::Cropping { height, width, depth, p } => Layer::Cropping(CroppingLayer::new(*height, *width, *depth, *p, "crop")),
        LayerSpec::Dropout { size, keep_ratio } => Layer::Dropout(DropoutLayer::new(*size, *keep_ratio, "dropout")),
        LayerSpec::ReLU { size } => Layer::ReLU(ActivationLayer::new(ActivationKind::ReLU, *size, "relu")),
        LayerSpec::Sigmoid { size } => Layer::Sigmoid(ActivationLayer::new(ActivationKind::Sigmoid, *size, "sigmoid")),
        LayerSpec::ELU { size } => Layer::ELU(ActivationLayer::new(ActivationKind::ELU, *size, "elu")),
        LayerSpec::Softmax { size } => Layer::Softmax(SoftmaxLayer::new(*size, "softmax")),
        LayerSpec::HebbianLinear { input_size, output_size } => {
            Layer::HebbianLinear(HebbianLinearLayer::new(*input_size, *output_size, "hebbian_linear"))
        }
        LayerSpec::BinaryCorrelator { input_size, output_size, permanence_threshold, proximal_threshold } => {
            Layer::BinaryCorrelator(BinaryCorrelatorLayer::new(
                *input_size,
                *output_size,
                *permanence_threshold,
                *proximal_threshold,
                "binary_correlator",
            ))
        }
    }
}

fn optimizer_factory(kind: OptimizerKind) -> impl Fn(usize, usize) -> Box<dyn Optimizer> + Clone {
    move |r, c| -> Box<dyn Optimizer> {
        match kind {
            OptimizerKind::GradientDescent => Box::new(GradientDescent::new(r, c)),
            OptimizerKind::Momentum => Box::new(Momentum::new(r, c)),
            OptimizerKind::AdaGrad => Box::new(AdaGrad::new(r, c)),
            OptimizerKind::RmsProp => Box::new(RmsProp::new(r, c)),
            OptimizerKind::AdaDelta => Box::new(AdaDelta::new(r, c)),
            OptimizerKind::Adam => Box::new(Adam::new(r, c)),
            OptimizerKind::GradPid => Box::new(GradPid::new(r, c, 0.01)),
            OptimizerKind::HebbianRule => Box::new(HebbianRule::new(r, c)),
            OptimizerKind::NormalizedHebbianRule => Box::new(NormalizedHebbianRule::new(r, c)),
            OptimizerKind::NormalizedZeroSumHebbianRule => Box::new(NormalizedZeroSumHebbianRule::new(r, c)),
            OptimizerKind::BinaryCorrelatorLearningRule => Box::new(BinaryCorrelatorLearningRule::new(r, c)),
        }
    }
}

fn build_loss(kind: LossKind) -> Box<dyn Loss> {
    match kind {
        LossKind::SquaredError => Box::new(SquaredErrorLoss),
        LossKind::CrossEntropy => Box::new(CrossEntropyLoss),
        LossKind::LogLikelihood => Box::new(LogLikelihoodLoss),
    }
}
