pub mod activation;
pub mod convolution;
pub mod core;
pub mod dropout;
pub mod hebbian;
pub mod linear;
pub mod padding;
pub mod pooling;
pub mod softmax;

use serde::{Deserialize, Serialize};

use crate::bag::NamedTensorBag;
use crate::error::NnError;
use crate::optimizer::Optimizer;

use activation::{ActivationKind, ActivationLayer};
use convolution::ConvolutionLayer;
use core::{LayerCore, LayerDescriptor};
use dropout::DropoutLayer;
use hebbian::{BinaryCorrelatorLayer, ConvHebbianLayer, HebbianLinearLayer};
use linear::{IdentityLayer, LinearLayer};
use padding::{CroppingLayer, PaddingLayer};
use pooling::MaxPoolingLayer;
use softmax::SoftmaxLayer;

/// The serialized type tag every layer carries (spec §6). `ConvHebbian`
/// and `Identity` extend the archived set named in §6 to cover
/// components described in §4.6/§12 that the excerpt there omitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerTypeTag {
    Linear,
    SparseLinear,
    Identity,
    Convolution,
    MaxPooling,
    Padding,
    Cropping,
    Dropout,
    ReLU,
    Sigmoid,
    ELU,
    Softmax,
    HebbianLinear,
    BinaryCorrelator,
    ConvHebbian,
}

/// Sum type over every concrete layer algorithm (spec §9 Design Note),
/// dispatched by pattern match rather than virtual call.
#[derive(Clone, Debug)]
pub enum Layer {
    Linear(LinearLayer),
    SparseLinear(LinearLayer),
    Identity(IdentityLayer),
    Convolution(ConvolutionLayer),
    MaxPooling(MaxPoolingLayer),
    Padding(PaddingLayer),
    Cropping(CroppingLayer),
    Dropout(DropoutLayer),
    ReLU(ActivationLayer),
    Sigmoid(ActivationLayer),
    ELU(ActivationLayer),
    Softmax(SoftmaxLayer),
    HebbianLinear(HebbianLinearLayer),
    BinaryCorrelator(BinaryCorrelatorLayer),
    ConvHebbian(ConvHebbianLayer),
}

impl Layer {
    pub fn type_tag(&self) -> LayerTypeTag {
        match self {
            Layer::Linear(_) => LayerTypeTag::Linear,
            Layer::SparseLinear(_) => LayerTypeTag::SparseLinear,
            Layer::Identity(_) => LayerTypeTag::Identity,
            Layer::Convolution(_) => LayerTypeTag::Convolution,
            Layer::MaxPooling(_) => LayerTypeTag::MaxPooling,
            Layer::Padding(_) => LayerTypeTag::Padding,
            Layer::Cropping(_) => LayerTypeTag::Cropping,
            Layer::Dropout(_) => LayerTypeTag::Dropout,
            Layer::ReLU(_) => LayerTypeTag::ReLU,
            Layer::Sigmoid(_) => LayerTypeTag::Sigmoid,
            Layer::ELU(_) => LayerTypeTag::ELU,
            Layer::Softmax(_) => LayerTypeTag::Softmax,
            Layer::HebbianLinear(_) => LayerTypeTag::HebbianLinear,
            Layer::BinaryCorrelator(_) => LayerTypeTag::BinaryCorrelator,
            Layer::ConvHebbian(_) => LayerTypeTag::ConvHebbian,
        }
    }

    pub fn core(&self) -> &LayerCore {
        match self {
            Layer::Linear(l) | Layer::SparseLinear(l) => &l.core,
            Layer::Identity(l) => &l.core,
            Layer::Convolution(l) => &l.core,
            Layer::MaxPooling(l) => &l.core,
            Layer::Padding(l) => &l.core,
            Layer::Cropping(l) => &l.core,
            Layer::Dropout(l) => &l.core,
            Layer::ReLU(l) | Layer::Sigmoid(l) | Layer::ELU(l) => &l.core,
            Layer::Softmax(l) => &l.core,
            Layer::HebbianLinear(l) => &l.core,
            Layer::BinaryCorrelator(l) => &l.core,
            Layer::ConvHebbian(l) => &l.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut LayerCore {
        match self {
            Layer::Linear(l) | Layer::SparseLinear(l) => &mut l.core,
            Layer::Identity(l) => &mut l.core,
            Layer::Convolution(l) => &mut l.core,
            Layer::MaxPooling(l) => &mut l.core,
            Layer::Padding(l) => &mut l.core,
            Layer::Cropping(l) => &mut l.core,
            Layer::Dropout(l) => &mut l.core,
            Layer::ReLU(l) | Layer::Sigmoid(l) | Layer::ELU(l) => &mut l.core,
            Layer::Softmax(l) => &mut l.core,
            Layer::HebbianLinear(l) => &mut l.core,
            Layer::BinaryCorrelator(l) => &mut l.core,
            Layer::ConvHebbian(l) => &mut l.core,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.core().descriptor.display_name
    }

    pub fn input_size(&self) -> usize {
        self.core().descriptor.input_size()
    }

    pub fn output_size(&self) -> usize {
        self.core().descriptor.output_size()
    }

    pub fn forward(&mut self, test_mode: bool) {
        match self {
            Layer::Linear(l) | Layer::SparseLinear(l) => l.forward(test_mode),
            Layer::Identity(l) => l.forward(test_mode),
            Layer::Convolution(l) => l.forward(test_mode),
            Layer::MaxPooling(l) => l.forward(test_mode),
            Layer::Padding(l) => l.forward(test_mode),
            Layer::Cropping(l) => l.forward(test_mode),
            Layer::Dropout(l) => l.forward(test_mode),
            Layer::ReLU(l) | Layer::Sigmoid(l) | Layer::ELU(l) => l.forward(test_mode),
            Layer::Softmax(l) => l.forward(test_mode),
            Layer::HebbianLinear(l) => l.forward(test_mode),
            Layer::BinaryCorrelator(l) => l.forward(test_mode),
            Layer::ConvHebbian(l) => l.forward(test_mode),
        }
    }

    pub fn backward(&mut self) -> Result<(), NnError> {
        match self {
            Layer::Linear(l) | Layer::SparseLinear(l) => l.backward(),
            Layer::Identity(l) => {
                l.backward();
                Ok(())
            }
            Layer::Convolution(l) => l.backward(),
            Layer::MaxPooling(l) => {
                l.backward();
                Ok(())
            }
            Layer::Padding(l) => {
                l.backward();
                Ok(())
            }
            Layer::Cropping(l) => {
                l.backward();
                Ok(())
            }
            Layer::Dropout(l) => {
                l.backward();
                Ok(())
            }
            Layer::ReLU(l) | Layer::Sigmoid(l) | Layer::ELU(l) => {
                l.backward();
                Ok(())
            }
            Layer::Softmax(l) => {
                l.backward();
                Ok(())
            }
            Layer::HebbianLinear(l) => l.backward(),
            Layer::BinaryCorrelator(l) => l.backward(),
            Layer::ConvHebbian(l) => l.backward(),
        }
    }

    pub fn update(&mut self, lr: f64, decay: f64) -> Result<(), NnError> {
        if let Layer::BinaryCorrelator(l) = self {
            l.core.update(lr, decay)?;
            l.refresh_connectivity();
            return Ok(());
        }
        if let Layer::ConvHebbian(l) = self {
            return l.update(lr, decay);
        }
        self.core_mut().update(lr, decay)
    }

    pub fn resize_batch(&mut self, b: usize) {
        self.core_mut().resize_batch(b);
    }

    pub fn install_optimizer<F>(&mut self, factory: F)
    where
        F: Fn(usize, usize) -> Box<dyn Optimizer>,
    {
        self.core_mut().install_optimizer(factory);
    }
}

#[derive(Serialize, Deserialize)]
struct LayerArchive {
    layer_type_tag: LayerTypeTag,
    input_size: usize,
    output_size: usize,
    batch_size: usize,
    display_name: String,
    input_height: usize,
    input_width: usize,
    input_depth: usize,
    output_height: usize,
    output_width: usize,
    output_depth: usize,
    k: usize,
    stride: usize,
    keep_ratio: f64,
    permanence_threshold: f64,
    proximal_threshold: f64,
    padding_amount: usize,
    state: NamedTensorBag,
    grad: NamedTensorBag,
    params: NamedTensorBag,
    memory: NamedTensorBag,
}

impl Serialize for Layer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let d = self.core().descriptor.clone();
        let (k, stride) = match self {
            Layer::Convolution(l) => (l.k, l.stride),
            Layer::ConvHebbian(l) => (l.k, l.stride),
            Layer::MaxPooling(l) => (l.k, 0),
            _ => (0, 0),
        };
        let keep_ratio = match self {
            Layer::Dropout(l) => l.keep_ratio,
            _ => 0.0,
        };
        let (permanence_threshold, proximal_threshold) = match self {
            Layer::BinaryCorrelator(l) => (l.permanence_threshold, l.proximal_threshold),
            _ => (0.0, 0.0),
        };
        let padding_amount = match self {
            Layer::Padding(l) => l.p,
            Layer::Cropping(l) => l.p,
            _ => 0,
        };

        let archive = LayerArchive {
            layer_type_tag: self.type_tag(),
            input_size: self.input_size(),
            output_size: self.output_size(),
            batch_size: d.batch_size,
            display_name: d.display_name.clone(),
            input_height: d.input_height,
            input_width: d.input_width,
            input_depth: d.input_depth,
            output_height: d.output_height,
            output_width: d.output_width,
            output_depth: d.output_depth,
            k,
            stride,
            keep_ratio,
            permanence_threshold,
            proximal_threshold,
            padding_amount,
            state: self.core().state.clone(),
            grad: self.core().grad.clone(),
            params: self.core().params.clone(),
            memory: self.core().memory.clone(),
        };
        archive.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let archive = LayerArchive::deserialize(deserializer)?;

        let descriptor = LayerDescriptor {
            input_height: archive.input_height,
            input_width: archive.input_width,
            input_depth: archive.input_depth,
            output_height: archive.output_height,
            output_width: archive.output_width,
            output_depth: archive.output_depth,
            batch_size: archive.batch_size,
            display_name: archive.display_name.clone(),
        };

        let mut core = LayerCore::new(descriptor);
        core.state = archive.state;
        core.grad = archive.grad;
        core.params = archive.params;
        core.memory = archive.memory;

        let layer = match archive.layer_type_tag {
            LayerTypeTag::Linear => Layer::Linear(LinearLayer { core }),
            LayerTypeTag::SparseLinear => Layer::SparseLinear(LinearLayer { core }),
            LayerTypeTag::Identity => Layer::Identity(IdentityLayer { core }),
            LayerTypeTag::Convolution => Layer::Convolution(ConvolutionLayer {
                core,
                filters: archive.output_depth,
                k: archive.k,
                stride: archive.stride,
            }),
            LayerTypeTag::MaxPooling => Layer::MaxPooling(MaxPoolingLayer { core, k: archive.k }),
            LayerTypeTag::Padding => Layer::Padding(PaddingLayer { core, p: archive.padding_amount }),
            LayerTypeTag::Cropping => Layer::Cropping(CroppingLayer { core, p: archive.padding_amount }),
            LayerTypeTag::Dropout => Layer::Dropout(DropoutLayer {
                core,
                keep_ratio: archive.keep_ratio,
            }),
            LayerTypeTag::ReLU => Layer::ReLU(ActivationLayer { core, kind: ActivationKind::ReLU }),
            LayerTypeTag::Sigmoid => Layer::Sigmoid(ActivationLayer { core, kind: ActivationKind::Sigmoid }),
            LayerTypeTag::ELU => Layer::ELU(ActivationLayer { core, kind: ActivationKind::ELU }),
            LayerTypeTag::Softmax => Layer::Softmax(SoftmaxLayer { core }),
            LayerTypeTag::HebbianLinear => Layer::HebbianLinear(HebbianLinearLayer { core }),
            LayerTypeTag::BinaryCorrelator => Layer::BinaryCorrelator(BinaryCorrelatorLayer {
                core,
                permanence_threshold: archive.permanence_threshold,
                proximal_threshold: archive.proximal_threshold,
            }),
            LayerTypeTag::ConvHebbian => Layer::ConvHebbian(ConvHebbianLayer {
                core,
                filters: archive.output_depth,
                k: archive.k,
                stride: archive.stride,
            }),
        };
        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn linear_serialization_round_trips_parameters() {
        let mut layer = Layer::Linear(LinearLayer::new(2, 3, "fc1"));
        if let Layer::Linear(l) = &mut layer {
            *l.core.params.get("W").unwrap().borrow_mut() = {
                let mut w = Tensor::new(3, 2);
                w.enumerate();
                w
            };
        }
        let json = serde_json::to_string(&layer).unwrap();
        let back: Layer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.type_tag(), LayerTypeTag::Linear);
        assert_eq!(back.input_size(), 2);
        assert_eq!(back.output_size(), 3);
    }
}
