use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::NnError;
use crate::layer::{Layer, LayerTypeTag};
use crate::loss::Loss;
use crate::optimizer::Optimizer;
use crate::tensor::{handle, Tensor, TensorHandle};

/// Ordered list of layers plus the `connected` aliasing flag (spec
/// §3/§4.7, C7). Drives batched forward/backward/update, resizing, and
/// versioned save/load.
#[derive(Clone, Debug, Default)]
pub struct Network {
    display_name: String,
    layers: Vec<Layer>,
    connected: bool,
}

const ARCHIVE_VERSION: u32 = 1;

impl Network {
    pub fn new(display_name: impl Into<String>) -> Self {
        Network {
            display_name: display_name.into(),
            layers: Vec::new(),
            connected: false,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn push_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
        self.connected = false;
    }

    pub fn pop_layers(&mut self, n: usize) -> Result<(), NnError> {
        if n > self.layers.len() {
            return Err(NnError::OutOfRange { index: n, size: self.layers.len() });
        }
        let new_len = self.layers.len() - n;
        self.layers.truncate(new_len);
        self.connected = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, i: usize) -> Result<&Layer, NnError> {
        self.layers.get(i).ok_or(NnError::OutOfRange { index: i, size: self.layers.len() })
    }

    pub fn layer_mut(&mut self, i: usize) -> Result<&mut Layer, NnError> {
        let size = self.layers.len();
        self.layers.get_mut(i).ok_or(NnError::OutOfRange { index: i, size })
    }

    pub fn install_optimizer<F>(&mut self, factory: F)
    where
        F: Fn(usize, usize) -> Box<dyn Optimizer> + Clone,
    {
        for layer in &mut self.layers {
            layer.install_optimizer(factory.clone());
        }
    }

    pub fn resize_batch(&mut self, b: usize) {
        if self.layers.is_empty() {
            return;
        }
        if self.layers[0].core().descriptor.batch_size == b {
            return;
        }
        for layer in &mut self.layers {
            layer.resize_batch(b);
        }
        self.connected = false;
    }

    fn establish_connections(&mut self) {
        if self.connected || self.layers.len() < 2 {
            self.connected = true;
            return;
        }
        for i in 0..self.layers.len() - 1 {
            let y = self.layers[i].core().y();
            let dy = self.layers[i].core().dy();
            self.layers[i + 1].core_mut().state.set("x", y).unwrap();
            self.layers[i + 1].core_mut().grad.set("x", dy).unwrap();
        }
        self.connected = true;
    }

    pub fn forward(&mut self, x: &TensorHandle, test_mode: bool) -> Result<(), NnError> {
        if self.layers.is_empty() {
            return Ok(());
        }
        let batch = x.borrow().cols();
        self.resize_batch(batch);
        self.establish_connections();

        let data = x.borrow().as_array().clone();
        *self.layers[0].core_mut().x().borrow_mut().as_array_mut() = data;

        for layer in &mut self.layers {
            layer.forward(test_mode);
        }
        Ok(())
    }

    pub fn backward(&mut self, dy: &TensorHandle) -> Result<(), NnError> {
        if self.layers.is_empty() {
            return Ok(());
        }
        let data = dy.borrow().as_array().clone();
        let last = self.layers.len() - 1;
        *self.layers[last].core_mut().dy().borrow_mut().as_array_mut() = data;

        for layer in self.layers.iter_mut().rev() {
            layer.backward()?;
        }
        Ok(())
    }

    pub fn update(&mut self, lr: f64, decay: f64) -> Result<(), NnError> {
        if self.layers.is_empty() {
            return Ok(());
        }
        let batch = self.layers[0].core().descriptor.batch_size.max(1);
        let lr_effective = lr / batch as f64;
        for layer in &mut self.layers {
            layer.update(lr_effective, decay)?;
        }
        Ok(())
    }

    pub fn predictions(&self) -> Result<TensorHandle, NnError> {
        let last = self.layers.len().checked_sub(1).ok_or(NnError::OutOfRange { index: 0, size: 0 })?;
        Ok(self.layers[last].core().y())
    }

    pub fn count_correct_predictions(&self, targets: &Tensor, predictions: &Tensor) -> usize {
        let t_idx = targets.colwise_max_index();
        let p_idx = predictions.colwise_max_index();
        t_idx.iter().zip(p_idx.iter()).filter(|(a, b)| a == b).count()
    }

    pub fn save(&self, path: &str) -> Result<(), NnError> {
        let archive = NetworkArchive {
            version: ARCHIVE_VERSION,
            network_name: self.display_name.clone(),
            layer_count: self.layers.len(),
            layers: self.layers.clone(),
        };
        let text = serde_json::to_string_pretty(&archive).map_err(|e| NnError::IoFailure(e.to_string()))?;
        fs::write(path, text).map_err(|e| NnError::IoFailure(e.to_string()))?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self, NnError> {
        let text = fs::read_to_string(path).map_err(|e| NnError::IoFailure(e.to_string()))?;

        let raw: serde_json::Value = serde_json::from_str(&text).map_err(|e| NnError::IoFailure(e.to_string()))?;
        if let Some(layers) = raw.get("layers").and_then(|v| v.as_array()) {
            for layer in layers {
                if let Some(tag) = layer.get("layer_type_tag").and_then(|v| v.as_str()) {
                    if serde_json::from_value::<LayerTypeTag>(serde_json::Value::String(tag.to_string())).is_err() {
                        return Err(NnError::UnknownType(tag.to_string()));
                    }
                }
            }
        }

        let archive: NetworkArchive = serde_json::from_str(&text).map_err(|e| NnError::IoFailure(e.to_string()))?;
        Ok(Network {
            display_name: archive.network_name,
            layers: archive.layers,
            connected: false,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct NetworkArchive {
    version: u32,
    network_name: String,
    layer_count: usize,
    layers: Vec<Layer>,
}

/// Specialization of `Network` that owns a loss function and defines
/// `train`/`test` (spec §4.8, C8).
#[derive(Clone, Debug)]
pub struct BackpropagationNetwork {
    pub network: Network,
    pub loss: Box<dyn Loss>,
}

impl BackpropagationNetwork {
    pub fn new(display_name: impl Into<String>, loss: Box<dyn Loss>) -> Self {
        BackpropagationNetwork {
            network: Network::new(display_name),
            loss,
        }
    }

    pub fn train(&mut self, x: &Tensor, y_target: &Tensor, lr: f64, decay: f64) -> Result<f64, NnError> {
        let xh = handle(x.clone());
        self.network.forward(&xh, false)?;
        let predicted = self.network.predictions()?;
        let dy = self.loss.gradient(y_target, &predicted.borrow());
        self.network.backward(&handle(dy))?;
        self.network.update(lr, decay)?;
        Ok(self.loss.mean(y_target, &predicted.borrow()))
    }

    pub fn test(&mut self, x: &Tensor, y_target: &Tensor) -> Result<f64, NnError> {
        let xh = handle(x.clone());
        self.network.forward(&xh, true)?;
        let predicted = self.network.predictions()?;
        Ok(self.loss.mean(y_target, &predicted.borrow()))
    }
}

/// Specialization that performs only `forward` + `update` on `train`,
/// with no loss and no backward pass (spec §4.9, C9).
#[derive(Clone, Debug, Default)]
pub struct HebbianNetwork {
    pub network: Network,
}

impl HebbianNetwork {
    pub fn new(display_name: impl Into<String>) -> Self {
        HebbianNetwork {
            network: Network::new(display_name),
        }
    }

    pub fn train(&mut self, x: &Tensor, lr: f64) -> Result<(), NnError> {
        let xh = handle(x.clone());
        self.network.forward(&xh, false)?;
        self.network.update(lr, 0.0)?;
        Ok(())
    }

    pub fn test(&mut self, x: &Tensor) -> Result<TensorHandle, NnError> {
        let xh = handle(x.clone());
        self.network.forward(&xh, true)?;
        self.network.predictions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::activation::{ActivationKind, ActivationLayer};
    use crate::layer::linear::LinearLayer;
    use crate::loss::SquaredErrorLoss;
    use ndarray::Array2;

    #[test]
    fn two_layer_sigmoid_network_single_step_matches_reference() {
        let mut net = BackpropagationNetwork::new("mazur", Box::new(SquaredErrorLoss));
        let mut l1 = LinearLayer::new(2, 2, "linear1");
        *l1.core.params.get("W").unwrap().borrow_mut() =
            Tensor::from_array(Array2::from_shape_vec((2, 2), vec![0.15, 0.20, 0.25, 0.30]).unwrap());
        *l1.core.params.get("b").unwrap().borrow_mut() = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![0.35, 0.35]).unwrap());
        net.network.push_layer(Layer::Linear(l1));
        net.network.push_layer(Layer::Sigmoid(ActivationLayer::new(ActivationKind::Sigmoid, 2, "sigmoid1")));

        let mut l2 = LinearLayer::new(2, 2, "linear2");
        *l2.core.params.get("W").unwrap().borrow_mut() =
            Tensor::from_array(Array2::from_shape_vec((2, 2), vec![0.40, 0.45, 0.50, 0.55]).unwrap());
        *l2.core.params.get("b").unwrap().borrow_mut() = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![0.60, 0.60]).unwrap());
        net.network.push_layer(Layer::Linear(l2));
        net.network.push_layer(Layer::Sigmoid(ActivationLayer::new(ActivationKind::Sigmoid, 2, "sigmoid2")));

        net.network.install_optimizer(|r, c| Box::new(crate::optimizer::GradientDescent::new(r, c)));

        let x = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![0.05, 0.10]).unwrap());
        let t = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![0.01, 0.99]).unwrap());

        let loss = net.train(&x, &t, 0.5, 0.0).unwrap();
        assert!((loss - 0.298371).abs() < 1e-5);

        let w2 = net.network.layer(2).unwrap().core().params.get("W").unwrap();
        let w2 = w2.borrow();
        assert!((w2.as_array()[[0, 0]] - 0.358916).abs() < 1e-5);
        assert!((w2.as_array()[[0, 1]] - 0.408666).abs() < 1e-5);
        assert!((w2.as_array()[[1, 0]] - 0.511301).abs() < 1e-5);
        assert!((w2.as_array()[[1, 1]] - 0.56137).abs() < 1e-5);
    }

    #[test]
    fn pop_layers_out_of_range_fails() {
        let mut net = Network::new("n");
        net.push_layer(Layer::Linear(LinearLayer::new(1, 1, "l")));
        assert!(matches!(net.pop_layers(2), Err(NnError::OutOfRange { .. })));
    }
}
