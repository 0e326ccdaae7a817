use ndarray::Array2;
use rand::Rng;

use crate::layer::core::{LayerCore, LayerDescriptor};
use crate::tensor::{handle, Tensor};

/// Inverted dropout with no learnable parameters (spec §4.6.5).
#[derive(Clone, Debug)]
pub struct DropoutLayer {
    pub core: LayerCore,
    pub keep_ratio: f64,
}

impl DropoutLayer {
    pub fn new(size: usize, keep_ratio: f64, display_name: impl Into<String>) -> Self {
        let mut core = LayerCore::new(LayerDescriptor::flat(size, size, display_name));
        let batch = core.descriptor.batch_size;
        core.memory.add("mask", size, batch).unwrap();
        DropoutLayer { core, keep_ratio }
    }

    pub fn forward(&mut self, test_mode: bool) {
        let x = self.core.x();
        let y = self.core.y();

        if test_mode {
            let data = x.borrow().as_array().clone();
            *y.borrow_mut().as_array_mut() = data;
            return;
        }

        let (rows, cols) = (x.borrow().rows(), x.borrow().cols());
        let mut rng = rand::thread_rng();
        let mask = Array2::from_shape_fn((rows, cols), |_| {
            if rng.gen::<f64>() < self.keep_ratio {
                1.0
            } else {
                0.0
            }
        });

        let out = x.borrow().as_array() * &mask / self.keep_ratio;
        *y.borrow_mut().as_array_mut() = out;
        self.core.memory.set("mask", handle(Tensor::from_array(mask))).unwrap();
    }

    pub fn backward(&mut self) {
        let dy = self.core.dy();
        let dx = self.core.dx();
        let mask = self.core.memory.get("mask").unwrap();
        let new_dx = dy.borrow().as_array() * mask.borrow().as_array();
        *dx.borrow_mut().as_array_mut() = new_dx;
    }
}
