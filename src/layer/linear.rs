use ndarray::Array2;

use crate::error::NnError;
use crate::layer::core::{LayerCore, LayerDescriptor};
use crate::tensor::Tensor;

/// Dense affine layer: `y = W*x + b`. `SparseLinear` shares this exact
/// implementation and differs only in its serialization tag — no
/// sparsity is enforced (spec §9 Open Question).
#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub core: LayerCore,
}

impl LinearLayer {
    pub fn new(input_size: usize, output_size: usize, display_name: impl Into<String>) -> Self {
        let descriptor = LayerDescriptor::flat(input_size, output_size, display_name);
        let mut core = LayerCore::new(descriptor);

        let bound = (6.0 / (input_size + output_size) as f64).sqrt();
        let mut w = Tensor::new(output_size, input_size);
        w.rand(-bound, bound);
        core.params.add("W", output_size, input_size).unwrap();
        *core.params.get("W").unwrap().borrow_mut() = w;

        core.params.add("b", output_size, 1).unwrap();
        core.grad.add("W", output_size, input_size).unwrap();
        core.grad.add("b", output_size, 1).unwrap();

        LinearLayer { core }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let x = self.core.x();
        let w = self.core.params.get("W").unwrap();
        let b = self.core.params.get("b").unwrap();
        let y = self.core.y();

        let batch = x.borrow().cols();
        let affine = w.borrow().as_array().dot(x.borrow().as_array())
            + &b.borrow().as_array().broadcast((w.borrow().rows(), batch)).unwrap().to_owned();
        *y.borrow_mut().as_array_mut() = affine;
    }

    pub fn backward(&mut self) -> Result<(), NnError> {
        let x = self.core.x();
        let w = self.core.params.get("W")?;
        let dy = self.core.dy();
        let dx = self.core.dx();

        let dw = dy.borrow().as_array().dot(&x.borrow().as_array().t());
        let db = dy.borrow().rowwise_sum();
        *self.core.grad.get("W")?.borrow_mut() = Tensor::from_array(dw);
        *self.core.grad.get("b")?.borrow_mut() = db;

        let new_dx = w.borrow().as_array().t().dot(dy.borrow().as_array());
        *dx.borrow_mut().as_array_mut() = new_dx;
        Ok(())
    }
}

/// Trivial passthrough layer with no learnable parameters: `y = x`,
/// `dx = dy`. Grounded in the source's `Identity` layer.
#[derive(Clone, Debug)]
pub struct IdentityLayer {
    pub core: LayerCore,
}

impl IdentityLayer {
    pub fn new(size: usize, display_name: impl Into<String>) -> Self {
        IdentityLayer {
            core: LayerCore::new(LayerDescriptor::flat(size, size, display_name)),
        }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let x = self.core.x();
        let y = self.core.y();
        let data: Array2<f64> = x.borrow().as_array().clone();
        *y.borrow_mut().as_array_mut() = data;
    }

    pub fn backward(&mut self) {
        let dy = self.core.dy();
        let dx = self.core.dx();
        let data = dy.borrow().as_array().clone();
        *dx.borrow_mut().as_array_mut() = data;
    }
}
