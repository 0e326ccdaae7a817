use ndarray::Array2;

use crate::layer::core::{LayerCore, LayerDescriptor};

/// Numerically stabilized softmax, no learnable parameters (spec
/// §4.6.7). The backward pass implements the layer's local
/// sigmoid-like derivative `dy*y*(1-y)`, not the full softmax Jacobian
/// — correct only when paired with a loss that already passes `p - t`
/// as the incoming gradient. Intentional; see the Design Notes.
#[derive(Clone, Debug)]
pub struct SoftmaxLayer {
    pub core: LayerCore,
}

impl SoftmaxLayer {
    pub fn new(size: usize, display_name: impl Into<String>) -> Self {
        SoftmaxLayer {
            core: LayerCore::new(LayerDescriptor::flat(size, size, display_name)),
        }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let x = self.core.x();
        let y = self.core.y();

        let xb = x.borrow();
        let max_row = xb.colwise_max();
        let (rows, cols) = (xb.rows(), xb.cols());
        let mut exp = Array2::zeros((rows, cols));
        for j in 0..cols {
            let m = max_row.as_array()[[0, j]];
            for i in 0..rows {
                exp[[i, j]] = (xb.as_array()[[i, j]] - m).exp();
            }
        }
        for j in 0..cols {
            let sum: f64 = exp.column(j).sum();
            for i in 0..rows {
                exp[[i, j]] /= sum;
            }
        }
        drop(xb);
        *y.borrow_mut().as_array_mut() = exp;
    }

    pub fn backward(&mut self) {
        let y = self.core.y();
        let dy = self.core.dy();
        let dx = self.core.dx();
        let yb = y.borrow();
        let local = yb.as_array() * &(1.0 - yb.as_array());
        let new_dx = dy.borrow().as_array() * &local;
        *dx.borrow_mut().as_array_mut() = new_dx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn softmax_matches_reference_column() {
        let mut layer = SoftmaxLayer::new(4, "softmax");
        layer.core.resize_batch(1);
        *layer.core.x().borrow_mut() = Tensor::from_array(
            ndarray::Array2::from_shape_vec((4, 1), vec![1.0, -1.0, -5.0, 0.5]).unwrap(),
        );
        layer.forward(false);
        let y = layer.core.y();
        let yb = y.borrow();
        let expected = [0.573281, 0.0775852, 0.00142102, 0.347713];
        for (i, e) in expected.iter().enumerate() {
            assert!((yb.as_array()[[i, 0]] - e).abs() < 1e-5);
        }
    }
}
