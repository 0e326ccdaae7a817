use ndarray::Array2;
use rayon::prelude::*;

use crate::error::NnError;
use crate::layer::core::{LayerCore, LayerDescriptor};
use crate::tensor::Tensor;

/// 2-D convolution with stride, `filters` output channels, `k x k`
/// kernels (spec §4.6.2). Per-batch-sample work is independent and runs
/// across a rayon thread pool; `dW`/`db` accumulation reduces per-sample
/// partial sums rather than sharing a mutable accumulator.
#[derive(Clone, Debug)]
pub struct ConvolutionLayer {
    pub core: LayerCore,
    pub filters: usize,
    pub k: usize,
    pub stride: usize,
}

impl ConvolutionLayer {
    pub fn new(
        height: usize,
        width: usize,
        in_depth: usize,
        filters: usize,
        k: usize,
        stride: usize,
        display_name: impl Into<String>,
    ) -> Result<Self, NnError> {
        if (height - k) % stride != 0 || (width - k) % stride != 0 {
            return Err(NnError::ShapeMismatch {
                expected: (height, width),
                actual: (k, k),
            });
        }
        let oh = (height - k) / stride + 1;
        let ow = (width - k) / stride + 1;

        let descriptor = LayerDescriptor {
            input_height: height,
            input_width: width,
            input_depth: in_depth,
            output_height: oh,
            output_width: ow,
            output_depth: filters,
            batch_size: 1,
            display_name: display_name.into(),
        };
        let mut core = LayerCore::new(descriptor);

        let in_size = height * width * in_depth;
        let out_size = oh * ow * filters;
        let bound = (6.0 / (in_size + out_size) as f64).sqrt();

        for f in 0..filters {
            for c in 0..in_depth {
                let mut w = Tensor::new(1, k * k);
                w.rand(-bound, bound);
                let name = format!("W_{f}_{c}");
                core.params.add(&name, 1, k * k).unwrap();
                *core.params.get(&name).unwrap().borrow_mut() = w;
                core.grad.add(&name, 1, k * k).unwrap();
            }
        }
        core.params.add("b", filters, 1).unwrap();
        core.grad.add("b", filters, 1).unwrap();

        Ok(ConvolutionLayer { core, filters, k, stride })
    }

    fn weight(&self, f: usize, c: usize) -> Tensor {
        self.core.params.get(&format!("W_{f}_{c}")).unwrap().borrow().clone()
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let d = self.core.descriptor.clone();
        let (h, w, in_depth, oh, ow, k, s) = (d.input_height, d.input_width, d.input_depth, d.output_height, d.output_width, self.k, self.stride);
        let batch = d.batch_size;

        let x = self.core.x();
        let y = self.core.y();
        let b_vec = self.core.params.get("b").unwrap();

        let xb = x.borrow();
        let weights: Vec<Vec<Tensor>> = (0..self.filters)
            .map(|f| (0..in_depth).map(|c| self.weight(f, c)).collect())
            .collect();
        let bias = b_vec.borrow().clone();

        let columns: Vec<Array2<f64>> = (0..batch)
            .into_par_iter()
            .map(|bi| {
                let mut col = Array2::<f64>::zeros((self.filters * oh * ow, 1));
                for f in 0..self.filters {
                    for oy in 0..oh {
                        for ox in 0..ow {
                            let mut acc = bias.as_array()[[f, 0]];
                            for c in 0..in_depth {
                                let wf = &weights[f][c];
                                for ky in 0..k {
                                    for kx in 0..k {
                                        let iy = oy * s + ky;
                                        let ix = ox * s + kx;
                                        let xi = c * (h * w) + iy * w + ix;
                                        acc += wf.as_array()[[0, ky * k + kx]] * xb.as_array()[[xi, bi]];
                                    }
                                }
                            }
                            let out_lin = f * (oh * ow) + oy * ow + ox;
                            col[[out_lin, 0]] = acc;
                        }
                    }
                }
                col
            })
            .collect();
        drop(xb);

        let out_size = self.filters * oh * ow;
        let mut out = Array2::<f64>::zeros((out_size, batch));
        for (bi, col) in columns.into_iter().enumerate() {
            out.column_mut(bi).assign(&col.column(0));
        }
        *y.borrow_mut().as_array_mut() = out;
    }

    pub fn backward(&mut self) -> Result<(), NnError> {
        let d = self.core.descriptor.clone();
        let (h, w, in_depth, oh, ow, k, s) = (d.input_height, d.input_width, d.input_depth, d.output_height, d.output_width, self.k, self.stride);
        let batch = d.batch_size;

        let x = self.core.x();
        let dy = self.core.dy();
        let dx = self.core.dx();

        let weights: Vec<Vec<Tensor>> = (0..self.filters)
            .map(|f| (0..in_depth).map(|c| self.weight(f, c)).collect())
            .collect();

        let xb = x.borrow();
        let dyb = dy.borrow();

        type Partial = (Array2<f64>, Vec<Vec<Array2<f64>>>, Array2<f64>);

        let partials: Vec<Partial> = (0..batch)
            .into_par_iter()
            .map(|bi| {
                let mut dx_col = Array2::<f64>::zeros((h * w * in_depth, 1));
                let mut dw_acc: Vec<Vec<Array2<f64>>> =
                    (0..self.filters).map(|_| (0..in_depth).map(|_| Array2::zeros((1, k * k))).collect()).collect();
                let mut db_acc = Array2::<f64>::zeros((self.filters, 1));

                for f in 0..self.filters {
                    for oy in 0..oh {
                        for ox in 0..ow {
                            let out_lin = f * (oh * ow) + oy * ow + ox;
                            let grad_val = dyb.as_array()[[out_lin, bi]];
                            db_acc[[f, 0]] += grad_val;

                            for c in 0..in_depth {
                                for ky in 0..k {
                                    for kx in 0..k {
                                        let iy = oy * s + ky;
                                        let ix = ox * s + kx;
                                        let xi = c * (h * w) + iy * w + ix;
                                        dw_acc[f][c][[0, ky * k + kx]] += xb.as_array()[[xi, bi]] * grad_val;
                                        dx_col[[xi, 0]] += weights[f][c].as_array()[[0, ky * k + kx]] * grad_val;
                                    }
                                }
                            }
                        }
                    }
                }
                (dx_col, dw_acc, db_acc)
            })
            .collect();
        drop(xb);
        drop(dyb);

        let mut dx_data = Array2::<f64>::zeros((h * w * in_depth, batch));
        let mut dw_total: Vec<Vec<Array2<f64>>> =
            (0..self.filters).map(|_| (0..in_depth).map(|_| Array2::zeros((1, k * k))).collect()).collect();
        let mut db_total = Array2::<f64>::zeros((self.filters, 1));

        for (bi, (dx_col, dw_acc, db_acc)) in partials.into_iter().enumerate() {
            dx_data.column_mut(bi).assign(&dx_col.column(0));
            db_total = db_total + db_acc;
            for f in 0..self.filters {
                for c in 0..in_depth {
                    dw_total[f][c] = &dw_total[f][c] + &dw_acc[f][c];
                }
            }
        }
        for f in 0..self.filters {
            for c in 0..in_depth {
                let name = format!("W_{f}_{c}");
                *self.core.grad.get(&name)?.borrow_mut() = Tensor::from_array(dw_total[f][c].clone());
            }
        }
        *self.core.grad.get("b")?.borrow_mut() = Tensor::from_array(db_total);
        *dx.borrow_mut().as_array_mut() = dx_data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn convolution_matches_ones_filter_reference() {
        let mut layer = ConvolutionLayer::new(5, 5, 1, 1, 3, 1, "conv").unwrap();
        layer.core.resize_batch(1);
        *layer.core.params.get("W_0_0").unwrap().borrow_mut() = Tensor::from_array(Array2::ones((1, 9)));
        *layer.core.params.get("b").unwrap().borrow_mut() = Tensor::new(1, 1);

        #[rustfmt::skip]
        let input = vec![
            1.0, 1.0, 1.0, 0.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 0.0,
            0.0, 0.0, 1.0, 1.0, 1.0,
            0.0, 0.0, 1.0, 1.0, 0.0,
            0.0, 0.0, 1.0, 1.0, 0.0,
        ];
        *layer.core.x().borrow_mut() = Tensor::from_array(Array2::from_shape_vec((25, 1), input).unwrap());
        layer.forward(false);

        let y = layer.core.y();
        let yb = y.borrow();
        let expected = [4.0, 3.0, 4.0, 2.0, 4.0, 3.0, 2.0, 3.0, 4.0];
        for (i, e) in expected.iter().enumerate() {
            assert_eq!(yb.as_array()[[i, 0]], *e);
        }
    }
}
