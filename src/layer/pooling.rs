use ndarray::Array2;

use crate::layer::core::{LayerCore, LayerDescriptor};
use crate::tensor::{handle, Tensor};

/// Non-overlapping max pooling with stride equal to window size `k`
/// (spec §4.6.3). Operates on a single-channel spatial grid; multi-
/// channel inputs are handled by tiling this layer's im2col-free
/// per-channel loop across `input_depth`.
#[derive(Clone, Debug)]
pub struct MaxPoolingLayer {
    pub core: LayerCore,
    pub k: usize,
}

impl MaxPoolingLayer {
    pub fn new(height: usize, width: usize, depth: usize, k: usize, display_name: impl Into<String>) -> Self {
        let oh = height / k;
        let ow = width / k;
        let descriptor = LayerDescriptor {
            input_height: height,
            input_width: width,
            input_depth: depth,
            output_height: oh,
            output_width: ow,
            output_depth: depth,
            batch_size: 1,
            display_name: display_name.into(),
        };
        let mut core = LayerCore::new(descriptor);
        let out_size = oh * ow * depth;
        core.memory.add("pooling_map", out_size, 1).unwrap();
        MaxPoolingLayer { core, k }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let d = &self.core.descriptor;
        let (h, w, c, oh, ow, k) = (d.input_height, d.input_width, d.input_depth, d.output_height, d.output_width, self.k);
        let batch = d.batch_size;

        let x = self.core.x();
        let y = self.core.y();
        let xb = x.borrow();
        let out_size = oh * ow * c;
        let mut out = Array2::<f64>::zeros((out_size, batch));
        let mut map = Array2::<f64>::zeros((out_size, batch));

        for b in 0..batch {
            for ch in 0..c {
                for oy in 0..oh {
                    for ox in 0..ow {
                        let mut best_idx = 0usize;
                        let mut best_val = f64::NEG_INFINITY;
                        for wy in 0..k {
                            for wx in 0..k {
                                let iy = oy * k + wy;
                                let ix = ox * k + wx;
                                let lin = ch * (h * w) + iy * w + ix;
                                let v = xb.as_array()[[lin, b]];
                                if v > best_val {
                                    best_val = v;
                                    best_idx = lin;
                                }
                            }
                        }
                        let out_lin = ch * (oh * ow) + oy * ow + ox;
                        out[[out_lin, b]] = best_val;
                        map[[out_lin, b]] = best_idx as f64;
                    }
                }
            }
        }
        drop(xb);
        *y.borrow_mut().as_array_mut() = out;
        self.core.memory.set("pooling_map", handle(Tensor::from_array(map))).unwrap();
    }

    pub fn backward(&mut self) {
        let d = &self.core.descriptor;
        let in_size = d.input_size();
        let batch = d.batch_size;

        let dy = self.core.dy();
        let dx = self.core.dx();
        let map = self.core.memory.get("pooling_map").unwrap();

        let mut dx_data = Array2::<f64>::zeros((in_size, batch));
        let dyb = dy.borrow();
        let map_b = map.borrow();
        for b in 0..batch {
            for i in 0..dyb.rows() {
                let src = map_b.as_array()[[i, b]] as usize;
                dx_data[[src, b]] = dyb.as_array()[[i, b]];
            }
        }
        *dx.borrow_mut().as_array_mut() = dx_data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn pools_four_by_four_into_two_by_two() {
        let mut layer = MaxPoolingLayer::new(4, 4, 1, 2, "pool");
        layer.core.resize_batch(1);
        let input: Vec<f64> = (1..=16).map(|v| v as f64).collect();
        *layer.core.x().borrow_mut() = Tensor::from_array(Array2::from_shape_vec((16, 1), input).unwrap());
        layer.forward(false);
        let y = layer.core.y();
        let yb = y.borrow();
        assert_eq!(yb.as_array()[[0, 0]], 6.0);
        assert_eq!(yb.as_array()[[1, 0]], 8.0);
        assert_eq!(yb.as_array()[[2, 0]], 14.0);
        assert_eq!(yb.as_array()[[3, 0]], 16.0);
    }
}
