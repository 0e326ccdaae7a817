use ndarray::Array2;

use crate::layer::core::{LayerCore, LayerDescriptor};

/// Adds a zero border of width `p` to every channel. No learnable
/// parameters. `CroppingLayer` is the mirror-image inverse (spec
/// §4.6.4); both zero their output tensor explicitly before copying,
/// per the Design Notes resolution of the Padding-backward ambiguity.
#[derive(Clone, Debug)]
pub struct PaddingLayer {
    pub core: LayerCore,
    pub p: usize,
}

impl PaddingLayer {
    pub fn new(height: usize, width: usize, depth: usize, p: usize, display_name: impl Into<String>) -> Self {
        let descriptor = LayerDescriptor {
            input_height: height,
            input_width: width,
            input_depth: depth,
            output_height: height + 2 * p,
            output_width: width + 2 * p,
            output_depth: depth,
            batch_size: 1,
            display_name: display_name.into(),
        };
        PaddingLayer {
            core: LayerCore::new(descriptor),
            p,
        }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let d = self.core.descriptor.clone();
        let (h, w, c, p, batch) = (d.input_height, d.input_width, d.input_depth, self.p, d.batch_size);
        let (oh, ow) = (d.output_height, d.output_width);

        let x = self.core.x();
        let y = self.core.y();
        let xb = x.borrow();
        let mut out = Array2::<f64>::zeros((oh * ow * c, batch));
        for b in 0..batch {
            for ch in 0..c {
                for iy in 0..h {
                    for ix in 0..w {
                        let src = ch * (h * w) + iy * w + ix;
                        let dst = ch * (oh * ow) + (iy + p) * ow + (ix + p);
                        out[[dst, b]] = xb.as_array()[[src, b]];
                    }
                }
            }
        }
        drop(xb);
        *y.borrow_mut().as_array_mut() = out;
    }

    pub fn backward(&mut self) {
        let d = self.core.descriptor.clone();
        let (h, w, c, p, batch) = (d.input_height, d.input_width, d.input_depth, self.p, d.batch_size);
        let (oh, ow) = (d.output_height, d.output_width);

        let dy = self.core.dy();
        let dx = self.core.dx();
        let dyb = dy.borrow();
        let mut dx_data = Array2::<f64>::zeros((h * w * c, batch));
        for b in 0..batch {
            for ch in 0..c {
                for iy in 0..h {
                    for ix in 0..w {
                        let src = ch * (oh * ow) + (iy + p) * ow + (ix + p);
                        let dst = ch * (h * w) + iy * w + ix;
                        dx_data[[dst, b]] = dyb.as_array()[[src, b]];
                    }
                }
            }
        }
        *dx.borrow_mut().as_array_mut() = dx_data;
    }
}

/// Removes a border of width `p` from every channel; the exact inverse
/// of `PaddingLayer`'s forward/backward pair.
#[derive(Clone, Debug)]
pub struct CroppingLayer {
    pub core: LayerCore,
    pub p: usize,
}

impl CroppingLayer {
    pub fn new(height: usize, width: usize, depth: usize, p: usize, display_name: impl Into<String>) -> Self {
        let descriptor = LayerDescriptor {
            input_height: height,
            input_width: width,
            input_depth: depth,
            output_height: height - 2 * p,
            output_width: width - 2 * p,
            output_depth: depth,
            batch_size: 1,
            display_name: display_name.into(),
        };
        CroppingLayer {
            core: LayerCore::new(descriptor),
            p,
        }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let d = self.core.descriptor.clone();
        let (h, w, c, p, batch) = (d.input_height, d.input_width, d.input_depth, self.p, d.batch_size);
        let (oh, ow) = (d.output_height, d.output_width);

        let x = self.core.x();
        let y = self.core.y();
        let xb = x.borrow();
        let mut out = Array2::<f64>::zeros((oh * ow * c, batch));
        for b in 0..batch {
            for ch in 0..c {
                for oy in 0..oh {
                    for ox in 0..ow {
                        let src = ch * (h * w) + (oy + p) * w + (ox + p);
                        let dst = ch * (oh * ow) + oy * ow + ox;
                        out[[dst, b]] = xb.as_array()[[src, b]];
                    }
                }
            }
        }
        drop(xb);
        *y.borrow_mut().as_array_mut() = out;
    }

    pub fn backward(&mut self) {
        let d = self.core.descriptor.clone();
        let (h, w, c, p, batch) = (d.input_height, d.input_width, d.input_depth, self.p, d.batch_size);
        let (oh, ow) = (d.output_height, d.output_width);

        let dy = self.core.dy();
        let dx = self.core.dx();
        let dyb = dy.borrow();
        // Explicitly zero before scattering the cropped region back in.
        let mut dx_data = Array2::<f64>::zeros((h * w * c, batch));
        for b in 0..batch {
            for ch in 0..c {
                for oy in 0..oh {
                    for ox in 0..ow {
                        let src = ch * (oh * ow) + oy * ow + ox;
                        let dst = ch * (h * w) + (oy + p) * w + (ox + p);
                        dx_data[[dst, b]] = dyb.as_array()[[src, b]];
                    }
                }
            }
        }
        *dx.borrow_mut().as_array_mut() = dx_data;
    }
}
