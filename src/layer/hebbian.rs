use ndarray::Array2;

use crate::error::NnError;
use crate::layer::core::{LayerCore, LayerDescriptor};
use crate::optimizer::ApplyMode;
use crate::tensor::Tensor;

/// Fully-connected layer trained by a Hebbian rule instead of gradient
/// descent. `y = W*x`, thresholded to a binary activation at 0.8.
/// `backward` is not a valid operation for this layer (spec §4.6.8).
#[derive(Clone, Debug)]
pub struct HebbianLinearLayer {
    pub core: LayerCore,
}

impl HebbianLinearLayer {
    pub fn new(input_size: usize, output_size: usize, display_name: impl Into<String>) -> Self {
        let mut core = LayerCore::new(LayerDescriptor::flat(input_size, output_size, display_name));
        let bound = (6.0 / (input_size + output_size) as f64).sqrt();
        let mut w = Tensor::new(output_size, input_size);
        w.rand(-bound, bound);
        core.params.add("W", output_size, input_size).unwrap();
        *core.params.get("W").unwrap().borrow_mut() = w;
        core.grad.add("W", output_size, input_size).unwrap();
        HebbianLinearLayer { core }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let x = self.core.x();
        let w = self.core.params.get("W").unwrap();
        let y = self.core.y();

        let raw = w.borrow().as_array().dot(x.borrow().as_array());
        let thresholded = raw.mapv(|v| if v > 0.8 { 1.0 } else { 0.0 });
        *y.borrow_mut().as_array_mut() = thresholded;
    }

    pub fn backward(&mut self) -> Result<(), NnError> {
        Err(NnError::IllegalOperation(
            "Backward propagation should not be used with layers using Hebbian learning",
        ))
    }
}

/// Binary correlator: connectivity `c` is the thresholded permanence
/// matrix `W`; `y = c*x`, thresholded at `proximal_threshold`. Update
/// re-derives `c` from `W` after the permanence optimizer step.
#[derive(Clone, Debug)]
pub struct BinaryCorrelatorLayer {
    pub core: LayerCore,
    pub permanence_threshold: f64,
    pub proximal_threshold: f64,
}

impl BinaryCorrelatorLayer {
    pub fn new(
        input_size: usize,
        output_size: usize,
        permanence_threshold: f64,
        proximal_threshold: f64,
        display_name: impl Into<String>,
    ) -> Self {
        let mut core = LayerCore::new(LayerDescriptor::flat(input_size, output_size, display_name));
        let mut w = Tensor::new(output_size, input_size);
        w.rand(0.0, 1.0);
        core.params.add("W", output_size, input_size).unwrap();
        *core.params.get("W").unwrap().borrow_mut() = w;
        core.grad.add("W", output_size, input_size).unwrap();
        core.memory.add("c", output_size, input_size).unwrap();
        BinaryCorrelatorLayer {
            core,
            permanence_threshold,
            proximal_threshold,
        }
    }

    fn connectivity(&self) -> Array2<f64> {
        self.core
            .params
            .get("W")
            .unwrap()
            .borrow()
            .as_array()
            .mapv(|v| if v > self.permanence_threshold { 1.0 } else { 0.0 })
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let c = self.connectivity();
        let x = self.core.x();
        let y = self.core.y();
        let raw = c.dot(x.borrow().as_array());
        let thresholded = raw.mapv(|v| if v > self.proximal_threshold { 1.0 } else { 0.0 });
        *y.borrow_mut().as_array_mut() = thresholded;
    }

    pub fn backward(&mut self) -> Result<(), NnError> {
        Err(NnError::IllegalOperation(
            "Backward propagation should not be used with layers using Hebbian learning",
        ))
    }

    pub fn refresh_connectivity(&mut self) {
        let c = self.connectivity();
        *self.core.memory.get("c").unwrap().borrow_mut() = Tensor::from_array(c);
    }
}

/// Convolutional Hebbian layer: packs overlapping patches into
/// `memory["x2col"]`, computes `y = ReLU(W * x2col)`, and is trained by
/// `NormalizedZeroSumHebbianRule` against `x2col`/`y` (spec §4.6.8).
#[derive(Clone, Debug)]
pub struct ConvHebbianLayer {
    pub core: LayerCore,
    pub filters: usize,
    pub k: usize,
    pub stride: usize,
}

impl ConvHebbianLayer {
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
        let patches = oh * ow;
        let patch_size = k * k * in_depth;

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

        let mut w = Tensor::new(filters, patch_size);
        w.rand(-0.1, 0.1);
        core.params.add("W", filters, patch_size).unwrap();
        *core.params.get("W").unwrap().borrow_mut() = w;
        core.grad.add("W", filters, patch_size).unwrap();
        core.memory.add("x2col", patch_size, patches).unwrap();

        Ok(ConvHebbianLayer { core, filters, k, stride })
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let d = self.core.descriptor.clone();
        let (h, w, in_depth, oh, ow, k, s) = (d.input_height, d.input_width, d.input_depth, d.output_height, d.output_width, self.k, self.stride);
        let batch = d.batch_size;
        let patches = oh * ow;
        let patch_size = k * k * in_depth;

        let x = self.core.x();
        let y = self.core.y();
        let weights = self.core.params.get("W").unwrap();

        // Single-sample packing: batch_size is expected to be 1 for the
        // Hebbian training path (one image per update).
        let xb = x.borrow();
        let mut x2col = Array2::<f64>::zeros((patch_size, patches));
        for oy in 0..oh {
            for ox in 0..ow {
                let col = oy * ow + ox;
                let mut row = 0;
                for c in 0..in_depth {
                    for ky in 0..k {
                        for kx in 0..k {
                            let iy = oy * s + ky;
                            let ix = ox * s + kx;
                            let xi = c * (h * w) + iy * w + ix;
                            x2col[[row, col]] = xb.as_array()[[xi, 0]];
                            row += 1;
                        }
                    }
                }
            }
        }
        drop(xb);

        let raw = weights.borrow().as_array().dot(&x2col);
        let activated = raw.mapv(|v| v.max(0.0));

        let mut out = Array2::<f64>::zeros((self.filters * patches, batch));
        for p in 0..patches {
            for f in 0..self.filters {
                out[[f * patches + p, 0]] = activated[[f, p]];
            }
        }
        *y.borrow_mut().as_array_mut() = out;
        self.core.memory.set("x2col", crate::tensor::handle(Tensor::from_array(x2col))).unwrap();
    }

    pub fn backward(&mut self) -> Result<(), NnError> {
        Err(NnError::IllegalOperation(
            "Backward propagation should not be used with layers using Hebbian learning",
        ))
    }

    /// Trains `W` straight from `memory["x2col"]` and the per-patch
    /// activations, rather than the raw `state["x"]`/`state["y"]` pair
    /// `LayerCore::update` uses — the flattened `state["y"]` is
    /// `(filters * patches, 1)` and can't stand in for the
    /// `(filters, patches)` shape a Hebbian rule needs to pair against
    /// `x2col` (spec §4.6.8).
    pub fn update(&mut self, lr: f64, decay: f64) -> Result<(), NnError> {
        let patches = self.core.descriptor.output_height * self.core.descriptor.output_width;
        let x2col = self.core.memory.get("x2col")?;
        let y = self.core.y();

        let activations = {
            let yb = y.borrow();
            let mut out = Array2::<f64>::zeros((self.filters, patches));
            for p in 0..patches {
                for f in 0..self.filters {
                    out[[f, p]] = yb.as_array()[[f * patches + p, 0]];
                }
            }
            Tensor::from_array(out)
        };

        for (name, opt) in &mut self.core.optimizers {
            let param = self.core.params.get(name)?;
            match opt.apply_mode() {
                ApplyMode::GradientDescent => {
                    let grad = self.core.grad.get(name)?;
                    let delta = opt.compute_update(&param.borrow(), &grad.borrow(), lr);
                    let mut p = param.borrow_mut();
                    *p.as_array_mut() = p.as_array() * (1.0 - decay) - delta.as_array();
                }
                ApplyMode::Hebbian => {
                    let delta = opt.compute_update(&x2col.borrow(), &activations, lr);
                    let mut p = param.borrow_mut();
                    *p.as_array_mut() = p.as_array() + delta.as_array();
                }
            }
            opt.post_update(&mut param.borrow_mut());
        }
        Ok(())
    }
}
