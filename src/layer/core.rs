use crate::bag::NamedTensorBag;
use crate::error::NnError;
use crate::loss::Loss;
use crate::optimizer::{ApplyMode, Optimizer};
use crate::tensor::{handle, Tensor, TensorHandle};

/// Shape metadata every layer carries (spec §3, "Layer descriptor").
#[derive(Clone, Debug)]
pub struct LayerDescriptor {
    pub input_height: usize,
    pub input_width: usize,
    pub input_depth: usize,
    pub output_height: usize,
    pub output_width: usize,
    pub output_depth: usize,
    pub batch_size: usize,
    pub display_name: String,
}

impl LayerDescriptor {
    pub fn flat(input_size: usize, output_size: usize, display_name: impl Into<String>) -> Self {
        LayerDescriptor {
            input_height: input_size,
            input_width: 1,
            input_depth: 1,
            output_height: output_size,
            output_width: 1,
            output_depth: 1,
            batch_size: 1,
            display_name: display_name.into(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_height * self.input_width * self.input_depth
    }

    pub fn output_size(&self) -> usize {
        self.output_height * self.output_width * self.output_depth
    }
}

/// The four named-tensor bags every layer owns, plus the per-parameter
/// optimizer array and shape descriptor (spec §3 "Layer state", C5).
#[derive(Clone, Debug)]
pub struct LayerCore {
    pub descriptor: LayerDescriptor,
    pub state: NamedTensorBag,
    pub grad: NamedTensorBag,
    pub params: NamedTensorBag,
    pub memory: NamedTensorBag,
    pub optimizers: Vec<(String, Box<dyn Optimizer>)>,
}

impl LayerCore {
    pub fn new(descriptor: LayerDescriptor) -> Self {
        let in_size = descriptor.input_size();
        let out_size = descriptor.output_size();
        let batch = descriptor.batch_size;

        let mut state = NamedTensorBag::new(format!("{}.state", descriptor.display_name));
        state.add("x", in_size, batch).unwrap();
        state.add("y", out_size, batch).unwrap();

        let mut grad = NamedTensorBag::new(format!("{}.grad", descriptor.display_name));
        grad.add("x", in_size, batch).unwrap();
        grad.add("y", out_size, batch).unwrap();

        LayerCore {
            descriptor,
            state,
            grad,
            params: NamedTensorBag::new("params"),
            memory: NamedTensorBag::new("memory"),
            optimizers: Vec::new(),
        }
    }

    pub fn x(&self) -> TensorHandle {
        self.state.get("x").unwrap()
    }

    pub fn y(&self) -> TensorHandle {
        self.state.get("y").unwrap()
    }

    pub fn dx(&self) -> TensorHandle {
        self.grad.get("x").unwrap()
    }

    pub fn dy(&self) -> TensorHandle {
        self.grad.get("y").unwrap()
    }

    /// Replaces every parameter's optimizer with a fresh instance built
    /// by `factory(rows, cols)`, matching the parameter's shape.
    pub fn install_optimizer<F>(&mut self, factory: F)
    where
        F: Fn(usize, usize) -> Box<dyn Optimizer>,
    {
        self.optimizers.clear();
        for name in self.params.keys().map(str::to_string).collect::<Vec<_>>() {
            let p = self.params.get(&name).unwrap();
            let (r, c) = (p.borrow().rows(), p.borrow().cols());
            self.optimizers.push((name, factory(r, c)));
        }
    }

    /// Resizes `state["x"]`, `state["y"]`, `grad["x"]`, `grad["y"]`, and
    /// any memory tensors keyed to batch size, to column count `b`.
    /// Parameter shapes are untouched.
    pub fn resize_batch(&mut self, b: usize) {
        if self.descriptor.batch_size == b {
            return;
        }
        let in_size = self.descriptor.input_size();
        let out_size = self.descriptor.output_size();
        self.state.set("x", handle(Tensor::new(in_size, b))).unwrap();
        self.state.set("y", handle(Tensor::new(out_size, b))).unwrap();
        self.grad.set("x", handle(Tensor::new(in_size, b))).unwrap();
        self.grad.set("y", handle(Tensor::new(out_size, b))).unwrap();
        self.descriptor.batch_size = b;
    }

    /// Default `update`: for each learnable parameter, invoke its
    /// optimizer and fold the delta back in according to its apply
    /// mode (spec §4.5). Hebbian rules read `state["x"]`/`state["y"]`
    /// as the `(a, b)` pair; gradient-based rules read
    /// `params[name]`/`grad[name]`.
    pub fn update(&mut self, lr: f64, decay: f64) -> Result<(), NnError> {
        let x = self.x();
        let y = self.y();
        for (name, opt) in &mut self.optimizers {
            let param = self.params.get(name)?;
            match opt.apply_mode() {
                ApplyMode::GradientDescent => {
                    let grad = self.grad.get(name)?;
                    let delta = opt.compute_update(&param.borrow(), &grad.borrow(), lr);
                    let mut p = param.borrow_mut();
                    *p.as_array_mut() = p.as_array() * (1.0 - decay) - delta.as_array();
                }
                ApplyMode::Hebbian => {
                    let delta = opt.compute_update(&x.borrow(), &y.borrow(), lr);
                    let mut p = param.borrow_mut();
                    *p.as_array_mut() = p.as_array() + delta.as_array();
                }
            }
            opt.post_update(&mut param.borrow_mut());
        }
        Ok(())
    }

    /// Finite-difference check of `backward`'s analytic gradient for one
    /// learnable parameter (spec §4.5). `forward` must already have been
    /// invoked by the caller against the perturbed parameter for each
    /// sample; this helper only perturbs and restores values and scores
    /// the loss at each offset.
    pub fn numerical_gradient<F>(
        param: &mut Tensor,
        target: &Tensor,
        loss: &dyn Loss,
        delta: f64,
        mut run_forward: F,
    ) -> Tensor
    where
        F: FnMut(&Tensor) -> Tensor,
    {
        let (rows, cols) = (param.rows(), param.cols());
        let mut grad = Tensor::new(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                let original = param.as_array()[[i, j]];

                param.as_array_mut()[[i, j]] = original + delta;
                let plus = loss.value(target, &run_forward(param));

                param.as_array_mut()[[i, j]] = original - delta;
                let minus = loss.value(target, &run_forward(param));

                param.as_array_mut()[[i, j]] = original;
                grad.as_array_mut()[[i, j]] = (plus - minus) / (2.0 * delta);
            }
        }
        grad
    }
}
