use crate::layer::core::{LayerCore, LayerDescriptor};

#[derive(Clone, Copy, Debug)]
pub enum ActivationKind {
    ReLU,
    Sigmoid,
    ELU,
}

/// Element-wise activation with no learnable parameters (spec §4.6.6).
#[derive(Clone, Debug)]
pub struct ActivationLayer {
    pub core: LayerCore,
    pub kind: ActivationKind,
}

impl ActivationLayer {
    pub fn new(kind: ActivationKind, size: usize, display_name: impl Into<String>) -> Self {
        ActivationLayer {
            core: LayerCore::new(LayerDescriptor::flat(size, size, display_name)),
            kind,
        }
    }

    pub fn forward(&mut self, _test_mode: bool) {
        let x = self.core.x();
        let y = self.core.y();
        let out = match self.kind {
            ActivationKind::ReLU => x.borrow().as_array().mapv(|v| v.max(0.0)),
            ActivationKind::Sigmoid => x.borrow().as_array().mapv(|v| 1.0 / (1.0 + (-v).exp())),
            ActivationKind::ELU => x.borrow().as_array().mapv(|v| if v > 0.0 { v } else { v.exp() - 1.0 }),
        };
        *y.borrow_mut().as_array_mut() = out;
    }

    pub fn backward(&mut self) {
        let y = self.core.y();
        let dy = self.core.dy();
        let dx = self.core.dx();

        let local = match self.kind {
            ActivationKind::ReLU => y.borrow().as_array().mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            ActivationKind::Sigmoid => y.borrow().as_array().mapv(|v| v * (1.0 - v)),
            ActivationKind::ELU => y.borrow().as_array().mapv(|v| if v > 0.0 { 1.0 } else { v.exp() }),
        };
        let new_dx = dy.borrow().as_array() * &local;
        *dx.borrow_mut().as_array_mut() = new_dx;
    }
}
