use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::dyn_clone;
use crate::tensor::Tensor;

/// How a computed `delta` is folded back into the parameter it updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    /// `param := (1 - decay) * param - delta` (gradient-based rules).
    GradientDescent,
    /// `param := param + delta` (Hebbian-style rules; no loss, no decay).
    Hebbian,
}

/// Per-parameter optimizer state plus the single update contract every
/// variant implements (spec §4.3, C3). Gradient-based rules are called
/// as `compute_update(param, grad, lr)`; Hebbian rules are called as
/// `compute_update(x, y, lr)` — the trait is shared because both shapes
/// are `(&Tensor, &Tensor, f64) -> Tensor`, and `apply_mode` tells the
/// caller which convention to fold the result back with.
pub trait Optimizer: DynClone + std::fmt::Debug {
    fn compute_update(&mut self, a: &Tensor, b: &Tensor, lr: f64) -> Tensor;

    fn apply_mode(&self) -> ApplyMode {
        ApplyMode::GradientDescent
    }

    /// Extra per-parameter-tensor adjustment applied after the delta has
    /// been folded into `param`. A no-op for every rule except
    /// `NormalizedHebbianRule`, which row-normalizes `W` here.
    fn post_update(&self, _param: &mut Tensor) {}
}
dyn_clone!(Optimizer);

#[derive(Clone, Debug)]
pub struct GradientDescent;

impl GradientDescent {
    pub fn new(_rows: usize, _cols: usize) -> Self {
        GradientDescent
    }
}

impl Optimizer for GradientDescent {
    fn compute_update(&mut self, _param: &Tensor, grad: &Tensor, lr: f64) -> Tensor {
        Tensor::from_array(grad.as_array() * lr)
    }
}

#[derive(Clone, Debug)]
pub struct Momentum {
    mu: f64,
    v: Array2<f64>,
}

impl Momentum {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_mu(rows, cols, 0.9)
    }

    pub fn with_mu(rows: usize, cols: usize, mu: f64) -> Self {
        Momentum {
            mu,
            v: Array2::zeros((rows, cols)),
        }
    }
}

impl Optimizer for Momentum {
    fn compute_update(&mut self, _param: &Tensor, grad: &Tensor, lr: f64) -> Tensor {
        self.v = &self.v * self.mu + grad.as_array() * lr;
        Tensor::from_array(self.v.clone())
    }
}

#[derive(Clone, Debug)]
pub struct AdaGrad {
    eps: f64,
    g: Array2<f64>,
}

impl AdaGrad {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_eps(rows, cols, 1e-8)
    }

    pub fn with_eps(rows: usize, cols: usize, eps: f64) -> Self {
        AdaGrad {
            eps,
            g: Array2::zeros((rows, cols)),
        }
    }
}

impl Optimizer for AdaGrad {
    fn compute_update(&mut self, _param: &Tensor, grad: &Tensor, lr: f64) -> Tensor {
        self.g = &self.g + grad.as_array() * grad.as_array();
        let denom = self.g.mapv(|x| (x + self.eps).sqrt());
        Tensor::from_array(grad.as_array() * lr / &denom)
    }
}

#[derive(Clone, Debug)]
pub struct RmsProp {
    rho: f64,
    eps: f64,
    eg: Array2<f64>,
}

impl RmsProp {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_params(rows, cols, 0.9, 1e-8)
    }

    pub fn with_params(rows: usize, cols: usize, rho: f64, eps: f64) -> Self {
        RmsProp {
            rho,
            eps,
            eg: Array2::zeros((rows, cols)),
        }
    }
}

impl Optimizer for RmsProp {
    fn compute_update(&mut self, _param: &Tensor, grad: &Tensor, lr: f64) -> Tensor {
        self.eg = &self.eg * self.rho + grad.as_array() * grad.as_array() * (1.0 - self.rho);
        let denom = self.eg.mapv(|x| (x + self.eps).sqrt());
        Tensor::from_array(grad.as_array() * lr / &denom)
    }
}

/// Adaptive gradient descent with running averages `E[g^2]` and `E[d^2]`.
/// The update formula carries no learning-rate term (spec §4.3); `lr` is
/// accepted for trait uniformity and ignored.
#[derive(Clone, Debug)]
pub struct AdaDelta {
    rho: f64,
    eps: f64,
    eg: Array2<f64>,
    ed: Array2<f64>,
}

impl AdaDelta {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_params(rows, cols, 0.9, 1e-8)
    }

    pub fn with_params(rows: usize, cols: usize, rho: f64, eps: f64) -> Self {
        AdaDelta {
            rho,
            eps,
            eg: Array2::zeros((rows, cols)),
            ed: Array2::zeros((rows, cols)),
        }
    }
}

impl Optimizer for AdaDelta {
    fn compute_update(&mut self, _param: &Tensor, grad: &Tensor, _lr: f64) -> Tensor {
        self.eg = &self.eg * self.rho + grad.as_array() * grad.as_array() * (1.0 - self.rho);
        let num = self.ed.mapv(|x| (x + self.eps).sqrt());
        let denom = self.eg.mapv(|x| (x + self.eps).sqrt());
        let delta = grad.as_array() * &num / &denom;
        self.ed = &self.ed * self.rho + &delta * &delta * (1.0 - self.rho);
        Tensor::from_array(delta)
    }
}

#[derive(Clone, Debug)]
pub struct Adam {
    beta1: f64,
    beta2: f64,
    eps: f64,
    m: Array2<f64>,
    v: Array2<f64>,
    beta1_t: f64,
    beta2_t: f64,
}

impl Adam {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_params(rows, cols, 0.9, 0.999, 1e-8)
    }

    pub fn with_params(rows: usize, cols: usize, beta1: f64, beta2: f64, eps: f64) -> Self {
        Adam {
            beta1,
            beta2,
            eps,
            m: Array2::zeros((rows, cols)),
            v: Array2::zeros((rows, cols)),
            beta1_t: beta1,
            beta2_t: beta2,
        }
    }
}

impl Optimizer for Adam {
    fn compute_update(&mut self, _param: &Tensor, grad: &Tensor, lr: f64) -> Tensor {
        self.m = &self.m * self.beta1 + grad.as_array() * (1.0 - self.beta1);
        self.v = &self.v * self.beta2 + grad.as_array() * grad.as_array() * (1.0 - self.beta2);

        let m_hat = &self.m / (1.0 - self.beta1_t);
        let v_hat = &self.v / (1.0 - self.beta2_t);
        let denom = v_hat.mapv(f64::sqrt) + self.eps;
        let delta = &m_hat * lr / &denom;

        self.beta1_t *= self.beta1;
        self.beta2_t *= self.beta2;

        Tensor::from_array(delta)
    }
}

/// Adaptive gradient descent with proportional/integral/derivative terms
/// over the gradient, supplemented from `optimization/GradPID.hpp`. The
/// P/I/D rates are derived from `learning_rate` at construction, so the
/// per-call `lr` argument is ignored (matching the original).
#[derive(Clone, Debug)]
pub struct GradPid {
    decay: f64,
    p_rate: f64,
    i_rate: f64,
    d_rate: f64,
    e_dx: Array2<f64>,
    dx_prev: Array2<f64>,
}

impl GradPid {
    pub fn new(rows: usize, cols: usize, learning_rate: f64) -> Self {
        Self::with_decay(rows, cols, learning_rate, 0.9)
    }

    pub fn with_decay(rows: usize, cols: usize, learning_rate: f64, decay: f64) -> Self {
        GradPid {
            decay,
            p_rate: learning_rate.powi(4),
            i_rate: learning_rate,
            d_rate: learning_rate.powi(3),
            e_dx: Array2::zeros((rows, cols)),
            dx_prev: Array2::zeros((rows, cols)),
        }
    }
}

impl Optimizer for GradPid {
    fn compute_update(&mut self, _param: &Tensor, grad: &Tensor, _lr: f64) -> Tensor {
        self.e_dx = &self.e_dx * self.decay + grad.as_array() * (1.0 - self.decay);

        let delta_p = grad.as_array() * self.p_rate;
        let delta_i = &self.e_dx * self.i_rate;
        let delta_d = (grad.as_array() - &self.dx_prev) * self.d_rate;
        let delta = delta_p + delta_i + delta_d;

        self.dx_prev = grad.as_array().clone();
        Tensor::from_array(delta)
    }
}

/// Classical Hebbian rule: `delta = lr * y * x^T`.
#[derive(Clone, Debug)]
pub struct HebbianRule;

impl HebbianRule {
    pub fn new(_rows: usize, _cols: usize) -> Self {
        HebbianRule
    }
}

impl Optimizer for HebbianRule {
    fn compute_update(&mut self, x: &Tensor, y: &Tensor, lr: f64) -> Tensor {
        Tensor::from_array(y.as_array().dot(&x.as_array().t()) * lr)
    }

    fn apply_mode(&self) -> ApplyMode {
        ApplyMode::Hebbian
    }
}

/// Hebbian rule normalized by batch size, with the parameter's rows
/// L2-normalized after each update.
#[derive(Clone, Debug)]
pub struct NormalizedHebbianRule;

impl NormalizedHebbianRule {
    pub fn new(_rows: usize, _cols: usize) -> Self {
        NormalizedHebbianRule
    }
}

impl Optimizer for NormalizedHebbianRule {
    fn compute_update(&mut self, x: &Tensor, y: &Tensor, lr: f64) -> Tensor {
        let batch = y.cols().max(1) as f64;
        Tensor::from_array(y.as_array().dot(&x.as_array().t()) * (lr / batch))
    }

    fn apply_mode(&self) -> ApplyMode {
        ApplyMode::Hebbian
    }

    fn post_update(&self, param: &mut Tensor) {
        let data = param.as_array_mut();
        for mut row in data.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 1e-12 {
                row.mapv_inplace(|v| v / norm);
            }
        }
    }
}

/// Per output column, picks the filter row with the maximum activation,
/// copies the corresponding input patch into that row of `delta`,
/// zero-means and L2-normalizes it, and scales by `lr`. Output columns
/// are visited in a shuffled order so no row is systematically favored
/// by input ordering.
#[derive(Clone, Debug)]
pub struct NormalizedZeroSumHebbianRule;

impl NormalizedZeroSumHebbianRule {
    pub fn new(_rows: usize, _cols: usize) -> Self {
        NormalizedZeroSumHebbianRule
    }
}

impl Optimizer for NormalizedZeroSumHebbianRule {
    fn compute_update(&mut self, x: &Tensor, y: &Tensor, lr: f64) -> Tensor {
        let (out_rows, batch) = (y.rows(), y.cols());
        let in_rows = x.rows();
        let mut delta = Array2::<f64>::zeros((out_rows, in_rows));

        let mut order: Vec<usize> = (0..batch).collect();
        order.shuffle(&mut thread_rng());

        for b in order {
            let col_y = y.as_array().column(b);
            let mut best = 0;
            let mut best_v = f64::NEG_INFINITY;
            for (i, v) in col_y.iter().enumerate() {
                if *v > best_v {
                    best_v = *v;
                    best = i;
                }
            }

            let patch = x.as_array().column(b).to_owned();
            let mean = patch.mean().unwrap_or(0.0);
            let centered = &patch - mean;
            let norm = centered.dot(&centered).sqrt().max(1e-12);
            let normalized = &centered / norm;

            for i in 0..in_rows {
                delta[[best, i]] += lr * normalized[i];
            }
        }

        Tensor::from_array(delta)
    }

    fn apply_mode(&self) -> ApplyMode {
        ApplyMode::Hebbian
    }
}

/// `ν_aa = lr`; `ν_ia = lr · N_on · (input_size − N_on)` where
/// `N_on = sum(y)`. For every (input unit, output unit, batch sample)
/// triple: both active adds `ν_aa`, exactly one active subtracts `ν_ia`.
#[derive(Clone, Debug)]
pub struct BinaryCorrelatorLearningRule;

impl BinaryCorrelatorLearningRule {
    pub fn new(_rows: usize, _cols: usize) -> Self {
        BinaryCorrelatorLearningRule
    }
}

impl Optimizer for BinaryCorrelatorLearningRule {
    fn compute_update(&mut self, x: &Tensor, y: &Tensor, lr: f64) -> Tensor {
        let n_on: f64 = y.as_array().sum();
        let in_rows = x.rows();
        let out_rows = y.rows();
        let batch = x.cols();
        let ni_ia = lr * n_on * (in_rows as f64 - n_on);

        let mut delta = Array2::<f64>::zeros((out_rows, in_rows));
        for b in 0..batch {
            for i in 0..in_rows {
                let xi = x.as_array()[[i, b]] != 0.0;
                for j in 0..out_rows {
                    let yj = y.as_array()[[j, b]] != 0.0;
                    if xi && yj {
                        delta[[j, i]] += lr;
                    } else if xi || yj {
                        delta[[j, i]] -= ni_ia;
                    }
                }
            }
        }

        Tensor::from_array(delta)
    }

    fn apply_mode(&self) -> ApplyMode {
        ApplyMode::Hebbian
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param_and_grad() -> (Tensor, Tensor) {
        let mut p = Tensor::new(2, 2);
        p.enumerate();
        let mut g = Tensor::new(2, 2);
        g.set_all(1.0);
        (p, g)
    }

    #[test]
    fn gradient_descent_scales_grad_by_lr() {
        let (p, g) = param_and_grad();
        let mut opt = GradientDescent::new(2, 2);
        let delta = opt.compute_update(&p, &g, 0.5);
        assert_eq!(delta.as_array()[[0, 0]], 0.5);
    }

    #[test]
    fn adam_update_stays_finite_over_iterations() {
        let (p, g) = param_and_grad();
        let mut opt = Adam::new(2, 2);
        for _ in 0..10 {
            let delta = opt.compute_update(&p, &g, 0.01);
            delta.assert_finite().unwrap();
        }
    }

    #[test]
    fn hebbian_rule_apply_mode_is_additive() {
        let opt = HebbianRule::new(2, 2);
        assert_eq!(opt.apply_mode(), ApplyMode::Hebbian);
    }

    #[test]
    fn binary_correlator_rewards_coactive_units() {
        let mut x = Tensor::new(2, 1);
        x.as_array_mut()[[0, 0]] = 1.0;
        let mut y = Tensor::new(2, 1);
        y.as_array_mut()[[0, 0]] = 1.0;
        let mut opt = BinaryCorrelatorLearningRule::new(2, 2);
        let delta = opt.compute_update(&x, &y, 0.1);
        assert!(delta.as_array()[[0, 0]] > 0.0);
    }
}
