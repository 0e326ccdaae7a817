//! Differentiable test functions for driving optimizer convergence
//! tests in isolation from any network (spec §4's C10, §8 scenario 6).

/// A scalar-valued, differentiable function of a vector `x`.
pub trait Landscape {
    fn dims(&self) -> usize;
    fn value(&self, x: &[f64]) -> f64;
    fn gradient(&self, x: &[f64]) -> Vec<f64>;
    fn minimum(&self) -> f64;
}

/// `F(x) = x^2`, one dimension.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sphere1D;

impl Landscape for Sphere1D {
    fn dims(&self) -> usize {
        1
    }

    fn value(&self, x: &[f64]) -> f64 {
        x[0] * x[0]
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        vec![2.0 * x[0]]
    }

    fn minimum(&self) -> f64 {
        0.0
    }
}

/// `F(x) = sum(x_i^2)` over 20 dimensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sphere20D;

impl Landscape for Sphere20D {
    fn dims(&self) -> usize {
        20
    }

    fn value(&self, x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| 2.0 * v).collect()
    }

    fn minimum(&self) -> f64 {
        0.0
    }
}

/// Beale's function, two dimensions, minimum 0 at (3, 0.5).
#[derive(Clone, Copy, Debug, Default)]
pub struct Beale;

impl Landscape for Beale {
    fn dims(&self) -> usize {
        2
    }

    fn value(&self, x: &[f64]) -> f64 {
        let (x0, x1) = (x[0], x[1]);
        let t1 = 1.5 - x0 + x0 * x1;
        let t2 = 2.25 - x0 + x0 * x1 * x1;
        let t3 = 2.625 - x0 + x0 * x1 * x1 * x1;
        t1 * t1 + t2 * t2 + t3 * t3
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let (x0, x1) = (x[0], x[1]);
        let t1 = 1.5 - x0 + x0 * x1;
        let t2 = 2.25 - x0 + x0 * x1 * x1;
        let t3 = 2.625 - x0 + x0 * x1 * x1 * x1;

        let dt1_dx0 = -1.0 + x1;
        let dt2_dx0 = -1.0 + x1 * x1;
        let dt3_dx0 = -1.0 + x1 * x1 * x1;
        let d_dx0 = 2.0 * t1 * dt1_dx0 + 2.0 * t2 * dt2_dx0 + 2.0 * t3 * dt3_dx0;

        let dt1_dx1 = x0;
        let dt2_dx1 = 2.0 * x0 * x1;
        let dt3_dx1 = 3.0 * x0 * x1 * x1;
        let d_dx1 = 2.0 * t1 * dt1_dx1 + 2.0 * t2 * dt2_dx1 + 2.0 * t3 * dt3_dx1;

        vec![d_dx0, d_dx1]
    }

    fn minimum(&self) -> f64 {
        0.0
    }
}

/// Rosenbrock's "banana" function, two dimensions, minimum 0 at (1, 1).
#[derive(Clone, Copy, Debug, Default)]
pub struct Rosenbrock;

impl Landscape for Rosenbrock {
    fn dims(&self) -> usize {
        2
    }

    fn value(&self, x: &[f64]) -> f64 {
        let (x0, x1) = (x[0], x[1]);
        (1.0 - x0).powi(2) + 100.0 * (x1 - x0 * x0).powi(2)
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let (x0, x1) = (x[0], x[1]);
        let d_dx0 = -2.0 * (1.0 - x0) - 400.0 * x0 * (x1 - x0 * x0);
        let d_dx1 = 200.0 * (x1 - x0 * x0);
        vec![d_dx0, d_dx1]
    }

    fn minimum(&self) -> f64 {
        0.0
    }
}

/// Drives `x_i := x_i - O.compute_update(x_i, grad_i, lr)` to convergence,
/// returning the iteration count on success.
pub fn converge(
    landscape: &dyn Landscape,
    make_optimizer: impl Fn() -> Vec<Box<dyn crate::optimizer::Optimizer>>,
    start: Vec<f64>,
    lr: f64,
    max_iters: usize,
    tolerance: f64,
) -> Option<usize> {
    let mut x = start;
    let mut optimizers = make_optimizer();
    let param = crate::tensor::Tensor::new(1, 1);

    for iter in 0..max_iters {
        let grad = landscape.gradient(&x);
        for (i, g) in grad.iter().enumerate() {
            let grad_tensor = crate::tensor::Tensor::from_array(ndarray::Array2::from_elem((1, 1), *g));
            let delta = optimizers[i].compute_update(&param, &grad_tensor, lr);
            x[i] -= delta.as_array()[[0, 0]];
            if !x[i].is_finite() {
                return None;
            }
        }
        if (landscape.value(&x) - landscape.minimum()).abs() < tolerance {
            return Some(iter + 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::GradientDescent;

    #[test]
    fn gradient_descent_converges_on_sphere_1d() {
        let result = converge(
            &Sphere1D,
            || vec![Box::new(GradientDescent::new(1, 1))],
            vec![5.0],
            0.1,
            10_000,
            1e-5,
        );
        assert!(result.is_some());
    }

    #[test]
    fn gradient_descent_converges_on_sphere_20d() {
        let start: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let result = converge(
            &Sphere20D,
            || (0..20).map(|_| Box::new(GradientDescent::new(1, 1)) as Box<dyn crate::optimizer::Optimizer>).collect(),
            start,
            0.1,
            10_000,
            1e-5,
        );
        assert!(result.is_some());
    }
}
