use crate::dyn_clone;
use crate::tensor::Tensor;

/// Scalar training objective plus its gradient with respect to the
/// network's final-layer output (spec §4.4, C4). Arguments are always
/// `(target, predicted)`.
pub trait Loss: DynClone + std::fmt::Debug {
    /// Total loss summed over the batch.
    fn value(&self, target: &Tensor, predicted: &Tensor) -> f64;

    /// Loss averaged over the batch. Default divides `value` by the
    /// batch size (column count of `predicted`).
    fn mean(&self, target: &Tensor, predicted: &Tensor) -> f64 {
        let batch = predicted.cols().max(1) as f64;
        self.value(target, predicted) / batch
    }

    /// Gradient of `value` with respect to `predicted`, same shape as
    /// `predicted`.
    fn gradient(&self, target: &Tensor, predicted: &Tensor) -> Tensor;
}
dyn_clone!(Loss);

/// `L = 0.5 * sum((t - p)^2)`, `dL/dp = p - t`.
#[derive(Clone, Debug, Default)]
pub struct SquaredErrorLoss;

impl Loss for SquaredErrorLoss {
    fn value(&self, target: &Tensor, predicted: &Tensor) -> f64 {
        let diff = target.as_array() - predicted.as_array();
        0.5 * (&diff * &diff).sum()
    }

    fn gradient(&self, target: &Tensor, predicted: &Tensor) -> Tensor {
        Tensor::from_array(predicted.as_array() - target.as_array())
    }
}

const LOG_EPS: f64 = 1e-15;

/// `L = -sum(t * ln(p + 1e-15))`, `dL/dp = p - t`.
#[derive(Clone, Debug, Default)]
pub struct CrossEntropyLoss;

impl Loss for CrossEntropyLoss {
    fn value(&self, target: &Tensor, predicted: &Tensor) -> f64 {
        let mut total = 0.0;
        for (t, p) in target.as_array().iter().zip(predicted.as_array().iter()) {
            total -= t * (p + LOG_EPS).ln();
        }
        total
    }

    fn gradient(&self, target: &Tensor, predicted: &Tensor) -> Tensor {
        Tensor::from_array(predicted.as_array() - target.as_array())
    }
}

/// `L = -sum_batch ln(p_{argmax(t)})`. The analytic gradient is left
/// unfinished upstream; this mirrors that by returning an all-zero
/// tensor of the correct shape rather than guessing at a derivation.
/// Callers needing a trainable log-likelihood objective should pair a
/// Softmax output layer with `CrossEntropyLoss` instead, which is
/// mathematically equivalent for one-hot targets and has a defined
/// gradient.
#[derive(Clone, Debug, Default)]
pub struct LogLikelihoodLoss;

impl Loss for LogLikelihoodLoss {
    fn value(&self, target: &Tensor, predicted: &Tensor) -> f64 {
        let mut total = 0.0;
        for col in 0..target.cols() {
            let t_col = target.as_array().column(col);
            let mut argmax = 0;
            let mut best = f64::NEG_INFINITY;
            for (i, v) in t_col.iter().enumerate() {
                if *v > best {
                    best = *v;
                    argmax = i;
                }
            }
            total -= (predicted.as_array()[[argmax, col]] + LOG_EPS).ln();
        }
        total
    }

    fn gradient(&self, _target: &Tensor, predicted: &Tensor) -> Tensor {
        Tensor::new(predicted.rows(), predicted.cols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn squared_error_matches_hand_computation() {
        let predicted = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap());
        let target = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![0.0, 0.0]).unwrap());
        let loss = SquaredErrorLoss;
        assert_eq!(loss.value(&target, &predicted), 2.5);
        assert_eq!(loss.mean(&target, &predicted), 2.5);
        let grad = loss.gradient(&target, &predicted);
        assert_eq!(grad.as_array()[[0, 0]], 1.0);
        assert_eq!(grad.as_array()[[1, 0]], 2.0);
    }

    #[test]
    fn cross_entropy_gradient_is_predicted_minus_target() {
        let predicted = Tensor::from_array(Array2::from_shape_vec((2, 2), vec![0.5, 0.5, 0.9, 0.1]).unwrap());
        let target = Tensor::from_array(Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 1.0, 0.0]).unwrap());
        let loss = CrossEntropyLoss;
        let grad = loss.gradient(&target, &predicted);
        assert_eq!(grad.as_array(), &(predicted.as_array() - target.as_array()));
    }

    #[test]
    fn log_likelihood_gradient_is_all_zero() {
        let predicted = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![0.9, 0.1]).unwrap());
        let target = Tensor::from_array(Array2::from_shape_vec((2, 1), vec![1.0, 0.0]).unwrap());
        let loss = LogLikelihoodLoss;
        let grad = loss.gradient(&target, &predicted);
        assert!(grad.as_array().iter().all(|v| *v == 0.0));
    }
}
