use ndarray::{s, Array2, Axis};
use ndarray_rand::rand_distr::{StandardNormal, Uniform};
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::error::NnError;

/// Shared, mutable handle to a Tensor. Layers alias handles (not
/// contents) when the Network connects consecutive layers' state/grad
/// bags (spec §3, §4.7).
pub type TensorHandle = Rc<RefCell<Tensor>>;

pub fn handle(t: Tensor) -> TensorHandle {
    Rc::new(RefCell::new(t))
}

/// Dense 2-D matrix of f64. Rows/columns follow the usual linear-algebra
/// convention; the trailing column count of any activation tensor is the
/// batch size.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: Array2<f64>,
}

impl Tensor {
    pub fn new(rows: usize, cols: usize) -> Self {
        Tensor {
            data: Array2::zeros((rows, cols)),
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols)
    }

    pub fn ones(rows: usize, cols: usize) -> Self {
        Tensor {
            data: Array2::ones((rows, cols)),
        }
    }

    pub fn from_array(data: Array2<f64>) -> Self {
        Tensor { data }
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn elem_count(&self) -> usize {
        self.data.len()
    }

    pub fn set_all(&mut self, v: f64) {
        self.data.fill(v);
    }

    /// Sets element i (row-major over the iteration order) to i as f64.
    /// Used for deterministic tests.
    pub fn enumerate(&mut self) {
        for (i, v) in self.data.iter_mut().enumerate() {
            *v = i as f64;
        }
    }

    pub fn rand(&mut self, lo: f64, hi: f64) {
        let (r, c) = (self.rows(), self.cols());
        self.data = Array2::random((r, c), Uniform::new(lo, hi));
    }

    pub fn randn(&mut self) {
        let (r, c) = (self.rows(), self.cols());
        self.data = Array2::random((r, c), StandardNormal);
    }

    /// `sqrt(x + 1e-6)`, used by the adaptive optimizers to avoid
    /// division by zero.
    pub fn sqrt_eps(x: f64) -> f64 {
        (x + 1e-6).sqrt()
    }

    pub fn reshape(&mut self, rows: usize, cols: usize) -> Result<(), NnError> {
        if rows * cols != self.elem_count() {
            return Err(NnError::ShapeMismatch {
                expected: (rows, cols),
                actual: (self.rows(), self.cols()),
            });
        }
        let flat: Vec<f64> = self.data.iter().cloned().collect();
        self.data = Array2::from_shape_vec((rows, cols), flat).unwrap();
        Ok(())
    }

    pub fn block_get(&self, row: usize, col: usize, height: usize, width: usize) -> Tensor {
        Tensor {
            data: self.data.slice(s![row..row + height, col..col + width]).to_owned(),
        }
    }

    pub fn block_set(&mut self, row: usize, col: usize, block: &Tensor) {
        self.data
            .slice_mut(s![row..row + block.rows(), col..col + block.cols()])
            .assign(&block.data);
    }

    /// Per-column maximum, returned as a `1 x cols` tensor. Used by
    /// Softmax for numerical stability.
    pub fn colwise_max(&self) -> Tensor {
        let mut out = Tensor::new(1, self.cols());
        for (j, col) in self.data.axis_iter(Axis(1)).enumerate() {
            out.data[[0, j]] = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        }
        out
    }

    /// Per-column argmax row index. Used by accuracy/count_correct_predictions.
    pub fn colwise_max_index(&self) -> Vec<usize> {
        (0..self.cols())
            .map(|j| {
                let col = self.data.column(j);
                let mut best = 0;
                let mut best_v = f64::NEG_INFINITY;
                for (i, v) in col.iter().enumerate() {
                    if *v > best_v {
                        best_v = *v;
                        best = i;
                    }
                }
                best
            })
            .collect()
    }

    pub fn rowwise_sum(&self) -> Tensor {
        let s = self.data.sum_axis(Axis(1));
        Tensor {
            data: s.insert_axis(Axis(1)),
        }
    }

    pub fn assert_finite(&self) -> Result<(), NnError> {
        if self.data.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(NnError::Numerical)
        }
    }
}

impl Deref for Tensor {
    type Target = Array2<f64>;
    fn deref(&self) -> &Array2<f64> {
        &self.data
    }
}

impl DerefMut for Tensor {
    fn deref_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }
}

#[derive(Serialize, Deserialize)]
struct TensorArchive {
    n_rows: usize,
    n_cols: usize,
    n_elem: usize,
    elements: Vec<f64>,
}

impl Serialize for Tensor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let archive = TensorArchive {
            n_rows: self.rows(),
            n_cols: self.cols(),
            n_elem: self.elem_count(),
            elements: self.data.iter().cloned().collect(),
        };
        archive.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let archive = TensorArchive::deserialize(deserializer)?;
        let data = Array2::from_shape_vec((archive.n_rows, archive.n_cols), archive.elements)
            .map_err(serde::de::Error::custom)?;
        Ok(Tensor { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_sets_sequential_values() {
        let mut t = Tensor::new(2, 2);
        t.enumerate();
        assert_eq!(t.as_array(), &Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 2.0, 3.0]).unwrap());
    }

    #[test]
    fn reshape_rejects_mismatched_element_count() {
        let mut t = Tensor::new(2, 3);
        assert!(t.reshape(4, 4).is_err());
        assert!(t.reshape(3, 2).is_ok());
    }

    #[test]
    fn block_get_set_roundtrip() {
        let mut t = Tensor::new(4, 4);
        t.enumerate();
        let block = t.block_get(1, 1, 2, 2);
        let mut dest = Tensor::new(4, 4);
        dest.block_set(0, 0, &block);
        assert_eq!(dest.block_get(0, 0, 2, 2), block);
    }

    #[test]
    fn colwise_max_and_index() {
        let data = Array2::from_shape_vec((3, 2), vec![1.0, 4.0, 5.0, 2.0, 3.0, 0.5]).unwrap();
        let t = Tensor::from_array(data);
        assert_eq!(t.colwise_max().as_array(), &Array2::from_shape_vec((1, 2), vec![5.0, 4.0]).unwrap());
        assert_eq!(t.colwise_max_index(), vec![2, 0]);
    }

    #[test]
    fn serialization_round_trips_through_json() {
        let mut t = Tensor::new(2, 2);
        t.enumerate();
        let json = serde_json::to_string(&t).unwrap();
        let back: Tensor = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
