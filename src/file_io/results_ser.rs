use ndarray::Array2;
use serde::Serialize;

/// Serialized summary of one training run, written alongside the
/// network's own versioned archive (written separately via
/// `Network::save`).
#[derive(Serialize, Debug)]
pub struct TrainingResultsSer {
    /// Mean training loss after the final epoch
    final_train_loss: f64,
    /// Mean validation loss computed in test mode
    final_test_loss: f64,
    /// Number of correct predictions out of the validation set
    correct_predictions: usize,
    /// Size of the validation set
    validation_size: usize,
    /// Time it took for training to complete, in seconds
    elapsed_time: f32,
    /// Total number of epochs run
    total_epochs: usize,
    /// Predicted values from feeding validation inputs into the trained network
    predicted_output: Array2<f64>,
}

impl TrainingResultsSer {
    pub fn new(
        final_train_loss: f64,
        final_test_loss: f64,
        correct_predictions: usize,
        validation_size: usize,
        elapsed_time: f32,
        total_epochs: usize,
        predicted_output: Array2<f64>,
    ) -> Self {
        Self {
            final_train_loss,
            final_test_loss,
            correct_predictions,
            validation_size,
            elapsed_time,
            total_epochs,
            predicted_output,
        }
    }
}
