use crate::args::Args;
use crate::file_io::json_de::NetworkDataDe;
use crate::file_io::results_ser::TrainingResultsSer;
use crate::file_io::save_output;
use log::info;
use mlnn::Tensor;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::time::SystemTime;

/// Trains the network described in `network_data_de` and writes the
/// result to the path configured in `args`.
///
/// The optimization API is synchronous and single-threaded (layer
/// state is held behind `Rc<RefCell<_>>` handles, not `Arc<Mutex<_>>`),
/// so unlike a gradient-free parameter search this runs one network to
/// completion rather than fanning work out across `args.threads`.
pub fn train_from_json(network_data_de: NetworkDataDe, args: Args) -> Result<(), String> {
    let mut network = network_data_de.create_network();
    let hyperparams = network_data_de.hyperparams.clone();
    let batch_size = args.batch_size.unwrap_or(hyperparams.batch_size).max(1);
    let epochs = args.epochs;

    let train_inputs = network_data_de.train_inputs.clone();
    let train_outputs = network_data_de.train_outputs.clone();
    let test_inputs = network_data_de.test_inputs.clone();
    let test_outputs = network_data_de.test_outputs.clone();

    let now = SystemTime::now();
    info!("Training started for network '{}'", network.network.display_name());

    let n_samples = train_inputs.ncols();
    let mut order: Vec<usize> = (0..n_samples).collect();

    let mut final_train_loss = 0.0;
    for epoch in 0..epochs {
        if args.shuffle {
            order.shuffle(&mut thread_rng());
        }

        let mut epoch_loss = 0.0;
        let mut n_batches = 0;
        let mut start = 0;
        while start < n_samples {
            let end = (start + batch_size).min(n_samples);
            let batch_indices = &order[start..end];

            let x = Tensor::from_array(train_inputs.select(ndarray::Axis(1), batch_indices));
            let y = Tensor::from_array(train_outputs.select(ndarray::Axis(1), batch_indices));

            epoch_loss += network.train(&x, &y, hyperparams.learning_rate, hyperparams.decay).map_err(|e| e.to_string())?;
            n_batches += 1;
            start = end;
        }
        final_train_loss = epoch_loss / n_batches.max(1) as f64;
        if epoch % 10 == 0 || epoch + 1 == epochs {
            info!("epoch {epoch}: mean train loss = {final_train_loss:.6}");
        }
    }
    info!("Training finished.");

    let test_x = Tensor::from_array(test_inputs.clone());
    let test_y = Tensor::from_array(test_outputs.clone());
    let final_test_loss = network.test(&test_x, &test_y).map_err(|e| e.to_string())?;

    let predicted: Array2<f64> = {
        let predictions = network.network.predictions().map_err(|e| e.to_string())?;
        predictions.borrow().as_array().clone()
    };
    let correct = network.network.count_correct_predictions(&Tensor::from_array(test_outputs.clone()), &Tensor::from_array(predicted.clone()));

    let elapsed_time = now.elapsed().unwrap().as_secs_f32();
    let results = TrainingResultsSer::new(
        final_train_loss,
        final_test_loss,
        correct,
        test_inputs.ncols(),
        elapsed_time,
        epochs,
        predicted,
    );

    save_output::save_to_dir(args, &network, results)
}
