//! End-to-end scenarios from the component spec's testable-properties
//! section, run as black-box integration tests against the public API.

use mlnn::landscape::{converge, Sphere20D};
use mlnn::layer::linear::LinearLayer;
use mlnn::optimizer::{AdaDelta, AdaGrad, GradPid, GradientDescent, Optimizer, RmsProp};
use mlnn::tensor::Tensor;
use mlnn::{handle, Layer, Network};

/// Scenario 2: `Linear` 2x3 forward with fixed weights/bias.
#[test]
fn linear_2x3_forward_matches_reference() {
    let mut layer = LinearLayer::new(2, 3, "linear");
    layer.core.params.set("W", handle(Tensor::from_array(ndarray::arr2(&[[1.0, 2.0], [3.0, 5.0], [6.0, 9.0]])))).unwrap();
    layer.core.params.set("b", handle(Tensor::from_array(ndarray::arr2(&[[-3.0], [-2.0], [-1.0]])))).unwrap();

    let x = handle(Tensor::from_array(ndarray::arr2(&[[-1.0], [1.0]])));
    layer.core.state.set("x", x).unwrap();
    layer.forward(false);

    let y = layer.core.y();
    let y = y.borrow();
    assert!((y.as_array()[[0, 0]] - (-2.0)).abs() < 1e-9);
    assert!((y.as_array()[[1, 0]] - 0.0).abs() < 1e-9);
    assert!((y.as_array()[[2, 0]] - 2.0).abs() < 1e-9);
}

/// Scenario 6: Sphere20D convergence for every optimizer the scenario names.
#[test]
fn sphere_20d_converges_for_named_optimizers() {
    let start: Vec<f64> = (0..20).map(|i| i as f64).collect();

    let make = |factory: fn() -> Box<dyn Optimizer>| -> Vec<Box<dyn Optimizer>> { (0..20).map(|_| factory()).collect() };

    let gd = converge(&Sphere20D, || make(|| Box::new(GradientDescent::new(1, 1))), start.clone(), 0.1, 20_000, 1e-5);
    assert!(gd.is_some(), "GradientDescent failed to converge on Sphere20D");

    let rmsprop = converge(&Sphere20D, || make(|| Box::new(RmsProp::new(1, 1))), start.clone(), 0.1, 20_000, 1e-5);
    assert!(rmsprop.is_some(), "RMSProp failed to converge on Sphere20D");

    let adagrad = converge(&Sphere20D, || make(|| Box::new(AdaGrad::new(1, 1))), start.clone(), 0.5, 20_000, 1e-5);
    assert!(adagrad.is_some(), "AdaGrad failed to converge on Sphere20D");

    let adadelta = converge(&Sphere20D, || make(|| Box::new(AdaDelta::new(1, 1))), start.clone(), 1.0, 20_000, 1e-5);
    assert!(adadelta.is_some(), "AdaDelta failed to converge on Sphere20D");

    let gradpid = converge(&Sphere20D, || (0..20).map(|_| Box::new(GradPid::new(1, 1, 0.1)) as Box<dyn Optimizer>).collect(), start, 1.0, 20_000, 1e-5);
    assert!(gradpid.is_some(), "GradPID failed to converge on Sphere20D");
}

/// Serialization round-trip at the full-network level: `load(save(N))`
/// reproduces layer count, per-layer sizes, and parameter tensors.
#[test]
fn network_save_load_round_trips_architecture_and_parameters() {
    let mut network = Network::new("roundtrip");
    network.push_layer(Layer::Linear(LinearLayer::new(4, 3, "linear_a")));
    network.push_layer(Layer::Linear(LinearLayer::new(3, 2, "linear_b")));
    network.install_optimizer(|r, c| Box::new(GradientDescent::new(r, c)) as Box<dyn Optimizer>);

    let tmp = std::env::temp_dir().join("mlnn_roundtrip_test.json");
    let path = tmp.to_str().unwrap();
    network.save(path).expect("save should succeed");

    let loaded = Network::load(path).expect("load should succeed");
    assert_eq!(loaded.len(), network.len());
    for i in 0..network.len() {
        let a = network.layer(i).unwrap();
        let b = loaded.layer(i).unwrap();
        assert_eq!(a.type_tag(), b.type_tag());
        assert_eq!(a.input_size(), b.input_size());
        assert_eq!(a.output_size(), b.output_size());
    }

    std::fs::remove_file(path).ok();
}
