use cinder_nn::{
    ActivationFunction, Dense, Dropout, FitConfig, Layer, LossFunction, Matrix, Metric, Model, Sgd,
};
use tracing_subscriber::EnvFilter;

fn main() -> cinder_nn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let layers: Vec<Box<dyn Layer>> = vec![
        Box::new(Dense::with_input(2, 8, ActivationFunction::Tanh)?),
        Box::new(Dropout::new(0.1)?),
        Box::new(Dense::new(1, ActivationFunction::Sigmoid)?),
    ];
    let mut model = Model::with_seed(layers, 7);
    model.compile(
        Sgd::new(0.3, 0.3).with_momentum(0.9).with_nesterov(true),
        LossFunction::BinaryCrossEntropy,
        &[Metric::MeanSquaredError],
    )?;

    let inputs = vec![
        Matrix::column(&[1.0, 0.0]),
        Matrix::column(&[1.0, 1.0]),
        Matrix::column(&[0.0, 1.0]),
        Matrix::column(&[0.0, 0.0]),
    ];
    let expected_outputs = vec![
        Matrix::column(&[1.0]),
        Matrix::column(&[0.0]),
        Matrix::column(&[1.0]),
        Matrix::column(&[0.0]),
    ];

    let config = FitConfig::new(2000, 4).with_shuffle(true).with_verbose(false);
    let log = model.fit(&inputs, &expected_outputs, &config)?;
    for stats in log.epochs().iter().step_by(250) {
        println!("Epoch {}: loss = {:.6}", stats.epoch, stats.train_loss);
    }

    for input in &inputs {
        let output = model.predict(input)?;
        println!("Input: {:?} -> Output: {:.4}", input.data(), output.data()[0]);
    }
    Ok(())
}
