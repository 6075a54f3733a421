//! Trains a small XOR model and optionally saves it.
//!
//!   cinder-nn [model.json]
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cinder_nn::{ActivationFunction, Dense, FitConfig, Layer, LossFunction, Matrix, Metric, Model, Result, Sgd};

fn run(save_to: Option<String>) -> Result<()> {
    let layers: Vec<Box<dyn Layer>> = vec![
        Box::new(Dense::with_input(2, 4, ActivationFunction::Tanh)?),
        Box::new(Dense::new(2, ActivationFunction::Sigmoid)?),
    ];
    let mut model = Model::with_seed(layers, 42);
    model.compile(Sgd::new(0.5, 0.5).with_momentum(0.9), LossFunction::MeanSquaredError, &[Metric::Accuracy])?;

    let x = vec![
        Matrix::column(&[0.0, 0.0]),
        Matrix::column(&[0.0, 1.0]),
        Matrix::column(&[1.0, 0.0]),
        Matrix::column(&[1.0, 1.0]),
    ];
    let y = vec![
        Matrix::column(&[1.0, 0.0]),
        Matrix::column(&[0.0, 1.0]),
        Matrix::column(&[0.0, 1.0]),
        Matrix::column(&[1.0, 0.0]),
    ];

    let log = model.fit(&x, &y, &FitConfig::new(500, 2).with_shuffle(true).with_verbose(false))?;
    if let Some(last) = log.last() {
        info!(epochs = log.len(), train_loss = last.train_loss, "training finished");
    }
    model.evaluate(&x, &y, &[Metric::Accuracy, Metric::MeanSquaredError])?;

    if let Some(path) = save_to {
        model.save_json(&path)?;
        info!(%path, "model saved");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
