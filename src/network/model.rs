use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::{NnError, Result};
use crate::layers::layer::{Layer, LayerKind};
use crate::loss::loss_type::LossFunction;
use crate::math::matrix::Matrix;
use crate::network::initializers::Initializer;
use crate::network::snapshot::{ModelSnapshot, FORMAT_VERSION};
use crate::optim::optimizer::Optimizer;
use crate::optim::sgd::Sgd;
use crate::train::metrics::Metric;
use crate::train::train_log::TrainLog;

/// An ordered stack of layers together with its loss, optimizer and random
/// source.
///
/// The model owns its layers exclusively; callers read them through
/// [`Model::layers`] and change them only by training.
#[derive(Debug)]
pub struct Model {
    pub(crate) layers: Vec<Box<dyn Layer>>,
    pub(crate) loss: Option<LossFunction>,
    pub(crate) optimizer: Option<Box<dyn Optimizer>>,
    pub(crate) metrics: Vec<Metric>,
    pub(crate) log: TrainLog,
    pub(crate) rng: StdRng,
}

impl Model {
    /// Model seeded from OS entropy.
    pub fn new(layers: Vec<Box<dyn Layer>>) -> Model {
        Model::with_rng(layers, StdRng::from_entropy())
    }

    /// Deterministic model: same seed, same initial weights, masks and shuffles.
    pub fn with_seed(layers: Vec<Box<dyn Layer>>, seed: u64) -> Model {
        Model::with_rng(layers, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(layers: Vec<Box<dyn Layer>>, rng: StdRng) -> Model {
        Model {
            layers,
            loss: None,
            optimizer: None,
            metrics: Vec::new(),
            log: TrainLog::default(),
            rng,
        }
    }

    /// Appends a layer. The model has to be compiled again afterwards.
    pub fn add(&mut self, layer: impl Layer + 'static) {
        self.layers.push(Box::new(layer));
        self.loss = None;
        self.optimizer = None;
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn loss(&self) -> Option<LossFunction> {
        self.loss
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn optimizer(&self) -> Option<&dyn Optimizer> {
        self.optimizer.as_deref()
    }

    /// History of the last `fit` call.
    pub fn log(&self) -> &TrainLog {
        &self.log
    }

    pub fn is_compiled(&self) -> bool {
        self.loss.is_some() && self.optimizer.is_some()
    }

    /// Feeds each layer's output shape into the next layer's input shape.
    pub fn connect(&mut self) {
        for i in 1..self.layers.len() {
            let previous = self.layers[i - 1].output_shape();
            self.layers[i].connect(previous);
        }
        debug!(layers = self.layers.len(), "connected layers");
    }

    pub fn initialize_parameters_xavier(&mut self) -> Result<()> {
        self.initialize_parameters(Initializer::Xavier)
    }

    pub fn initialize_parameters_he(&mut self) -> Result<()> {
        self.initialize_parameters(Initializer::He)
    }

    /// Draws fresh weights (zero biases) for every connected layer. Fails with
    /// `InvalidOperation` if any layer still has an undeclared shape.
    pub fn initialize_parameters(&mut self, initializer: Initializer) -> Result<()> {
        if let Some(i) = self
            .layers
            .iter()
            .position(|l| !l.input_shape().is_valid() || !l.output_shape().is_valid())
        {
            return Err(NnError::InvalidOperation(format!(
                "cannot initialize parameters: layer {} has an invalid shape",
                i + 1
            )));
        }
        for layer in &mut self.layers {
            layer.initialize(initializer, &mut self.rng)?;
        }
        debug!(?initializer, "initialized parameters");
        Ok(())
    }

    /// Validates and wires the layers, draws Xavier weights, binds the loss
    /// and readies `optimizer` for training.
    pub fn compile(
        &mut self,
        optimizer: impl Optimizer + 'static,
        loss: LossFunction,
        metrics: &[Metric],
    ) -> Result<()> {
        self.compile_with_initializer(optimizer, loss, metrics, Initializer::Xavier)
    }

    pub fn compile_with_initializer(
        &mut self,
        optimizer: impl Optimizer + 'static,
        loss: LossFunction,
        metrics: &[Metric],
        initializer: Initializer,
    ) -> Result<()> {
        self.validate_layers()?;
        self.connect();
        self.initialize_parameters(initializer)?;
        self.bind(Box::new(optimizer), loss, metrics.to_vec())?;
        debug!(?loss, ?metrics, "compiled model");
        Ok(())
    }

    fn validate_layers(&self) -> Result<()> {
        let first = self.layers.first().ok_or_else(|| {
            NnError::InvalidModelArgument("a model needs at least one layer".to_string())
        })?;
        if !first.input_shape().is_valid() {
            return Err(NnError::InvalidModelArgument(
                "the input shape of the first layer was not provided or is invalid".to_string(),
            ));
        }

        for (i, layer) in self.layers.iter().enumerate() {
            let dropout = layer.kind() == LayerKind::Dropout;
            if dropout && i > 0 && self.layers[i - 1].kind() == LayerKind::Dropout {
                return Err(NnError::InvalidModelArgument(format!(
                    "layers {i} and {} are consecutive dropout layers",
                    i + 1
                )));
            }
            if !dropout && !layer.output_shape().is_valid() {
                return Err(NnError::InvalidModelArgument(format!(
                    "the shape of layer {} was not provided or is invalid",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    fn bind(&mut self, mut optimizer: Box<dyn Optimizer>, loss: LossFunction, metrics: Vec<Metric>) -> Result<()> {
        optimizer.connect_to_model(self);
        optimizer.initialize()?;
        self.optimizer = Some(optimizer);
        self.loss = Some(loss);
        self.log = TrainLog::new(metrics.clone());
        self.metrics = metrics;
        Ok(())
    }

    pub(crate) fn ensure_compiled(&self) -> Result<LossFunction> {
        match (self.loss, &self.optimizer) {
            (Some(loss), Some(_)) => Ok(loss),
            _ => Err(NnError::InvalidOperation("the model has not been compiled".to_string())),
        }
    }

    /// Training-mode forward pass through every layer, dropout included.
    /// Returns the last layer's output.
    pub fn forward_pass(&mut self, input: &Matrix) -> Result<&Matrix> {
        for i in 0..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            let layer_input = done.last().map_or(input, |prev| prev.neurons());
            rest[0].feed_forward(layer_input, &mut self.rng)?;
        }
        self.layers
            .last()
            .map(|l| l.neurons())
            .ok_or_else(|| NnError::InvalidOperation("the model has no layers".to_string()))
    }

    /// Back-propagates `d_loss` (dLoss/dOutput) from the last layer to the
    /// first, adding this sample's gradients to every layer's deltas.
    /// `input` is the sample fed to the preceding `forward_pass`.
    pub fn backward_pass(&mut self, d_loss: &Matrix, input: &Matrix) -> Result<()> {
        for i in (0..self.layers.len()).rev() {
            let (done, rest) = self.layers.split_at_mut(i);
            let previous_neurons = done.last().map_or(input, |prev| prev.neurons());
            if let Some((layer, after)) = rest.split_first_mut() {
                match after.first() {
                    Some(next) => layer.back_propagate_as_hidden(next.as_ref(), previous_neurons)?,
                    None => layer.back_propagate_as_output(d_loss, previous_neurons)?,
                }
            }
        }
        Ok(())
    }

    /// Zeroes every layer's gradient and delta buffers in place.
    pub fn reset_gradients(&mut self) {
        for layer in &mut self.layers {
            layer.reset_gradients();
        }
    }

    /// Inference-mode forward pass: training-only layers such as dropout are
    /// skipped.
    pub fn predict(&mut self, input: &Matrix) -> Result<Matrix> {
        self.ensure_compiled()?;
        let mut current = input.clone();
        for layer in self.layers.iter_mut().filter(|l| !l.is_training_only()) {
            layer.feed_forward(&current, &mut self.rng)?;
            current = layer.neurons().clone();
        }
        Ok(current)
    }

    /// Predicts every input, reports each requested metric and returns the
    /// accuracy.
    pub fn evaluate(&mut self, inputs: &[Matrix], targets: &[Matrix], metrics: &[Metric]) -> Result<f64> {
        if inputs.len() != targets.len() {
            return Err(NnError::InvalidModelArgument(format!(
                "{} inputs but {} targets",
                inputs.len(),
                targets.len()
            )));
        }
        if inputs.is_empty() {
            return Err(NnError::ArgumentNull("inputs"));
        }

        let outputs = inputs.iter().map(|x| self.predict(x)).collect::<Result<Vec<_>>>()?;
        let accuracy = Metric::Accuracy.mean(&outputs, targets)?;
        for metric in metrics {
            let value = match metric {
                Metric::Accuracy => accuracy,
                other => other.mean(&outputs, targets)?,
            };
            info!(samples = inputs.len(), "{metric}: {value:.6}");
        }
        Ok(accuracy)
    }

    pub fn snapshot(&self) -> Result<ModelSnapshot> {
        let loss = self.ensure_compiled()?;
        let optimizer = self
            .optimizer
            .as_ref()
            .map(|o| o.snapshot())
            .ok_or_else(|| NnError::InvalidOperation("the model has not been compiled".to_string()))?;
        Ok(ModelSnapshot {
            format_version: FORMAT_VERSION,
            layers: self.layers.iter().map(|l| l.snapshot()).collect(),
            loss,
            metrics: self.metrics.clone(),
            optimizer,
        })
    }

    /// Rebuilds a compiled model from a snapshot, keeping its trained weights.
    pub fn from_snapshot(snapshot: ModelSnapshot, rng: StdRng) -> Result<Model> {
        if snapshot.format_version != FORMAT_VERSION {
            return Err(NnError::InvalidOperation(format!(
                "unsupported model format version {} (expected {FORMAT_VERSION})",
                snapshot.format_version
            )));
        }
        let layers = snapshot
            .layers
            .into_iter()
            .map(|l| l.into_layer())
            .collect::<Result<Vec<_>>>()?;

        let mut model = Model::with_rng(layers, rng);
        model.validate_layers()?;
        model.connect();
        let optimizer = Sgd::from_snapshot(snapshot.optimizer);
        model.bind(Box::new(optimizer), snapshot.loss, snapshot.metrics)?;
        Ok(model)
    }

    /// Serializes the compiled model to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.snapshot()?;
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        debug!(path = %path.as_ref().display(), "saved model");
        Ok(())
    }

    /// Loads a model written by `save_json`, ready to predict or keep training.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Model> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot: ModelSnapshot = serde_json::from_reader(reader)?;
        debug!(path = %path.as_ref().display(), layers = snapshot.layers.len(), "loaded model");
        Model::from_snapshot(snapshot, StdRng::from_entropy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::layers::dense::Dense;
    use crate::layers::dropout::Dropout;
    use crate::layers::layer::Shape;
    use crate::loss::mse::MseLoss;

    fn dense(units: usize) -> Box<dyn Layer> {
        Box::new(Dense::new(units, ActivationFunction::Sigmoid).unwrap())
    }

    fn input_dense(inputs: usize, units: usize) -> Box<dyn Layer> {
        Box::new(Dense::with_input(inputs, units, ActivationFunction::Sigmoid).unwrap())
    }

    fn dropout(rate: f64) -> Box<dyn Layer> {
        Box::new(Dropout::new(rate).unwrap())
    }

    fn compiled(layers: Vec<Box<dyn Layer>>) -> Model {
        let mut model = Model::with_seed(layers, 11);
        model.compile(Sgd::new(0.1, 0.1), LossFunction::MeanSquaredError, &[]).unwrap();
        model
    }

    #[test]
    fn compile_validates_the_stack() {
        let mut empty = Model::with_seed(Vec::new(), 0);
        assert!(matches!(
            empty.compile(Sgd::new(0.1, 0.1), LossFunction::MeanSquaredError, &[]),
            Err(NnError::InvalidModelArgument(_))
        ));

        let mut no_input = Model::with_seed(vec![dense(3), dense(1)], 0);
        assert!(matches!(
            no_input.compile(Sgd::new(0.1, 0.1), LossFunction::MeanSquaredError, &[]),
            Err(NnError::InvalidModelArgument(_))
        ));

        let mut double_dropout =
            Model::with_seed(vec![input_dense(2, 3), dropout(0.5), dropout(0.5), dense(1)], 0);
        assert!(matches!(
            double_dropout.compile(Sgd::new(0.1, 0.1), LossFunction::MeanSquaredError, &[]),
            Err(NnError::InvalidModelArgument(_))
        ));
        assert!(!double_dropout.is_compiled());
    }

    #[test]
    fn compile_connects_shapes() {
        let model = compiled(vec![input_dense(4, 3), dropout(0.5), dense(2)]);
        assert!(model.is_compiled());
        let layers = model.layers();
        assert_eq!(layers[1].input_shape(), Shape::column(3));
        assert_eq!(layers[1].output_shape(), Shape::column(3));
        assert_eq!(layers[2].input_shape(), Shape::column(3));
        assert_eq!(layers[2].parameters().unwrap().weights.shape(), (2, 3));
    }

    #[test]
    fn initialize_before_connect_fails() {
        let mut model = Model::with_seed(vec![input_dense(2, 3), dense(1)], 0);
        assert!(matches!(
            model.initialize_parameters_xavier(),
            Err(NnError::InvalidOperation(_))
        ));
        model.connect();
        assert!(model.initialize_parameters_he().is_ok());
    }

    #[test]
    fn predict_requires_compile() {
        let mut model = Model::with_seed(vec![input_dense(2, 1)], 0);
        let err = model.predict(&Matrix::column(&[0.0, 1.0])).unwrap_err();
        assert!(matches!(err, NnError::InvalidOperation(_)));
    }

    #[test]
    fn predict_skips_dropout() {
        let mut model = compiled(vec![input_dense(3, 3), dropout(0.5), dense(2)]);
        let x = Matrix::column(&[0.2, -0.4, 0.9]);
        let first = model.predict(&x).unwrap();
        for _ in 0..5 {
            assert_eq!(model.predict(&x).unwrap(), first);
        }
    }

    #[test]
    fn forward_pass_chains_layer_outputs() {
        let mut model = compiled(vec![input_dense(2, 3), dense(2)]);
        let x = Matrix::column(&[0.5, -0.5]);
        let out = model.forward_pass(&x).unwrap().clone();
        assert_eq!(out, model.predict(&x).unwrap());
        assert_eq!(out.shape(), (2, 1));
    }

    #[test]
    fn backward_pass_fills_every_delta() {
        let mut model = compiled(vec![input_dense(2, 3), dense(2)]);
        let x = Matrix::column(&[0.5, -0.5]);
        let y = Matrix::column(&[1.0, 0.0]);
        let out = model.forward_pass(&x).unwrap().clone();
        let d_loss = MseLoss::derivative(&out, &y).unwrap();
        model.backward_pass(&d_loss, &x).unwrap();
        for layer in model.layers() {
            assert!(layer.parameters().unwrap().delta_weight.data().iter().any(|&d| d != 0.0));
        }

        model.reset_gradients();
        for layer in model.layers() {
            assert_eq!(layer.parameters().unwrap().delta_weight.sum(), 0.0);
        }
    }

    #[test]
    fn convolution_layers_cannot_compile() {
        use crate::layers::convolution::{Convolution2D, ConvolutionConfig};
        let config =
            ConvolutionConfig { filters: 1, kernel_size: (2, 2), stride: 1, padding: 0, dilation: 1, bias: true };
        let conv = Convolution2D::with_input(Shape::new(4, 4, 1), config, ActivationFunction::ReLU).unwrap();
        let layers: Vec<Box<dyn Layer>> = vec![Box::new(conv)];
        let mut model = Model::with_seed(layers, 0);
        assert!(matches!(
            model.compile(Sgd::new(0.1, 0.1), LossFunction::MeanSquaredError, &[]),
            Err(NnError::Unsupported(_))
        ));
    }

    #[test]
    fn evaluate_returns_accuracy() {
        let mut model = compiled(vec![input_dense(2, 2)]);
        let x = vec![Matrix::column(&[0.1, 0.2]), Matrix::column(&[0.3, 0.4])];
        let predictions: Vec<Matrix> = x.iter().map(|s| model.predict(s).unwrap().to_one_hot_argmax()).collect();
        let mut wrong = predictions[1].clone();
        wrong.data_mut().reverse();
        let targets = vec![predictions[0].clone(), wrong];

        let accuracy = model.evaluate(&x, &targets, &[Metric::Accuracy, Metric::MeanSquaredError]).unwrap();
        assert_eq!(accuracy, 0.5);
        assert!(matches!(model.evaluate(&[], &[], &[]), Err(NnError::ArgumentNull(_))));
        assert!(model.evaluate(&x, &targets[..1], &[]).is_err());
    }

    #[test]
    fn uncompiled_model_cannot_be_saved() {
        let model = Model::with_seed(vec![input_dense(2, 1)], 0);
        assert!(matches!(model.snapshot(), Err(NnError::InvalidOperation(_))));
    }
}
