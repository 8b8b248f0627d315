use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::error::{NetworkError, TrainingError};
use crate::network::Network;

pub const DEFAULT_LEARNING_CONSTANT: f64 = 0.5;

/// Online backpropagation trainer.
///
/// Every epoch visits the whole training set in a freshly shuffled order and updates the
/// network's weights after each example. The squared error of every example is accumulated
/// into the net error until [`Trainer::reset_net_error`] is called.
#[derive(Clone, Debug)]
pub struct Trainer {
    inputs: Vec<Vec<f64>>,
    targets: Vec<Vec<f64>>,
    learning_constant: f64,
    momentum: f64,
    net_error: f64,
    /// The last weight deltas applied, per connection, shaped like the weights.
    previous_deltas: Vec<Vec<Vec<f64>>>,
    rng: StdRng,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A trainer whose example order is reproducible.
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            inputs: Vec::new(),
            targets: Vec::new(),
            learning_constant: DEFAULT_LEARNING_CONSTANT,
            momentum: 0.0,
            net_error: 0.0,
            previous_deltas: Vec::new(),
            rng,
        }
    }

    /// Replaces the training set. The previous set is kept if the lists differ in length.
    pub fn add_new_training_set(
        &mut self,
        inputs: Vec<Vec<f64>>,
        targets: Vec<Vec<f64>>,
    ) -> Result<(), TrainingError> {
        if inputs.len() != targets.len() {
            return Err(TrainingError::SetLength {
                inputs: inputs.len(),
                targets: targets.len(),
            });
        }

        self.inputs = inputs;
        self.targets = targets;
        Ok(())
    }

    pub fn add_to_training_set(&mut self, input: Vec<f64>, target: Vec<f64>) {
        self.inputs.push(input);
        self.targets.push(target);
    }

    pub fn training_set_len(&self) -> usize {
        self.inputs.len()
    }

    pub fn learning_constant(&self) -> f64 {
        self.learning_constant
    }

    pub fn set_learning_constant(&mut self, learning_constant: f64) {
        if learning_constant > 0.0 {
            self.learning_constant = learning_constant;
        } else {
            trace!(learning_constant, "Ignoring non-positive learning constant.");
        }
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn set_momentum(&mut self, momentum: f64) {
        if momentum > 0.0 {
            self.momentum = momentum;
        } else {
            trace!(momentum, "Ignoring non-positive momentum.");
        }
    }

    /// The summed half squared error of every example trained since the last reset.
    pub fn net_error(&self) -> f64 {
        self.net_error
    }

    pub fn reset_net_error(&mut self) {
        self.net_error = 0.0;
    }

    /// Runs one shuffled pass over the training set.
    ///
    /// If an example fails, the examples already trained this epoch keep their updates.
    pub fn train_one_epoch(&mut self, network: &mut Network) -> Result<(), TrainingError> {
        if self.inputs.is_empty() {
            return Ok(());
        }

        if !momentum_fits(&self.previous_deltas, network) {
            debug!("Resetting momentum state for a new network topology.");
            self.previous_deltas = zero_deltas(network);
        }

        let mut order: Vec<usize> = (0..self.inputs.len()).collect();
        order.shuffle(&mut self.rng);

        for index in order {
            self.net_error += backpropagate(
                network,
                &self.inputs[index],
                &self.targets[index],
                self.learning_constant,
                self.momentum,
                &mut self.previous_deltas,
            )?;
        }

        trace!(
            examples = self.inputs.len(),
            net_error = self.net_error,
            "Trained epoch."
        );

        Ok(())
    }

    pub fn train_epochs(
        &mut self,
        network: &mut Network,
        epochs: usize,
    ) -> Result<(), TrainingError> {
        for _ in 0..epochs {
            self.train_one_epoch(network)?;
        }
        Ok(())
    }
}

/// Trains a single example and returns its half squared error.
fn backpropagate(
    network: &mut Network,
    input: &[f64],
    target: &[f64],
    learning_constant: f64,
    momentum: f64,
    previous_deltas: &mut [Vec<Vec<f64>>],
) -> Result<f64, TrainingError> {
    // Propagate forward ====================

    let response = network.response(input)?;

    if target.len() != response.len() {
        return Err(TrainingError::TargetLength {
            expected: response.len(),
            actual: target.len(),
        });
    }

    let differences: Vec<f64> = target.iter().zip(&response).map(|(t, r)| t - r).collect();
    let error = differences.iter().map(|d| 0.5 * d * d).sum();

    // Propagate backward ===================

    let num_layers = network.num_layers();
    let mut deltas = vec![Vec::new(); num_layers + 1];

    deltas[num_layers] = differences
        .iter()
        .zip(unit_gradients(network, num_layers)?)
        .map(|(d, g)| d * g)
        .collect();

    // Weights are read before any of this example's updates are applied.
    for layer in (0..num_layers).rev() {
        let next = &network.weighted_connections()[layer + 1];
        let next_deltas = &deltas[layer + 1];

        let layer_deltas = unit_gradients(network, layer)?
            .into_iter()
            .enumerate()
            .map(|(j, g)| {
                g * next
                    .weights()
                    .iter()
                    .zip(next_deltas)
                    .map(|(row, d)| d * row[j])
                    .sum::<f64>()
            })
            .collect();

        deltas[layer] = layer_deltas;
    }

    // Update weights =======================

    for layer in (0..=num_layers).rev() {
        let layer_inputs = match layer {
            0 => input[..network.num_inputs()].to_vec(),
            _ => network
                .activations(layer - 1)
                .ok_or(NetworkError::LayerIndex(layer - 1))?
                .to_vec(),
        };

        let connection = network
            .weighted_connection_mut(layer)
            .ok_or(NetworkError::LayerIndex(layer))?;

        let rows = connection
            .weights_mut()
            .zip(&deltas[layer])
            .zip(previous_deltas[layer].iter_mut());

        for ((weights, delta), previous_row) in rows {
            let columns = weights
                .iter_mut()
                .zip(&layer_inputs)
                .zip(previous_row.iter_mut());

            for ((weight, x), previous) in columns {
                let mut weight_delta = learning_constant * delta * x;
                if momentum > 0.0 {
                    weight_delta += momentum * *previous;
                    *previous = weight_delta;
                }
                *weight += weight_delta;
            }
        }
    }

    Ok(error)
}

/// The derivative of `layer`'s activation function at each of its cached unit inputs.
fn unit_gradients(network: &Network, layer: usize) -> Result<Vec<f64>, NetworkError> {
    let activation = network
        .layer_activation(layer)
        .ok_or(NetworkError::LayerIndex(layer))?;
    let unit_inputs = network
        .unit_inputs(layer)
        .ok_or(NetworkError::LayerIndex(layer))?;

    Ok(unit_inputs.iter().map(|&x| activation.gradient(x)).collect())
}

fn momentum_fits(previous_deltas: &[Vec<Vec<f64>>], network: &Network) -> bool {
    let connections = network.weighted_connections();

    previous_deltas.len() == connections.len()
        && previous_deltas.iter().zip(connections).all(|(deltas, connection)| {
            deltas.len() == connection.num_outputs()
                && deltas.iter().all(|row| row.len() == connection.num_inputs())
        })
}

fn zero_deltas(network: &Network) -> Vec<Vec<Vec<f64>>> {
    network
        .weighted_connections()
        .iter()
        .map(|connection| vec![vec![0.0; connection.num_inputs()]; connection.num_outputs()])
        .collect()
}
