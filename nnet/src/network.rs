use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::activation::ActivationConfig;
use crate::connection::WeightedConnection;
use crate::error::{DeserializationError, NetworkError};

pub const DEFAULT_INIT_RANGE: f64 = 2.0;

/// A feed-forward neural network with any number of hidden layers.
///
/// Layers are added one at a time with [`Network::add_layer`]. The weighted connections are
/// stored in order, the last one always linking the final hidden layer to the output layer.
/// Every call to [`Network::response`] caches the unit inputs and activations of each layer,
/// output layer included, which is what [`Trainer`](crate::Trainer) uses to backpropagate.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "SerializedNetwork")]
pub struct Network {
    num_inputs: usize,
    num_outputs: usize,
    output_activation: ActivationConfig,
    hidden_activations: Vec<ActivationConfig>,
    connections: Vec<WeightedConnection>,
    #[serde(skip)]
    activations: Vec<Vec<f64>>,
    #[serde(skip)]
    unit_inputs: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct SerializedNetwork {
    num_inputs: usize,
    num_outputs: usize,
    output_activation: ActivationConfig,
    hidden_activations: Vec<ActivationConfig>,
    connections: Vec<WeightedConnection>,
}

impl TryFrom<SerializedNetwork> for Network {
    type Error = DeserializationError;

    fn try_from(network: SerializedNetwork) -> Result<Self, Self::Error> {
        let network = Self::from_parts(
            network.num_inputs,
            network.num_outputs,
            network.output_activation,
            network.hidden_activations,
            network.connections,
        );
        network.validate()?;
        Ok(network)
    }
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the network to its freshly constructed state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// The number of hidden layers.
    pub fn num_layers(&self) -> usize {
        self.hidden_activations.len()
    }

    pub fn set_num_inputs(&mut self, num_inputs: usize) {
        if num_inputs > 0 {
            self.num_inputs = num_inputs;
        }
    }

    pub fn set_num_outputs(&mut self, num_outputs: usize) {
        if num_outputs > 0 {
            self.num_outputs = num_outputs;
        }
    }

    pub fn output_activation(&self) -> ActivationConfig {
        self.output_activation
    }

    pub fn set_output_activation(&mut self, activation: ActivationConfig) {
        self.output_activation = activation;
    }

    pub fn output_activation_mut(&mut self) -> &mut ActivationConfig {
        &mut self.output_activation
    }

    /// Appends a hidden layer of `num_units` units and rebuilds the output connection to follow
    /// it. Weights are initialised uniformly over `-init_range / 2..=init_range / 2`.
    ///
    /// On error the network is left unchanged.
    pub fn add_layer(
        &mut self,
        num_units: usize,
        activation: ActivationConfig,
        init_range: f64,
        rng: &mut impl Rng,
    ) -> Result<(), NetworkError> {
        if num_units == 0 {
            return Err(NetworkError::InvalidParameter("number of units"));
        }
        if self.num_inputs == 0 {
            return Err(NetworkError::NoInputs);
        }
        if self.num_outputs == 0 {
            return Err(NetworkError::NoOutputs);
        }

        let layer_inputs = match self.connections.len() {
            0 => self.num_inputs,
            n => self.connections[n - 1].num_inputs(),
        };

        let hidden = WeightedConnection::random(layer_inputs, num_units, init_range, rng)?;
        let output = WeightedConnection::random(num_units, self.num_outputs, init_range, rng)?;

        // The old output connection is replaced by the new hidden layer.
        self.connections.pop();
        self.connections.push(hidden);
        self.connections.push(output);
        self.hidden_activations.push(activation);

        debug!(
            layer = self.num_layers(),
            units = num_units,
            activation = %activation.kind(),
            "Added hidden layer."
        );

        Ok(())
    }

    pub fn layer_details(&self, layer: usize) -> Option<ActivationConfig> {
        self.hidden_activations.get(layer).copied()
    }

    /// The activation configuration of layer `layer`, where index `num_layers()` is the output
    /// layer.
    pub fn layer_activation(&self, layer: usize) -> Option<ActivationConfig> {
        if layer == self.num_layers() {
            Some(self.output_activation)
        } else {
            self.layer_details(layer)
        }
    }

    /// Propagates `inputs` through the network and returns the output layer's activations.
    /// Values beyond the network's input count are ignored.
    pub fn response(&mut self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
        if self.connections.is_empty() {
            return Err(NetworkError::NoLayers);
        }
        if inputs.len() < self.num_inputs {
            return Err(NetworkError::InputLength {
                expected: self.num_inputs,
                actual: inputs.len(),
            });
        }

        self.activations.clear();
        self.unit_inputs.clear();

        let num_layers = self.num_layers();
        let mut signal = inputs[..self.num_inputs].to_vec();

        for (layer, connection) in self.connections.iter_mut().enumerate() {
            connection.set_inputs(&signal)?;
            let unit_inputs = connection.outputs();

            let activation = if layer < num_layers {
                self.hidden_activations[layer]
            } else {
                self.output_activation
            };

            signal = unit_inputs
                .iter()
                .map(|&x| activation.activation(x))
                .collect();

            self.unit_inputs.push(unit_inputs);
            self.activations.push(signal.clone());
        }

        trace!(?inputs, outputs = ?signal, "Response.");

        Ok(signal)
    }

    /// The activations from the last response for `layer`, where index `num_layers()` is the
    /// output layer.
    pub fn activations(&self, layer: usize) -> Option<&[f64]> {
        self.activations.get(layer).map(Vec::as_slice)
    }

    /// The activation function inputs from the last response for `layer`.
    pub fn unit_inputs(&self, layer: usize) -> Option<&[f64]> {
        self.unit_inputs.get(layer).map(Vec::as_slice)
    }

    pub fn weighted_connection(&self, layer: usize) -> Option<&WeightedConnection> {
        self.connections.get(layer)
    }

    pub fn weighted_connection_mut(&mut self, layer: usize) -> Option<&mut WeightedConnection> {
        self.connections.get_mut(layer)
    }

    pub fn weighted_connections(&self) -> &[WeightedConnection] {
        &self.connections
    }

    /// Replaces the connection at `layer`. The replacement must have the same shape.
    pub fn set_weighted_connection(
        &mut self,
        connection: WeightedConnection,
        layer: usize,
    ) -> Result<(), NetworkError> {
        let existing = self
            .connections
            .get_mut(layer)
            .ok_or(NetworkError::LayerIndex(layer))?;

        if existing.num_inputs() != connection.num_inputs()
            || existing.num_outputs() != connection.num_outputs()
        {
            return Err(NetworkError::ConnectionShape);
        }

        *existing = connection;
        Ok(())
    }

    /// Builds a network from already validated parts.
    pub(crate) fn from_parts(
        num_inputs: usize,
        num_outputs: usize,
        output_activation: ActivationConfig,
        hidden_activations: Vec<ActivationConfig>,
        connections: Vec<WeightedConnection>,
    ) -> Self {
        Self {
            num_inputs,
            num_outputs,
            output_activation,
            hidden_activations,
            connections,
            activations: Vec::new(),
            unit_inputs: Vec::new(),
        }
    }

    /// Writes the network in the text format described in [`crate::format`].
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), NetworkError> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, DeserializationError> {
        std::fs::read_to_string(path)?.parse()
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), NetworkError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)
            .map_err(|error| NetworkError::Io(error.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a network saved with [`Network::save_json`]. Topology and activation parameters
    /// are checked while deserializing.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DeserializationError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Checks the invariants of a network that did not come through `add_layer`.
    pub(crate) fn validate(&self) -> Result<(), DeserializationError> {
        use DeserializationError::Topology;

        for activation in self.hidden_activations.iter().chain([&self.output_activation]) {
            let (slope, amplify) = (activation.slope(), activation.amplify());
            if !(slope > 0.0 && amplify > 0.0) {
                return Err(DeserializationError::ActivationParameter { slope, amplify });
            }
        }

        if self.connections.is_empty() {
            return if self.hidden_activations.is_empty() {
                Ok(())
            } else {
                Err(Topology("hidden layers without connections"))
            };
        }

        if self.connections.len() != self.hidden_activations.len() + 1 {
            return Err(Topology("layer count does not match connection count"));
        }

        let mut expected_inputs = self.num_inputs;
        for connection in &self.connections {
            if connection.num_inputs() == 0 || connection.num_outputs() == 0 {
                return Err(Topology("empty weighted connection"));
            }
            if connection.num_inputs() != expected_inputs {
                return Err(Topology("connection inputs do not match previous layer"));
            }
            if connection.weights().len() != connection.num_outputs()
                || connection
                    .weights()
                    .iter()
                    .any(|row| row.len() != connection.num_inputs())
            {
                return Err(Topology("weight matrix does not match connection size"));
            }
            expected_inputs = connection.num_outputs();
        }

        if expected_inputs != self.num_outputs {
            return Err(Topology("output connection does not match output count"));
        }

        Ok(())
    }
}
