use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DeserializationError, NetworkError};

/// The dense links between two adjacent layers.
///
/// Every input node is connected to every output node. Row `i` of the weight matrix holds the
/// weights feeding output node `i`, one per input node.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "SerializedConnection")]
pub struct WeightedConnection {
    num_inputs: usize,
    num_outputs: usize,
    weights: Vec<Vec<f64>>,
    #[serde(skip)]
    inputs: Vec<f64>,
    #[serde(skip)]
    outputs: Vec<f64>,
}

#[derive(Deserialize)]
struct SerializedConnection {
    num_inputs: usize,
    num_outputs: usize,
    weights: Vec<Vec<f64>>,
}

impl TryFrom<SerializedConnection> for WeightedConnection {
    type Error = DeserializationError;

    fn try_from(connection: SerializedConnection) -> Result<Self, Self::Error> {
        if connection.num_inputs == 0 || connection.num_outputs == 0 {
            return Err(DeserializationError::Topology("empty weighted connection"));
        }
        if connection.weights.len() != connection.num_outputs
            || connection
                .weights
                .iter()
                .any(|row| row.len() != connection.num_inputs)
        {
            return Err(DeserializationError::Topology(
                "weight matrix does not match connection size",
            ));
        }

        Ok(Self::from_weights(connection.num_inputs, connection.weights))
    }
}

impl WeightedConnection {
    pub fn zeros(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            weights: vec![vec![0.0; num_inputs]; num_outputs],
            inputs: vec![0.0; num_inputs],
            outputs: vec![0.0; num_outputs],
        }
    }

    /// Builds a connection around an existing weight matrix, one row per output node.
    pub(crate) fn from_weights(num_inputs: usize, weights: Vec<Vec<f64>>) -> Self {
        let num_outputs = weights.len();
        Self {
            num_inputs,
            num_outputs,
            weights,
            inputs: vec![0.0; num_inputs],
            outputs: vec![0.0; num_outputs],
        }
    }

    /// Creates a connection with weights drawn uniformly from `-init_range / 2..=init_range / 2`.
    pub fn random(
        num_inputs: usize,
        num_outputs: usize,
        init_range: f64,
        rng: &mut impl Rng,
    ) -> Result<Self, NetworkError> {
        validate(num_inputs, num_outputs, init_range)?;

        let mut connection = Self::zeros(num_inputs, num_outputs);
        connection.randomize(init_range, rng);
        Ok(connection)
    }

    /// Reallocates the connection with new dimensions and random weights. On error the
    /// connection is left as it was.
    pub fn resize(
        &mut self,
        num_inputs: usize,
        num_outputs: usize,
        init_range: f64,
        rng: &mut impl Rng,
    ) -> Result<(), NetworkError> {
        *self = Self::random(num_inputs, num_outputs, init_range, rng)?;
        Ok(())
    }

    fn randomize(&mut self, init_range: f64, rng: &mut impl Rng) {
        let half_range = init_range / 2.0;
        let distribution = Uniform::new_inclusive(-half_range, half_range);

        self.weights
            .iter_mut()
            .flatten()
            .for_each(|w| *w = distribution.sample(rng));
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    pub fn set_inputs(&mut self, inputs: &[f64]) -> Result<(), NetworkError> {
        if inputs.len() != self.num_inputs {
            return Err(NetworkError::InputLength {
                expected: self.num_inputs,
                actual: inputs.len(),
            });
        }

        self.inputs.clear();
        self.inputs.extend_from_slice(inputs);
        Ok(())
    }

    /// Applies the weights to the last inputs set.
    pub fn outputs(&mut self) -> Vec<f64> {
        self.outputs.clear();
        self.outputs
            .extend(self.weights.iter().map(|row| dot(row, &self.inputs)));
        self.outputs.clone()
    }

    pub fn weight_vector(&self, node: usize) -> Option<&[f64]> {
        self.weights.get(node).map(Vec::as_slice)
    }

    pub fn set_weight_vector(&mut self, node: usize, weights: &[f64]) -> Result<(), NetworkError> {
        let num_inputs = self.num_inputs;
        let row = self
            .weights
            .get_mut(node)
            .ok_or(NetworkError::NodeIndex(node))?;

        if weights.len() != num_inputs {
            return Err(NetworkError::WeightLength {
                expected: num_inputs,
                actual: weights.len(),
            });
        }

        row.copy_from_slice(weights);
        Ok(())
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    /// Row-wise mutable access to the weights. Rows cannot be resized through this.
    pub fn weights_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
        self.weights.iter_mut().map(Vec::as_mut_slice)
    }
}

fn validate(num_inputs: usize, num_outputs: usize, init_range: f64) -> Result<(), NetworkError> {
    if num_inputs == 0 {
        return Err(NetworkError::InvalidParameter("number of input nodes"));
    }
    if num_outputs == 0 {
        return Err(NetworkError::InvalidParameter("number of output nodes"));
    }
    if !(init_range > 0.0) || !init_range.is_finite() {
        return Err(NetworkError::InvalidParameter("initialisation range"));
    }
    Ok(())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}
