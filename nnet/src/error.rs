use std::error::Error;
use std::fmt;
use std::io::Error as IoError;

#[derive(Clone, Debug, PartialEq)]
pub enum NetworkError {
    InvalidParameter(&'static str),
    NoInputs,
    NoOutputs,
    NoLayers,
    InputLength { expected: usize, actual: usize },
    WeightLength { expected: usize, actual: usize },
    LayerIndex(usize),
    NodeIndex(usize),
    ConnectionShape,
    Io(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {what}"),
            Self::NoInputs => write!(f, "the number of network inputs has not been set"),
            Self::NoOutputs => write!(f, "the number of network outputs has not been set"),
            Self::NoLayers => write!(f, "the network has no layers"),
            Self::InputLength { expected, actual } => {
                write!(f, "expected {expected} input values, got {actual}")
            }
            Self::WeightLength { expected, actual } => {
                write!(f, "expected {expected} weights, got {actual}")
            }
            Self::LayerIndex(layer) => write!(f, "layer index out of bounds: {layer}"),
            Self::NodeIndex(node) => write!(f, "node index out of bounds: {node}"),
            Self::ConnectionShape => {
                write!(f, "weighted connection does not fit the network topology")
            }
            Self::Io(message) => write!(f, "i/o error: {message}"),
        }
    }
}

impl Error for NetworkError {}

impl From<IoError> for NetworkError {
    fn from(error: IoError) -> Self {
        NetworkError::Io(error.to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrainingError {
    SetLength { inputs: usize, targets: usize },
    TargetLength { expected: usize, actual: usize },
    Network(NetworkError),
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetLength { inputs, targets } => write!(
                f,
                "training set has {inputs} input vectors but {targets} target vectors"
            ),
            Self::TargetLength { expected, actual } => {
                write!(f, "expected {expected} target values, got {actual}")
            }
            Self::Network(error) => error.fmt(f),
        }
    }
}

impl Error for TrainingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Network(error) => Some(error),
            _ => None,
        }
    }
}

impl From<NetworkError> for TrainingError {
    fn from(error: NetworkError) -> Self {
        Self::Network(error)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeserializationError {
    UnexpectedEnd,
    InvalidNumber(String),
    InvalidTag(String),
    InvalidActivation(i64),
    Topology(&'static str),
    ActivationParameter { slope: f64, amplify: f64 },
    TrailingData(String),
    Json(String),
    Io(String),
}

impl fmt::Display for DeserializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "unexpected end of network data"),
            Self::InvalidNumber(token) => write!(f, "invalid number: {token}"),
            Self::InvalidTag(token) => write!(f, "expected layer tag 'L', found: {token}"),
            Self::InvalidActivation(code) => write!(f, "invalid activation function code: {code}"),
            Self::Topology(what) => write!(f, "inconsistent network topology: {what}"),
            Self::ActivationParameter { slope, amplify } => write!(
                f,
                "activation slope and amplify must be positive, found slope {slope} and amplify {amplify}"
            ),
            Self::TrailingData(token) => write!(f, "unexpected data after network: {token}"),
            Self::Json(message) => write!(f, "invalid network json: {message}"),
            Self::Io(message) => write!(f, "i/o error: {message}"),
        }
    }
}

impl Error for DeserializationError {}

impl From<IoError> for DeserializationError {
    fn from(error: IoError) -> Self {
        DeserializationError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for DeserializationError {
    fn from(error: serde_json::Error) -> Self {
        DeserializationError::Json(error.to_string())
    }
}
