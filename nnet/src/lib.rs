//! A small feed-forward neural network engine trained by online backpropagation.

mod activation;
mod connection;
mod error;
pub mod format;
mod network;
mod trainer;

pub use activation::{ActivationConfig, ActivationKind};
pub use connection::WeightedConnection;
pub use error::{DeserializationError, NetworkError, TrainingError};
pub use network::{Network, DEFAULT_INIT_RANGE};
pub use trainer::{Trainer, DEFAULT_LEARNING_CONSTANT};
