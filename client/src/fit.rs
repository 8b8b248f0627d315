use std::fmt;
use std::process::ExitCode;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use nnet::{Network, NetworkError, Trainer, TrainingError};

use crate::args::{Alias, FitConfig, Hidden, Output, Training};
use crate::data::{DataError, DataTable};
use crate::output::{model_results, write_results_file};

/// How often, in epochs, training progress is logged.
const PROGRESS_INTERVAL: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitOutcome {
    /// The scaled epoch error fell below the minimum error.
    Converged { epoch: usize, error: f64 },
    /// Training ran out of iterations. The network is the one that achieved `min_error`.
    NotConverged { min_error: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum FitError {
    Diverged { epoch: usize, error: f64 },
    Training(TrainingError),
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diverged { epoch, error } => write!(
                f,
                "training produced an invalid network error ({error}) at epoch {epoch}"
            ),
            Self::Training(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for FitError {}

impl From<TrainingError> for FitError {
    fn from(error: TrainingError) -> Self {
        Self::Training(error)
    }
}

pub fn run_fit(config: FitConfig) -> ExitCode {
    let mut table = match DataTable::from_file(&config.data, config.header) {
        Ok(table) => table,
        Err(err) => {
            error!(error = %err, file = ?config.data, "Could not read data file.");
            return ExitCode::FAILURE;
        }
    };

    let columns = apply_aliases(&mut table, &config.alias)
        .and_then(|()| read_columns(&mut table, &config.x, &config.y));

    let (x, y) = match columns {
        Ok(columns) => columns,
        Err(err) => {
            error!(error = %err, columns = ?table.column_names(), "Invalid column.");
            return ExitCode::FAILURE;
        }
    };

    let (inputs, targets) = scaled_training_set(&x, &y, config.training.scale);

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut network = match build_network(&config.hidden, &config.output, &mut rng) {
        Ok(network) => network,
        Err(err) => {
            error!(error = %err, "Could not build network.");
            return ExitCode::FAILURE;
        }
    };

    let mut trainer = Trainer::from_seed(rng.gen());
    if let Err(err) = trainer.add_new_training_set(inputs.clone(), targets.clone()) {
        error!(error = %err, "Invalid training set.");
        return ExitCode::FAILURE;
    }

    info!(
        rows = table.num_rows(),
        hidden_units = config.hidden.units,
        hidden = %config.hidden.activation.kind(),
        output = %config.output.activation.kind(),
        "Fitting model."
    );

    match fit(&mut network, &mut trainer, &config.training) {
        Ok(FitOutcome::Converged { epoch, error }) => {
            info!(epoch, error, "The solution has converged.");
        }
        Ok(FitOutcome::NotConverged { min_error }) => {
            warn!(
                min_error,
                "The solution has not converged. Using the network that achieved the minimum error."
            );
        }
        Err(err) => {
            error!(error = %err, "Training stopped. Adjust the model settings and try again.");
            return ExitCode::FAILURE;
        }
    }

    if let Some(path) = &config.network {
        if let Err(err) = network.write_to_file(path) {
            error!(error = %err, file = ?path, "Could not save network.");
            return ExitCode::FAILURE;
        }
        info!(file = ?path, "Saved network.");
    }

    if let Some(path) = &config.json {
        if let Err(err) = network.save_json(path) {
            error!(error = %err, file = ?path, "Could not save network.");
            return ExitCode::FAILURE;
        }
        info!(file = ?path, "Saved network.");
    }

    if let Some(path) = &config.results {
        let rows = match model_results(&mut network, &inputs, &targets, config.training.scale) {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "Could not evaluate model.");
                return ExitCode::FAILURE;
            }
        };

        if let Err(err) = write_results_file(path, &rows) {
            error!(error = %err, file = ?path, "Could not write results.");
            return ExitCode::FAILURE;
        }
        info!(file = ?path, "Wrote results.");
    }

    ExitCode::SUCCESS
}

fn apply_aliases(table: &mut DataTable, aliases: &[Alias]) -> Result<(), DataError> {
    for alias in aliases {
        let column = table.resolve_column(&alias.column)?;
        table.set_alias(&alias.value, alias.alias, column);
    }
    Ok(())
}

fn read_columns(
    table: &mut DataTable,
    x: &str,
    y: &str,
) -> Result<(Vec<f64>, Vec<f64>), DataError> {
    let x = table.resolve_column(x)?;
    let y = table.resolve_column(y)?;
    Ok((table.numeric_column(x)?, table.numeric_column(y)?))
}

/// Builds a single hidden layer network with one input and one output.
pub fn build_network(
    hidden: &Hidden,
    output: &Output,
    rng: &mut impl Rng,
) -> Result<Network, NetworkError> {
    let mut network = Network::new();
    network.set_num_inputs(1);
    network.set_num_outputs(1);
    network.set_output_activation(output.activation);
    network.add_layer(hidden.units, hidden.activation, hidden.init_range, rng)?;
    Ok(network)
}

/// Pairs up the predictor and response values, dividing each by `scale`.
pub fn scaled_training_set(x: &[f64], y: &[f64], scale: f64) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    x.iter()
        .zip(y)
        .map(|(x, y)| (vec![x / scale], vec![y / scale]))
        .unzip()
}

/// Trains until the scaled epoch error drops below `training.min_error` or the iterations run
/// out. In the latter case `network` is replaced by the lowest error network seen.
pub fn fit(
    network: &mut Network,
    trainer: &mut Trainer,
    training: &Training,
) -> Result<FitOutcome, FitError> {
    trainer.set_learning_constant(training.learning_constant);
    trainer.set_momentum(training.momentum);

    let mut best: Option<(f64, Network)> = None;

    for epoch in 1..=training.iterations {
        trainer.reset_net_error();
        trainer.train_one_epoch(network)?;

        let error = trainer.net_error() * training.scale;

        if !error.is_finite() {
            return Err(FitError::Diverged { epoch, error });
        }

        if error < training.min_error {
            return Ok(FitOutcome::Converged { epoch, error });
        }

        if best.as_ref().map_or(true, |(min_error, _)| error < *min_error) {
            best = Some((error, network.clone()));
        }

        if epoch % PROGRESS_INTERVAL == 0 {
            debug!(epoch, error, "Training.");
        }
    }

    match best {
        Some((min_error, best_network)) => {
            *network = best_network;
            Ok(FitOutcome::NotConverged { min_error })
        }
        None => Ok(FitOutcome::NotConverged {
            min_error: f64::INFINITY,
        }),
    }
}

#[cfg(test)]
mod tests {
    use nnet::{ActivationConfig, ActivationKind};

    use super::*;

    fn line_set(trainer: &mut Trainer, scale: f64) {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|x| 0.5 * x).collect();

        let (inputs, targets) = scaled_training_set(&x, &y, scale);
        trainer.add_new_training_set(inputs, targets).unwrap();
    }

    fn hidden(kind: ActivationKind, units: usize) -> Hidden {
        Hidden {
            units,
            activation: kind.into(),
            init_range: 2.0,
        }
    }

    fn output(kind: ActivationKind) -> Output {
        Output {
            activation: kind.into(),
        }
    }

    #[test]
    fn scales_training_set() {
        let (inputs, targets) = scaled_training_set(&[2.0, 4.0], &[10.0, 20.0], 2.0);
        assert_eq!(inputs, vec![vec![1.0], vec![2.0]]);
        assert_eq!(targets, vec![vec![5.0], vec![10.0]]);
    }

    #[test]
    fn builds_single_hidden_layer() {
        let mut rng = StdRng::seed_from_u64(0);
        let network = build_network(
            &hidden(ActivationKind::Tanh, 5),
            &output(ActivationKind::Linear),
            &mut rng,
        )
        .unwrap();

        assert_eq!(network.num_inputs(), 1);
        assert_eq!(network.num_outputs(), 1);
        assert_eq!(network.num_layers(), 1);
        assert_eq!(network.weighted_connection(0).unwrap().num_outputs(), 5);
        assert_eq!(
            network.output_activation(),
            ActivationConfig::from(ActivationKind::Linear)
        );
    }

    #[test]
    fn converges_on_learnable_set() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut network = build_network(
            &hidden(ActivationKind::Tanh, 4),
            &output(ActivationKind::Linear),
            &mut rng,
        )
        .unwrap();

        let mut trainer = Trainer::from_seed(2);
        line_set(&mut trainer, 10.0);

        let training = Training {
            iterations: 20000,
            min_error: 0.01,
            learning_constant: 0.1,
            momentum: 0.1,
            scale: 10.0,
        };

        match fit(&mut network, &mut trainer, &training).unwrap() {
            FitOutcome::Converged { epoch, error } => {
                assert!(epoch <= training.iterations);
                assert!(error < training.min_error);
            }
            outcome => panic!("did not converge: {outcome:?}"),
        }
    }

    #[test]
    fn reports_divergence() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut network = build_network(
            &hidden(ActivationKind::Linear, 2),
            &output(ActivationKind::Linear),
            &mut rng,
        )
        .unwrap();

        let mut trainer = Trainer::from_seed(3);
        trainer.add_to_training_set(vec![f64::NAN], vec![1.0]);

        assert!(matches!(
            fit(&mut network, &mut trainer, &Training::default()),
            Err(FitError::Diverged { epoch: 1, .. })
        ));
    }

    #[test]
    fn keeps_minimum_error_network() {
        let mut rng = StdRng::seed_from_u64(4);
        let start = build_network(
            &hidden(ActivationKind::Bipolar, 3),
            &output(ActivationKind::Linear),
            &mut rng,
        )
        .unwrap();

        // A zero minimum error can never be reached.
        let training = Training {
            iterations: 200,
            min_error: 0.0,
            learning_constant: 0.5,
            momentum: 0.5,
            scale: 1.0,
        };

        let mut network = start.clone();
        let mut trainer = Trainer::from_seed(4);
        line_set(&mut trainer, 10.0);
        let outcome = fit(&mut network, &mut trainer, &training).unwrap();

        // Replay the same training and pick the lowest error epoch by hand.
        let mut replay = start;
        let mut trainer = Trainer::from_seed(4);
        line_set(&mut trainer, 10.0);
        trainer.set_learning_constant(training.learning_constant);
        trainer.set_momentum(training.momentum);

        let mut snapshots = Vec::new();
        for _ in 0..training.iterations {
            trainer.reset_net_error();
            trainer.train_one_epoch(&mut replay).unwrap();
            snapshots.push((trainer.net_error(), replay.clone()));
        }
        let (min_error, best) = snapshots
            .into_iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .unwrap();

        assert_eq!(outcome, FitOutcome::NotConverged { min_error });
        assert_eq!(network, best);
    }
}
