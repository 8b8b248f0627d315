use std::process::ExitCode;

use tracing::{debug, error};

use nnet::format::General;
use nnet::Network;

use crate::args::RespondConfig;

pub fn run_respond(config: RespondConfig) -> ExitCode {
    let loaded = if config.json {
        Network::load_json(&config.network)
    } else {
        Network::read_from_file(&config.network)
    };

    let mut network = match loaded {
        Ok(network) => network,
        Err(err) => {
            error!(error = %err, file = ?config.network, "Could not load network.");
            return ExitCode::FAILURE;
        }
    };

    debug!(
        inputs = network.num_inputs(),
        outputs = network.num_outputs(),
        layers = network.num_layers(),
        "Loaded network."
    );

    match network.response(&config.values) {
        Ok(response) => {
            println!("{}", format_values(&response));
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "Could not compute response.");
            ExitCode::FAILURE
        }
    }
}

fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|&value| General(value).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_response() {
        assert_eq!(format_values(&[0.5, -2.0, 1e-7]), "0.5 -2 1E-07");
        assert_eq!(format_values(&[]), "");
    }
}
