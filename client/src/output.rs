use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nnet::format::General;
use nnet::{Network, NetworkError};

const RESULTS_HEADER: &str = "input,target,model";

/// One row of fitted output, in unscaled data units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResultRow {
    pub input: f64,
    pub target: f64,
    pub model: f64,
}

/// Evaluates the network on every scaled training input and scales the results back up.
pub fn model_results(
    network: &mut Network,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
    scale: f64,
) -> Result<Vec<ResultRow>, NetworkError> {
    inputs
        .iter()
        .zip(targets)
        .map(|(input, target)| {
            let response = network.response(input)?;

            Ok(ResultRow {
                input: first(input) * scale,
                target: first(target) * scale,
                model: first(&response) * scale,
            })
        })
        .collect()
}

fn first(values: &[f64]) -> f64 {
    values.first().copied().unwrap_or(f64::NAN)
}

pub fn write_results(mut writer: impl Write, rows: &[ResultRow]) -> io::Result<()> {
    writeln!(writer, "{RESULTS_HEADER}")?;
    for row in rows {
        writeln!(
            writer,
            "{},{},{}",
            General(row.input),
            General(row.target),
            General(row.model)
        )?;
    }
    writer.flush()
}

pub fn write_results_file(path: impl AsRef<Path>, rows: &[ResultRow]) -> io::Result<()> {
    write_results(BufWriter::new(File::create(path)?), rows)
}

#[cfg(test)]
mod tests {
    use nnet::{ActivationKind, WeightedConnection};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn results_are_rescaled() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut network = Network::new();
        network.set_num_inputs(1);
        network.set_num_outputs(1);
        network.set_output_activation(ActivationKind::Linear.into());
        network
            .add_layer(1, ActivationKind::Linear.into(), 2.0, &mut rng)
            .unwrap();

        let mut hidden = WeightedConnection::zeros(1, 1);
        hidden.set_weight_vector(0, &[0.5]).unwrap();
        network.set_weighted_connection(hidden, 0).unwrap();
        let mut output = WeightedConnection::zeros(1, 1);
        output.set_weight_vector(0, &[3.0]).unwrap();
        network.set_weighted_connection(output, 1).unwrap();

        let rows = model_results(
            &mut network,
            &[vec![0.5], vec![0.25]],
            &[vec![0.75], vec![0.5]],
            4.0,
        )
        .unwrap();

        assert_eq!(
            rows,
            vec![
                ResultRow {
                    input: 2.0,
                    target: 3.0,
                    model: 3.0,
                },
                ResultRow {
                    input: 1.0,
                    target: 2.0,
                    model: 1.5,
                },
            ]
        );

        let mut buffer = Vec::new();
        write_results(&mut buffer, &rows).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "input,target,model\n2,3,3\n1,2,1.5\n"
        );
    }
}
