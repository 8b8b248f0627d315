//! The plain text network format.
//!
//! A network is written as a single line of space separated tokens:
//!
//! ```text
//! numInputs numOutputs numLayers outputKind outputSlope outputAmplify
//! L numIn numOut kind slope amplify w(0,0) w(0,1) ... w(numOut-1,numIn-1)
//! L ...
//! ```
//!
//! with one `L` block per weighted connection, the output connection last. The output
//! connection's block carries `0 0 0` for its kind, slope and amplify, since the output layer's
//! activation is stored in the header. Every token is followed by a single space and the line is
//! terminated with a newline.
//!
//! Numbers are written in a general format that round-trips exactly: the shortest decimal
//! representation, switching to `d.dddE+XX` notation when the decimal exponent is below -5 or
//! at least 16.

use std::fmt;
use std::str::{FromStr, SplitWhitespace};

use tracing::debug;

use crate::activation::{ActivationConfig, ActivationKind};
use crate::connection::WeightedConnection;
use crate::error::DeserializationError;
use crate::network::Network;

const LAYER_TAG: &str = "L";

/// Formats an `f64` in the general number format.
#[derive(Clone, Copy, Debug)]
pub struct General(pub f64);

impl fmt::Display for General {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;

        if value.is_nan() {
            return write!(f, "NaN");
        } else if value.is_infinite() {
            return write!(f, "{}", if value > 0.0 { "Infinity" } else { "-Infinity" });
        } else if value == 0.0 {
            return write!(f, "{}", if value.is_sign_negative() { "-0" } else { "0" });
        }

        let scientific = format!("{value:e}");
        let exponent = scientific
            .split_once('e')
            .and_then(|(mantissa, exponent)| Some((mantissa, exponent.parse::<i32>().ok()?)));

        match exponent {
            Some((mantissa, exponent)) if !(-5..16).contains(&exponent) => {
                let sign = if exponent < 0 { '-' } else { '+' };
                write!(f, "{mantissa}E{sign}{:02}", exponent.abs())
            }
            _ => write!(f, "{value}"),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = self.output_activation();

        write!(
            f,
            "{} {} {} {} {} {} ",
            self.num_inputs(),
            self.num_outputs(),
            self.num_layers(),
            output.kind().code(),
            General(output.slope()),
            General(output.amplify()),
        )?;

        for (layer, connection) in self.weighted_connections().iter().enumerate() {
            let (code, slope, amplify) = match self.layer_details(layer) {
                Some(activation) => (
                    activation.kind().code(),
                    activation.slope(),
                    activation.amplify(),
                ),
                None => (0, 0.0, 0.0),
            };

            write!(
                f,
                "{LAYER_TAG} {} {} {code} {} {} ",
                connection.num_inputs(),
                connection.num_outputs(),
                General(slope),
                General(amplify),
            )?;

            for weight in connection.weights().iter().flatten() {
                write!(f, "{} ", General(*weight))?;
            }
        }

        writeln!(f)
    }
}

impl FromStr for Network {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = Tokens(s.split_whitespace());

        let num_inputs = tokens.count()?;
        let num_outputs = tokens.count()?;
        let num_layers = tokens.count()?;
        let output_kind = tokens.activation()?;
        let output_slope = tokens.number()?;
        let output_amplify = tokens.number()?;

        let connection_count = match num_layers {
            0 => 0,
            _ => num_layers
                .checked_add(1)
                .ok_or(DeserializationError::Topology("layer count too large"))?,
        };

        let mut hidden_activations = Vec::new();
        let mut connections = Vec::new();

        for layer in 0..connection_count {
            tokens.tag()?;

            let layer_inputs = tokens.count()?;
            let layer_outputs = tokens.count()?;
            let kind = tokens.activation()?;
            let slope = tokens.number()?;
            let amplify = tokens.number()?;

            if layer_inputs == 0 || layer_outputs == 0 {
                return Err(DeserializationError::Topology("empty weighted connection"));
            }

            if layer < num_layers {
                if !(slope > 0.0 && amplify > 0.0) {
                    debug!(layer, slope, amplify, "Replacing non-positive activation parameters.");
                }
                hidden_activations.push(ActivationConfig::new(kind, slope, amplify));
            }

            let mut weights = Vec::new();
            for _ in 0..layer_outputs {
                let row = (0..layer_inputs)
                    .map(|_| tokens.number())
                    .collect::<Result<Vec<_>, _>>()?;
                weights.push(row);
            }

            connections.push(WeightedConnection::from_weights(layer_inputs, weights));
        }

        if let Some(token) = tokens.0.next() {
            return Err(DeserializationError::TrailingData(token.to_owned()));
        }

        let network = Network::from_parts(
            num_inputs,
            num_outputs,
            ActivationConfig::new(output_kind, output_slope, output_amplify),
            hidden_activations,
            connections,
        );
        network.validate()?;

        Ok(network)
    }
}

struct Tokens<'a>(SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn next(&mut self) -> Result<&'a str, DeserializationError> {
        self.0.next().ok_or(DeserializationError::UnexpectedEnd)
    }

    fn integer(&mut self) -> Result<i64, DeserializationError> {
        let token = self.next()?;
        token
            .parse()
            .map_err(|_| DeserializationError::InvalidNumber(token.to_owned()))
    }

    fn count(&mut self) -> Result<usize, DeserializationError> {
        let token = self.next()?;
        token
            .parse()
            .map_err(|_| DeserializationError::InvalidNumber(token.to_owned()))
    }

    fn number(&mut self) -> Result<f64, DeserializationError> {
        let token = self.next()?;
        token
            .parse()
            .map_err(|_| DeserializationError::InvalidNumber(token.to_owned()))
    }

    fn activation(&mut self) -> Result<ActivationKind, DeserializationError> {
        let code = self.integer()?;
        ActivationKind::from_code(code).ok_or(DeserializationError::InvalidActivation(code))
    }

    fn tag(&mut self) -> Result<(), DeserializationError> {
        match self.next()? {
            LAYER_TAG => Ok(()),
            token => Err(DeserializationError::InvalidTag(token.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn tanh_network() -> Network {
        let mut rng = StdRng::seed_from_u64(42);

        let mut network = Network::new();
        network.set_num_inputs(2);
        network.set_num_outputs(1);
        network.set_output_activation(ActivationKind::Linear.into());
        network
            .add_layer(3, ActivationKind::Tanh.into(), 2.0, &mut rng)
            .unwrap();
        network
    }

    #[test]
    fn general_numbers() {
        let cases = [
            (0.0, "0"),
            (-0.0, "-0"),
            (1.0, "1"),
            (-2.5, "-2.5"),
            (0.1, "0.1"),
            (0.00001, "0.00001"),
            (0.000001, "1E-06"),
            (-1.5e-7, "-1.5E-07"),
            (123456789012345.0, "123456789012345"),
            (1e16, "1E+16"),
            (2.5e300, "2.5E+300"),
            (f64::NAN, "NaN"),
            (f64::INFINITY, "Infinity"),
            (f64::NEG_INFINITY, "-Infinity"),
        ];

        for (value, expected) in cases {
            assert_eq!(General(value).to_string(), expected);
        }
    }

    #[test]
    fn general_numbers_round_trip() {
        let values = [
            0.1 + 0.2,
            std::f64::consts::PI,
            -1.0 / 3.0,
            1.2345678901234567e-12,
            9.87654321e22,
            f64::MIN_POSITIVE,
            f64::MAX,
        ];

        for value in values {
            let parsed: f64 = General(value).to_string().parse().unwrap();
            assert_eq!(parsed.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn layout() {
        let mut network = Network::new();
        network.set_num_inputs(2);
        network.set_num_outputs(1);
        network.set_output_activation(ActivationConfig::new(ActivationKind::Unipolar, 1.0, 2.0));
        network
            .add_layer(
                2,
                ActivationConfig::new(ActivationKind::Bipolar, 0.5, 1.0),
                2.0,
                &mut StdRng::seed_from_u64(0),
            )
            .unwrap();

        let mut hidden = WeightedConnection::zeros(2, 2);
        hidden.set_weight_vector(0, &[1.0, -2.0]).unwrap();
        hidden.set_weight_vector(1, &[0.25, 3.0]).unwrap();
        network.set_weighted_connection(hidden, 0).unwrap();

        let mut output = WeightedConnection::zeros(2, 1);
        output.set_weight_vector(0, &[0.5, -0.125]).unwrap();
        network.set_weighted_connection(output, 1).unwrap();

        assert_eq!(
            network.to_string(),
            "2 1 1 1 1 2 L 2 2 2 0.5 1 1 -2 0.25 3 L 2 1 0 0 0 0.5 -0.125 \n"
        );
    }

    #[test]
    fn round_trip() {
        let mut network = tanh_network();
        let mut loaded: Network = network.to_string().parse().unwrap();

        assert_eq!(loaded.to_string(), network.to_string());

        for inputs in [[0.0, 0.0], [0.3, -0.9], [12.5, 4.0]] {
            let expected = network.response(&inputs).unwrap();
            let actual = loaded.response(&inputs).unwrap();
            assert_eq!(
                actual.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
                expected.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            );
        }
    }

    #[test]
    fn file_round_trip() {
        let network = tanh_network();
        let path = std::env::temp_dir().join(format!("nnet_format_{}.net", std::process::id()));

        network.write_to_file(&path).unwrap();
        let loaded = Network::read_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.weighted_connections(), network.weighted_connections());
        assert_eq!(loaded.layer_details(0), network.layer_details(0));
        assert_eq!(loaded.output_activation(), network.output_activation());
    }

    #[test]
    fn reads_windows_line_endings() {
        let text = "1 1 1 10 1 1 L 1 1 3 1 1 0.5 L 1 1 0 0 0 2 \r\n";
        let mut network: Network = text.parse().unwrap();

        assert_eq!(network.num_layers(), 1);
        assert_eq!(network.output_activation().kind(), ActivationKind::Linear);
        assert_eq!(
            network.layer_details(0).map(|a| a.kind()),
            Some(ActivationKind::Tanh)
        );
        assert_eq!(network.response(&[0.0]).unwrap(), vec![0.0]);
    }

    #[test]
    fn empty_network() {
        let network = Network::new();
        let text = network.to_string();
        assert_eq!(text, "0 0 0 0 1 1 \n");
        assert_eq!(text.parse::<Network>().unwrap(), network);
    }

    #[test]
    fn malformed_input() {
        use DeserializationError::*;

        let cases = [
            ("", UnexpectedEnd),
            ("1 1 1 10 1 1 L 1 1 3 1 1 0.5 L 1 1 0 0 0", UnexpectedEnd),
            ("1 x 1 10 1 1", InvalidNumber("x".to_owned())),
            ("1 1 1 10 1 1 L 1 1 3 1 1 abc L 1 1 0 0 0 2", InvalidNumber("abc".to_owned())),
            ("1 1 1 10 1 1 X 1 1 3 1 1 0.5 L 1 1 0 0 0 2", InvalidTag("X".to_owned())),
            ("1 1 1 14 1 1", InvalidActivation(14)),
            ("1 1 1 10 1 1 L 1 1 -1 1 1 0.5 L 1 1 0 0 0 2", InvalidActivation(-1)),
            ("1 1 1 10 1 1 L 1 1 3 1 1 0.5 L 1 1 0 0 0 2 7", TrailingData("7".to_owned())),
            (
                "2 1 1 10 1 1 L 1 1 3 1 1 0.5 L 1 1 0 0 0 2",
                Topology("connection inputs do not match previous layer"),
            ),
            (
                "1 2 1 10 1 1 L 1 1 3 1 1 0.5 L 1 1 0 0 0 2",
                Topology("output connection does not match output count"),
            ),
            ("1 1 1 10 1 1 L 0 1 3 1 1 L 1 1 0 0 0 2", Topology("empty weighted connection")),
        ];

        for (text, expected) in cases {
            assert_eq!(text.parse::<Network>(), Err(expected), "{text:?}");
        }

        let huge = format!("1 1 {} 10 1 1", usize::MAX);
        assert_eq!(
            huge.parse::<Network>(),
            Err(Topology("layer count too large"))
        );
    }

    #[test]
    fn non_positive_layer_parameters_are_replaced() {
        let text = "1 1 1 10 1 1 L 1 1 3 0 -2 0.5 L 1 1 0 0 0 2 ";
        let network: Network = text.parse().unwrap();

        let hidden = network.layer_details(0).unwrap();
        assert_eq!(hidden.kind(), ActivationKind::Tanh);
        assert_eq!(hidden.slope(), 1.0);
        assert_eq!(hidden.amplify(), 1.0);
    }
}
