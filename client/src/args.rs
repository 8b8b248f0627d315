use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args as ArgsTrait, Parser, Subcommand};

use nnet::{ActivationConfig, ActivationKind, DEFAULT_INIT_RANGE, DEFAULT_LEARNING_CONSTANT};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fits a neural network model to a column of data.
    Fit(FitConfig),
    /// Prints a saved network's response to the given input values.
    Respond(RespondConfig),
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct FitConfig {
    /// A comma separated data file.
    #[arg(short, long)]
    pub data: PathBuf,

    /// The first line of the data file holds column names.
    #[arg(long)]
    pub header: bool,

    /// The predictor column, by name or zero-based index.
    #[arg(short, long)]
    pub x: String,

    /// The response column, by name or zero-based index.
    #[arg(short, long)]
    pub y: String,

    /// A numeric value to use for a non-numeric data cell, as `column:value=number`. The column
    /// is a name or zero-based index. May be given more than once. Cells without an alias are
    /// numbered 0, 1, 2, ... in order of appearance within their column.
    #[arg(short, long, verbatim_doc_comment)]
    pub alias: Vec<Alias>,

    /// Hidden layer options.
    ///
    /// Parameters:
    ///   units=int          - The number of hidden units.
    ///   type=string        - The activation function. (threshold, unipolar, bipolar, tanh,
    ///                        gaussian, arctan, sine, cosine, sinc, elliot, linear, isru,
    ///                        softsign, or softplus)
    ///   slope=decimal      - The activation function's slope. (> 0)
    ///   amplify=decimal    - The activation function's amplification. (> 0)
    ///   init_range=decimal - The width of the range the initial weights are drawn from,
    ///                        centered on zero. (> 0)
    #[arg(
        long,
        default_value = "units=4,type=bipolar,slope=1,amplify=1,init_range=2",
        verbatim_doc_comment
    )]
    pub hidden: Hidden,

    /// Output layer options.
    ///
    /// Parameters:
    ///   type=string     - The activation function. (see `hidden`)
    ///   slope=decimal   - The activation function's slope. (> 0)
    ///   amplify=decimal - The activation function's amplification. (> 0)
    #[arg(
        long,
        default_value = "type=unipolar,slope=1,amplify=1",
        verbatim_doc_comment
    )]
    pub output: Output,

    /// Training options.
    ///
    /// Parameters:
    ///   iterations=int            - The maximum number of training epochs.
    ///   min_error=decimal         - Training stops once the scaled epoch error falls below this.
    ///   learning_constant=decimal - The gradient descent step size. (> 0)
    ///   momentum=decimal          - The fraction of the previous weight change to add to the
    ///                               next one. (0 disables momentum)
    ///   scale=decimal             - Data values are divided by this before training and the
    ///                               results multiplied by it afterwards. (> 0)
    #[arg(
        short,
        long,
        default_value = "iterations=10000,min_error=0.001,learning_constant=0.5,momentum=0.1,scale=1",
        verbatim_doc_comment
    )]
    pub training: Training,

    /// Seed for weight initialization and example shuffling. Random if not given.
    #[arg(long)]
    pub seed: Option<u64>,

    /// A file to save the trained network to, in text format.
    #[arg(short, long)]
    pub network: Option<PathBuf>,

    /// A file to save the trained network to, in JSON format.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// A file to write the input, target and model values to, in CSV format.
    #[arg(short, long)]
    pub results: Option<PathBuf>,
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct RespondConfig {
    /// The saved network.
    #[arg(short, long)]
    pub network: PathBuf,

    /// The network file is in JSON format rather than text format.
    #[arg(long)]
    pub json: bool,

    /// The input values.
    #[arg(required = true, allow_negative_numbers = true)]
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alias {
    pub column: String,
    pub value: String,
    pub alias: f64,
}

impl FromStr for Alias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cell, alias) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected column:value=number: {s}"))?;
        let (column, value) = cell
            .split_once(':')
            .ok_or_else(|| format!("expected column:value=number: {s}"))?;

        let alias = alias
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid alias value: {alias}"))?;

        Ok(Self {
            column: column.trim().to_owned(),
            value: value.trim().to_owned(),
            alias,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hidden {
    pub units: usize,
    pub activation: ActivationConfig,
    pub init_range: f64,
}

impl FromStr for Hidden {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;

        let units = parse_field(&fields, "units")?.unwrap_or(4);
        if units == 0 {
            return Err("the number of hidden units must be at least 1".to_owned());
        }

        let activation = parse_activation(&fields, ActivationKind::Bipolar)?;

        let init_range = parse_field(&fields, "init_range")?.unwrap_or(DEFAULT_INIT_RANGE);
        if !(init_range > 0.0) || !init_range.is_finite() {
            return Err(format!("invalid value for init_range (> 0): {init_range}"));
        }

        Ok(Self {
            units,
            activation,
            init_range,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Output {
    pub activation: ActivationConfig,
}

impl FromStr for Output {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;

        Ok(Self {
            activation: parse_activation(&fields, ActivationKind::Unipolar)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Training {
    pub iterations: usize,
    pub min_error: f64,
    pub learning_constant: f64,
    pub momentum: f64,
    pub scale: f64,
}

impl Default for Training {
    fn default() -> Self {
        Self {
            iterations: 10000,
            min_error: 0.001,
            learning_constant: DEFAULT_LEARNING_CONSTANT,
            momentum: 0.1,
            scale: 1.0,
        }
    }
}

impl FromStr for Training {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = parse_map(s)?;
        let default = Self::default();

        let iterations = parse_field(&fields, "iterations")?.unwrap_or(default.iterations);
        if iterations == 0 {
            return Err("the number of iterations must be at least 1".to_owned());
        }

        let min_error = parse_field(&fields, "min_error")?.unwrap_or(default.min_error);
        if !(min_error >= 0.0) {
            return Err(format!("invalid value for min_error (>= 0): {min_error}"));
        }

        let learning_constant = parse_field(&fields, "learning_constant")?
            .unwrap_or(default.learning_constant);
        if !(learning_constant > 0.0) {
            return Err(format!(
                "invalid value for learning_constant (> 0): {learning_constant}"
            ));
        }

        let momentum = parse_field(&fields, "momentum")?.unwrap_or(default.momentum);
        if !(momentum >= 0.0) {
            return Err(format!("invalid value for momentum (>= 0): {momentum}"));
        }

        let scale = parse_field(&fields, "scale")?.unwrap_or(default.scale);
        if !(scale > 0.0) || !scale.is_finite() {
            return Err(format!("invalid value for scale (> 0): {scale}"));
        }

        Ok(Self {
            iterations,
            min_error,
            learning_constant,
            momentum,
            scale,
        })
    }
}

fn parse_activation(
    fields: &HashMap<&str, &str>,
    default_kind: ActivationKind,
) -> Result<ActivationConfig, String> {
    let kind = parse_field(fields, "type")?.unwrap_or(default_kind);

    let slope = parse_field(fields, "slope")?.unwrap_or(1.0);
    if !(slope > 0.0) {
        return Err(format!("invalid value for slope (> 0): {slope}"));
    }

    let amplify = parse_field(fields, "amplify")?.unwrap_or(1.0);
    if !(amplify > 0.0) {
        return Err(format!("invalid value for amplify (> 0): {amplify}"));
    }

    Ok(ActivationConfig::new(kind, slope, amplify))
}

fn parse_field<T: FromStr>(fields: &HashMap<&str, &str>, key: &str) -> Result<Option<T>, String> {
    fields
        .get(key)
        .map(|&f| {
            f.parse::<T>()
                .map_err(|_| format!("invalid value for {key}: {f}"))
        })
        .transpose()
}

fn parse_map(string: &str) -> Result<HashMap<&str, &str>, String> {
    string
        .split(',')
        .map(|field| field.trim())
        .map(|field| field.split('=').map(|part| part.trim()))
        .map(|mut field_part| {
            let key = field_part
                .next()
                .ok_or_else(|| "no key for field".to_owned())?;
            let value = field_part
                .next()
                .ok_or_else(|| format!("no value for key: {key}"))?;
            Ok((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_options() {
        let hidden: Hidden = "units=6, type=Tanh, slope=0.5, init_range=1.5".parse().unwrap();

        assert_eq!(hidden.units, 6);
        assert_eq!(
            hidden.activation,
            ActivationConfig::new(ActivationKind::Tanh, 0.5, 1.0)
        );
        assert_eq!(hidden.init_range, 1.5);

        assert!("units=0".parse::<Hidden>().is_err());
        assert!("type=relu".parse::<Hidden>().is_err());
        assert!("slope=-1".parse::<Hidden>().is_err());
        assert!("init_range=0".parse::<Hidden>().is_err());
        assert!("units".parse::<Hidden>().is_err());
    }

    #[test]
    fn alias_options() {
        assert_eq!(
            "color: dark red = 4".parse::<Alias>(),
            Ok(Alias {
                column: "color".to_owned(),
                value: "dark red".to_owned(),
                alias: 4.0,
            })
        );
        assert!("color=4".parse::<Alias>().is_err());
        assert!("color:red".parse::<Alias>().is_err());
        assert!("color:red=x".parse::<Alias>().is_err());
    }

    #[test]
    fn output_defaults() {
        let output: Output = "amplify=2".parse().unwrap();
        assert_eq!(
            output.activation,
            ActivationConfig::new(ActivationKind::Unipolar, 1.0, 2.0)
        );
    }

    #[test]
    fn training_options() {
        let training: Training = "iterations=50,momentum=0,scale=10".parse().unwrap();

        assert_eq!(
            training,
            Training {
                iterations: 50,
                momentum: 0.0,
                scale: 10.0,
                ..Default::default()
            }
        );

        assert!("iterations=0".parse::<Training>().is_err());
        assert!("learning_constant=0".parse::<Training>().is_err());
        assert!("momentum=-0.5".parse::<Training>().is_err());
        assert!("scale=0".parse::<Training>().is_err());
        assert!("min_error=x".parse::<Training>().is_err());
    }

    #[test]
    fn command_line() {
        let args = Args::try_parse_from([
            "modelfit", "fit", "--data", "data.csv", "--header", "-x", "time", "-y", "1",
            "--seed", "7", "-a", "1:off=0", "-a", "1:on=1",
        ])
        .unwrap();

        let Command::Fit(config) = args.command else {
            panic!("expected the fit command");
        };
        assert!(config.header);
        assert_eq!(config.x, "time");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.alias.len(), 2);
        assert_eq!(config.alias[1].value, "on");
        assert_eq!(config.hidden.units, 4);
        assert_eq!(config.training, Training::default());

        let args =
            Args::try_parse_from(["modelfit", "respond", "-n", "net.txt", "0.5", "-1.5"]).unwrap();
        let Command::Respond(config) = args.command else {
            panic!("expected the respond command");
        };
        assert_eq!(config.values, vec![0.5, -1.5]);
        assert!(!config.json);
    }
}
