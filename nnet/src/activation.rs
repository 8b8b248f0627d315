use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Inputs closer to zero than this are treated as zero by `SinC`.
const SINC_EPSILON: f64 = 0.00001;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ActivationKind {
    #[default]
    Threshold,
    Unipolar,
    Bipolar,
    Tanh,
    Gaussian,
    Arctan,
    Sine,
    Cosine,
    SinC,
    Elliot,
    Linear,
    Isru,
    SoftSign,
    SoftPlus,
}

impl ActivationKind {
    pub const ALL: [ActivationKind; 14] = [
        Self::Threshold,
        Self::Unipolar,
        Self::Bipolar,
        Self::Tanh,
        Self::Gaussian,
        Self::Arctan,
        Self::Sine,
        Self::Cosine,
        Self::SinC,
        Self::Elliot,
        Self::Linear,
        Self::Isru,
        Self::SoftSign,
        Self::SoftPlus,
    ];

    /// The integer code used by the network file format.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index))
            .copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Unipolar => "unipolar",
            Self::Bipolar => "bipolar",
            Self::Tanh => "tanh",
            Self::Gaussian => "gaussian",
            Self::Arctan => "arctan",
            Self::Sine => "sine",
            Self::Cosine => "cosine",
            Self::SinC => "sinc",
            Self::Elliot => "elliot",
            Self::Linear => "linear",
            Self::Isru => "isru",
            Self::SoftSign => "softsign",
            Self::SoftPlus => "softplus",
        }
    }

    /// Evaluates the unamplified activation function at `x`.
    pub fn activate(self, slope: f64, x: f64) -> f64 {
        let sx = slope * x;

        match self {
            Self::Threshold => {
                if x >= 0.0 {
                    slope
                } else {
                    0.0
                }
            }
            Self::Unipolar => 1.0 / (1.0 + (-sx).exp()),
            Self::Bipolar => 2.0 / (1.0 + (-sx).exp()) - 1.0,
            Self::Tanh => sx.tanh(),
            Self::Gaussian => (-slope * x * x).exp(),
            Self::Arctan => sx.atan(),
            Self::Sine => sx.sin(),
            Self::Cosine => sx.cos(),
            Self::SinC => {
                if x.abs() < SINC_EPSILON {
                    1.0
                } else {
                    sx.sin() / sx
                }
            }
            Self::Elliot => (sx / 2.0) / (1.0 + sx.abs()) + 0.5,
            Self::Linear => sx,
            Self::Isru => x / (1.0 + slope * x * x).sqrt(),
            Self::SoftSign => sx / (1.0 + sx.abs()),
            Self::SoftPlus => sx.exp().ln_1p(),
        }
    }

    /// Evaluates the unamplified derivative of the activation function with respect to `x`.
    pub fn gradient(self, slope: f64, x: f64) -> f64 {
        let sx = slope * x;

        match self {
            // Zero everywhere except the origin, where the derivative is undefined.
            Self::Threshold => {
                if x == 0.0 {
                    slope
                } else {
                    0.0
                }
            }
            Self::Unipolar => {
                let exp = (-sx).exp();
                let denominator = 1.0 + exp;
                (slope * exp) / (denominator * denominator)
            }
            Self::Bipolar => {
                let exp = (-sx).exp();
                let denominator = 1.0 + exp;
                (2.0 * slope * exp) / (denominator * denominator)
            }
            Self::Tanh => {
                let tanh = sx.tanh();
                slope * (1.0 - tanh * tanh)
            }
            Self::Gaussian => -2.0 * slope * x * (-slope * x * x).exp(),
            Self::Arctan => slope / (1.0 + sx * sx),
            Self::Sine => slope * sx.cos(),
            Self::Cosine => -slope * sx.sin(),
            Self::SinC => {
                if x.abs() < SINC_EPSILON {
                    0.0
                } else {
                    (sx * sx.cos() - sx.sin()) / (slope * x * x)
                }
            }
            Self::Elliot => {
                let denominator = 1.0 + sx.abs();
                (0.5 * slope) / (denominator * denominator)
            }
            Self::Linear => slope,
            Self::Isru => {
                let root = 1.0 / (1.0 + slope * x * x).sqrt();
                root * root * root
            }
            Self::SoftSign => {
                let denominator = 1.0 + sx.abs();
                slope / (denominator * denominator)
            }
            Self::SoftPlus => {
                let exp = sx.exp();
                (slope * exp) / (1.0 + exp)
            }
        }
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ActivationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|kind| kind.name() == lower)
            .copied()
            .ok_or_else(|| format!("unknown activation function: {s}"))
    }
}

/// An activation function together with its slope and amplify parameters.
///
/// Slope and amplify must stay positive. Setting either to a non-positive value is ignored and
/// the previous value is kept.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ActivationConfig {
    kind: ActivationKind,
    slope: f64,
    amplify: f64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            kind: ActivationKind::default(),
            slope: 1.0,
            amplify: 1.0,
        }
    }
}

impl From<ActivationKind> for ActivationConfig {
    fn from(kind: ActivationKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }
}

impl ActivationConfig {
    pub fn new(kind: ActivationKind, slope: f64, amplify: f64) -> Self {
        let mut config = Self::from(kind);
        config.set_slope(slope);
        config.set_amplify(amplify);
        config
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn amplify(&self) -> f64 {
        self.amplify
    }

    pub fn set_kind(&mut self, kind: ActivationKind) {
        self.kind = kind;
    }

    pub fn set_slope(&mut self, slope: f64) {
        if slope > 0.0 {
            self.slope = slope;
        } else {
            trace!(slope, "Ignoring non-positive slope.");
        }
    }

    pub fn set_amplify(&mut self, amplify: f64) {
        if amplify > 0.0 {
            self.amplify = amplify;
        } else {
            trace!(amplify, "Ignoring non-positive amplify.");
        }
    }

    pub fn activation(&self, x: f64) -> f64 {
        self.amplify * self.kind.activate(self.slope, x)
    }

    pub fn gradient(&self, x: f64) -> f64 {
        self.amplify * self.kind.gradient(self.slope, x)
    }
}
