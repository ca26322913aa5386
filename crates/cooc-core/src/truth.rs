use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MILD_THRESHOLD, STRONG_THRESHOLD};
use crate::error::CoreError;

/// Maps a ground-truth correlation score onto a nominal label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TruthFunction {
    TwoWayMild,
    TwoWayStrong,
    ThreeWayMild,
    ThreeWayStrong,
    FiveWay,
}

impl TruthFunction {
    pub const ALL: [TruthFunction; 5] = [
        TruthFunction::TwoWayMild,
        TruthFunction::TwoWayStrong,
        TruthFunction::ThreeWayMild,
        TruthFunction::ThreeWayStrong,
        TruthFunction::FiveWay,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TruthFunction::TwoWayMild => "2_way_mild",
            TruthFunction::TwoWayStrong => "2_way_strong",
            TruthFunction::ThreeWayMild => "3_way_mild",
            TruthFunction::ThreeWayStrong => "3_way_strong",
            TruthFunction::FiveWay => "5_way",
        }
    }

    /// Every label `classify` can return, in declaration order.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            TruthFunction::TwoWayMild => &["MILD_POS", "NONE"],
            TruthFunction::TwoWayStrong => &["STRONG_POS", "NONE"],
            TruthFunction::ThreeWayMild => &["MILD_POS", "MILD_NEG", "NONE"],
            TruthFunction::ThreeWayStrong => &["STRONG_POS", "STRONG_NEG", "NONE"],
            TruthFunction::FiveWay => &["STRONG_POS", "MILD_POS", "MILD_NEG", "STRONG_NEG", "NONE"],
        }
    }

    pub fn classify(&self, score: f64) -> &'static str {
        match self {
            TruthFunction::TwoWayMild if score > MILD_THRESHOLD => "MILD_POS",
            TruthFunction::TwoWayStrong if score > STRONG_THRESHOLD => "STRONG_POS",
            TruthFunction::ThreeWayMild if score > MILD_THRESHOLD => "MILD_POS",
            TruthFunction::ThreeWayMild if score < -MILD_THRESHOLD => "MILD_NEG",
            TruthFunction::ThreeWayStrong if score > STRONG_THRESHOLD => "STRONG_POS",
            TruthFunction::ThreeWayStrong if score < -STRONG_THRESHOLD => "STRONG_NEG",
            TruthFunction::FiveWay if score > STRONG_THRESHOLD => "STRONG_POS",
            TruthFunction::FiveWay if score > MILD_THRESHOLD => "MILD_POS",
            TruthFunction::FiveWay if score < -STRONG_THRESHOLD => "STRONG_NEG",
            TruthFunction::FiveWay if score < -MILD_THRESHOLD => "MILD_NEG",
            _ => "NONE",
        }
    }
}

impl fmt::Display for TruthFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TruthFunction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TruthFunction::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| CoreError::Config(format!("invalid truth function name '{s}'")))
    }
}

impl TryFrom<String> for TruthFunction {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TruthFunction> for String {
    fn from(f: TruthFunction) -> Self {
        f.name().to_string()
    }
}
