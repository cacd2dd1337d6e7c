use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{THETA_DISCOVERED, THETA_ENGAGED, THETA_SATURATED};

/// Discrete engagement level, ordered Latent < Discovered < Engaged < Saturated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Latent,
    Discovered,
    Engaged,
    Saturated,
}

impl State {
    pub const ALL: [State; 4] = [
        State::Latent,
        State::Discovered,
        State::Engaged,
        State::Saturated,
    ];

    /// Classify an evidence value. Intervals are closed-open, so a value
    /// exactly on a threshold belongs to the higher state.
    pub fn classify(evidence: f64) -> Self {
        if evidence >= THETA_SATURATED {
            State::Saturated
        } else if evidence >= THETA_ENGAGED {
            State::Engaged
        } else if evidence >= THETA_DISCOVERED {
            State::Discovered
        } else {
            State::Latent
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`State::index`]; out-of-range indices clamp to Saturated.
    pub fn from_index(i: usize) -> Self {
        Self::ALL[i.min(3)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Latent => "latent",
            State::Discovered => "discovered",
            State::Engaged => "engaged",
            State::Saturated => "saturated",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function form of [`State::classify`].
pub fn classify(evidence: f64) -> State {
    State::classify(evidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_table() {
        let cases = [
            (0.0, State::Latent),
            (0.99, State::Latent),
            (1.0, State::Discovered),
            (2.99, State::Discovered),
            (3.0, State::Engaged),
            (5.99, State::Engaged),
            (6.0, State::Saturated),
            (1e9, State::Saturated),
        ];
        for (evidence, expected) in cases {
            assert_eq!(classify(evidence), expected, "evidence {evidence}");
        }
    }

    #[test]
    fn test_ordering() {
        assert!(State::Latent < State::Discovered);
        assert!(State::Engaged >= State::Engaged);
        assert!(State::Saturated > State::Engaged);
    }

    #[test]
    fn test_index_roundtrip() {
        for s in State::ALL {
            assert_eq!(State::from_index(s.index()), s);
        }
    }
}
