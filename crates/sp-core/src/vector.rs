//! Four-bucket state vectors.
//!
//! Two shapes share the same layout but never mix:
//! - [`PositionVector`]: one topic's own position, elements always sum to
//!   [`TOTAL_MASS`].
//! - [`Histogram`]: how many of a topic's children sit in each state, sums to
//!   the child count.
//!
//! Both are indexed by [`State`] ordinal.

use serde::{Deserialize, Serialize};

use crate::constants::TOTAL_MASS;
use crate::error::{CoreError, Result};
use crate::state::State;

/// Returns true if every element is non-negative and the elements sum to
/// exactly `total`.
pub fn validate(vector: &[i64], total: i64) -> bool {
    vector.iter().all(|&v| v >= 0) && vector.iter().sum::<i64>() == total
}

/// Strict form of [`validate`]: names the element and rule that failed.
pub fn assert_valid(vector: &[i64], total: i64) -> Result<()> {
    for (i, &v) in vector.iter().enumerate() {
        if v < 0 {
            return Err(CoreError::InvariantViolation(format!(
                "element {i} is negative ({v}) in {vector:?}"
            )));
        }
        if v > total {
            return Err(CoreError::InvariantViolation(format!(
                "element {i} ({v}) exceeds fixed sum {total} in {vector:?}"
            )));
        }
    }
    let sum: i64 = vector.iter().sum();
    if sum != total {
        return Err(CoreError::InvariantViolation(format!(
            "elements of {vector:?} sum to {sum}, expected {total}"
        )));
    }
    Ok(())
}

/// A topic's smoothed position across the four state buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u32; 4]", into = "[u32; 4]")]
pub struct PositionVector([u32; 4]);

impl PositionVector {
    /// All mass in a single bucket.
    pub fn at(state: State) -> Self {
        let mut v = [0; 4];
        v[state.index()] = TOTAL_MASS;
        Self(v)
    }

    /// Build from raw elements, rejecting anything that does not conserve mass.
    pub fn from_array(v: [u32; 4]) -> Result<Self> {
        let p = Self(v);
        p.check()?;
        Ok(p)
    }

    pub fn as_array(&self) -> [u32; 4] {
        self.0
    }

    pub fn get(&self, state: State) -> u32 {
        self.0[state.index()]
    }

    /// Arg-max bucket. Ties resolve to the lower state.
    pub fn dominant(&self) -> State {
        dominant_index(&self.0).map(State::from_index).unwrap_or(State::Latent)
    }

    pub fn check(&self) -> Result<()> {
        assert_valid(&widen(&self.0), TOTAL_MASS as i64)
    }
}

impl Default for PositionVector {
    fn default() -> Self {
        Self::at(State::Latent)
    }
}

impl TryFrom<[u32; 4]> for PositionVector {
    type Error = CoreError;

    fn try_from(v: [u32; 4]) -> Result<Self> {
        Self::from_array(v)
    }
}

impl From<PositionVector> for [u32; 4] {
    fn from(p: PositionVector) -> Self {
        p.0
    }
}

/// Counts of children per state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram([u32; 4]);

impl Histogram {
    pub fn from_states(states: impl IntoIterator<Item = State>) -> Self {
        let mut v = [0u32; 4];
        for s in states {
            v[s.index()] += 1;
        }
        Self(v)
    }

    pub fn as_array(&self) -> [u32; 4] {
        self.0
    }

    pub fn get(&self, state: State) -> u32 {
        self.0[state.index()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Validate against an expected child count.
    pub fn check(&self, children: usize) -> Result<()> {
        assert_valid(&widen(&self.0), children as i64)
    }
}

fn widen(v: &[u32; 4]) -> [i64; 4] {
    v.map(i64::from)
}

fn dominant_index(v: &[u32; 4]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &x) in v.iter().enumerate() {
        match best {
            Some(b) if v[b] >= x => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate(&[100, 0, 0, 0], 100));
        assert!(validate(&[25, 25, 25, 25], 100));
        assert!(!validate(&[50, 49, 0, 0], 100));
        assert!(!validate(&[101, -1, 0, 0], 100));
        assert!(validate(&[0, 0, 0, 0], 0));
    }

    #[test]
    fn test_assert_valid_names_element() {
        let err = assert_valid(&[10, -3, 93, 0], 100).unwrap_err();
        match err {
            CoreError::InvariantViolation(msg) => {
                assert!(msg.contains("element 1"), "got: {msg}");
                assert!(msg.contains("negative"), "got: {msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = assert_valid(&[60, 60, 0, 0], 100).unwrap_err();
        assert!(err.to_string().contains("sum to 120"));
    }

    #[test]
    fn test_position_rejects_bad_mass() {
        assert!(PositionVector::from_array([50, 50, 0, 0]).is_ok());
        assert!(PositionVector::from_array([50, 40, 0, 0]).is_err());
    }

    #[test]
    fn test_position_dominant_ties_go_low() {
        let p = PositionVector::from_array([0, 50, 50, 0]).unwrap();
        assert_eq!(p.dominant(), State::Discovered);
        assert_eq!(PositionVector::at(State::Saturated).dominant(), State::Saturated);
    }

    #[test]
    fn test_position_at_conserves_mass() {
        for s in State::ALL {
            let p = PositionVector::at(s);
            assert!(p.check().is_ok());
            assert_eq!(p.get(s), TOTAL_MASS);
        }
    }

    #[test]
    fn test_position_serde_validates() {
        let json = serde_json::to_string(&PositionVector::at(State::Discovered)).unwrap();
        assert_eq!(json, "[0,100,0,0]");
        assert!(serde_json::from_str::<PositionVector>("[1,2,3,4]").is_err());
    }

    #[test]
    fn test_histogram_counts_children() {
        let h = Histogram::from_states([State::Latent, State::Latent, State::Saturated]);
        assert_eq!(h.as_array(), [2, 0, 0, 1]);
        assert_eq!(h.total(), 3);
        assert!(h.check(3).is_ok());
        assert!(h.check(4).is_err());
    }
}
