//! Named solver parameters, passed to the backend as an opaque bag.
//!
//! A few keys are understood by every backend (see the constants in this
//! module). Other keys are handed to the backend unchanged: the Clarabel
//! backend applies the ones matching its own setting names.
use std::collections::BTreeMap;

use crate::error::MipGapError;

/// Wall clock limit for the whole solve, in seconds
pub const MAX_TIME_SECONDS: &str = "max_time_seconds";
/// Relative gap between the best solution and the best bound at which
/// branch and bound stops
pub const RELATIVE_GAP_TOLERANCE: &str = "relative_gap_tolerance";
/// Absolute gap between the best solution and the best bound at which
/// branch and bound stops
pub const ABSOLUTE_GAP_TOLERANCE: &str = "absolute_gap_tolerance";
/// Iteration limit of each continuous solve
pub const MAX_ITERATIONS: &str = "max_iterations";
/// Maximum number of branch and bound nodes
pub const MAX_NODES: &str = "max_nodes";
/// Distance to the closest integer below which a value counts as integral
pub const INTEGRALITY_TOLERANCE: &str = "integrality_tolerance";
/// Primal and dual feasibility tolerance of the continuous solves
pub const FEASIBILITY_TOLERANCE: &str = "feasibility_tolerance";
/// Let the backend print its own log
pub const VERBOSE: &str = "verbose";

const COMMON: [&str; 8] = [
    MAX_TIME_SECONDS,
    RELATIVE_GAP_TOLERANCE,
    ABSOLUTE_GAP_TOLERANCE,
    MAX_ITERATIONS,
    MAX_NODES,
    INTEGRALITY_TOLERANCE,
    FEASIBILITY_TOLERANCE,
    VERBOSE,
];

/// True for the keys understood by every backend
pub fn is_common(key: &str) -> bool {
    COMMON.contains(&key)
}

/// The value of a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// String parameter
    String(String),
    /// Boolean parameter
    Bool(bool),
    /// Integer parameter
    Int(i64),
    /// Floating point number parameter
    Float(f64),
}

impl ParameterValue {
    /// Gets the value as a float if it is numeric.
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Gets the value as an integer if it is a whole number.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Float(v) if v.fract() == 0. => Some(v as i64),
            _ => None,
        }
    }

    /// Gets the value as a boolean. Integers are true when they are not 0.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            Self::Int(v) => Some(v != 0),
            _ => None,
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

/// An ordered bag of named parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value
    pub fn set<K: Into<String>, V: Into<ParameterValue>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [Parameters::set]
    pub fn with<K: Into<String>, V: Into<ParameterValue>>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParameterValue> {
        self.values.remove(key)
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ParameterValue::as_float)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ParameterValue::as_int)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ParameterValue::as_bool)
    }

    /// Iterates over all parameters, sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validates a gap tolerance
pub(crate) fn check_gap(gap: f64) -> Result<f64, MipGapError> {
    if gap.is_sign_negative() {
        Err(MipGapError::Negative)
    } else if gap.is_infinite() || gap.is_nan() {
        Err(MipGapError::Infinite)
    } else {
        Ok(gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let params = Parameters::new()
            .with(MAX_TIME_SECONDS, 60.)
            .with(MAX_NODES, 100)
            .with(VERBOSE, true)
            .with("direct_solve_method", "qdldl");
        assert_eq!(params.float(MAX_TIME_SECONDS), Some(60.));
        assert_eq!(params.float(MAX_NODES), Some(100.));
        assert_eq!(params.int(MAX_NODES), Some(100));
        assert_eq!(params.bool(VERBOSE), Some(true));
        assert_eq!(params.float("direct_solve_method"), None);
        assert!(is_common(MAX_NODES));
        assert!(!is_common("direct_solve_method"));
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["direct_solve_method", "max_nodes", "max_time_seconds", "verbose"]
        );
    }

    #[test]
    fn gaps() {
        assert_eq!(check_gap(0.5), Ok(0.5));
        assert_eq!(check_gap(-0.5), Err(MipGapError::Negative));
        assert_eq!(check_gap(f64::INFINITY), Err(MipGapError::Infinite));
    }
}
