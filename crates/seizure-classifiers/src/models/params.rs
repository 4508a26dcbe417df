//! Hyperparameter values, configurations and search grids.
//!
//! A [`ParamGrid`] is a list of sub-grids. Each sub-grid maps an axis name to
//! an ordered list of candidate values, and the candidate space is the
//! concatenation of the Cartesian products of the sub-grids. Axes inside a
//! sub-grid are ordered by name and the last axis varies fastest, so
//! [`ParamGrid::iter`] always yields configurations in the same order.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelSelectionError, Result};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral values only; floats with a fractional part are rejected.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::None => write!(f, "None"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<Option<f64>> for ParamValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(ParamValue::None, ParamValue::Float)
    }
}

/// One point of the search space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with<V: Into<ParamValue>>(mut self, name: &str, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<V: Into<ParamValue>>(&mut self, name: &str, value: V) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Values of `other` win over values already present.
    pub fn merged(&self, other: &ParamSet) -> ParamSet {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}': {}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Override entry: a single value or a list of candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<ParamValue>),
    One(ParamValue),
}

impl OneOrMany {
    fn into_values(self) -> Vec<ParamValue> {
        match self {
            OneOrMany::Many(values) => values,
            OneOrMany::One(value) => vec![value],
        }
    }
}

/// Raw hyperparameter overrides as read from a config file.
pub type ParamOverrides = BTreeMap<String, OneOrMany>;

/// A search space made of one or more sub-grids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    subgrids: Vec<BTreeMap<String, Vec<ParamValue>>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new sub-grid; subsequent [`ParamGrid::axis`] calls add to it.
    pub fn subgrid(mut self) -> Self {
        self.subgrids.push(BTreeMap::new());
        self
    }

    pub fn axis<V: Into<ParamValue>>(mut self, name: &str, values: Vec<V>) -> Self {
        if self.subgrids.is_empty() {
            self.subgrids.push(BTreeMap::new());
        }
        let values = values.into_iter().map(Into::into).collect();
        if let Some(last) = self.subgrids.last_mut() {
            last.insert(name.to_string(), values);
        }
        self
    }

    /// Build a single sub-grid from caller overrides.
    pub fn from_overrides(overrides: ParamOverrides) -> Self {
        let subgrid = overrides
            .into_iter()
            .map(|(name, values)| (name, values.into_values()))
            .collect();
        Self {
            subgrids: vec![subgrid],
        }
    }

    /// Number of configurations in enumeration order.
    pub fn len(&self) -> usize {
        self.subgrids
            .iter()
            .map(|axes| axes.values().map(Vec::len).product::<usize>())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `value` into every sub-grid that does not define `name`.
    pub fn insert_missing(&mut self, name: &str, value: ParamValue) {
        for axes in self.subgrids.iter_mut() {
            axes.entry(name.to_string())
                .or_insert_with(|| vec![value.clone()]);
        }
    }

    /// All configurations, in enumeration order.
    pub fn iter(&self) -> Vec<ParamSet> {
        let mut out = Vec::with_capacity(self.len());
        for axes in &self.subgrids {
            let names: Vec<&String> = axes.keys().collect();
            let values: Vec<&Vec<ParamValue>> = axes.values().collect();
            if values.iter().any(|v| v.is_empty()) {
                continue;
            }
            let mut cursor = vec![0usize; names.len()];
            loop {
                let mut set = ParamSet::new();
                for (axis, &pos) in cursor.iter().enumerate() {
                    set.0.insert(names[axis].clone(), values[axis][pos].clone());
                }
                out.push(set);

                // odometer increment, last axis fastest
                let mut axis = names.len();
                let mut exhausted = true;
                while axis > 0 {
                    axis -= 1;
                    cursor[axis] += 1;
                    if cursor[axis] < values[axis].len() {
                        exhausted = false;
                        break;
                    }
                    cursor[axis] = 0;
                }
                if exhausted {
                    break;
                }
            }
        }
        out
    }
}

/// Typed access to a [`ParamSet`] that rejects unknown names.
///
/// Every estimator reads its parameters through this reader and calls
/// [`ParamReader::finish`] so that misspelled overrides surface as
/// configuration errors instead of being dropped.
pub(crate) struct ParamReader<'a> {
    estimator: &'static str,
    params: &'a ParamSet,
    seen: Vec<&'static str>,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(estimator: &'static str, params: &'a ParamSet) -> Self {
        Self {
            estimator,
            params,
            seen: Vec::new(),
        }
    }

    fn lookup(&mut self, name: &'static str) -> Option<&'a ParamValue> {
        self.seen.push(name);
        self.params.get(name)
    }

    fn invalid(&self, name: &str, expected: &str, got: &ParamValue) -> ModelSelectionError {
        ModelSelectionError::config(format!(
            "Invalid value {} for parameter '{}' of {}: expected {}",
            got, name, self.estimator, expected
        ))
    }

    pub(crate) fn f64(&mut self, name: &'static str, default: f64) -> Result<f64> {
        match self.lookup(name) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.invalid(name, "a number", v)),
        }
    }

    pub(crate) fn opt_f64(&mut self, name: &'static str) -> Result<Option<f64>> {
        match self.lookup(name) {
            None | Some(ParamValue::None) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(name, "a number or None", v)),
        }
    }

    pub(crate) fn usize(&mut self, name: &'static str, default: usize) -> Result<usize> {
        match self.lookup(name) {
            None => Ok(default),
            Some(v) => v
                .as_i64()
                .filter(|&n| n >= 0)
                .map(|n| n as usize)
                .ok_or_else(|| self.invalid(name, "a non-negative integer", v)),
        }
    }

    pub(crate) fn opt_usize(&mut self, name: &'static str) -> Result<Option<usize>> {
        match self.lookup(name) {
            None | Some(ParamValue::None) => Ok(None),
            Some(v) => v
                .as_i64()
                .filter(|&n| n >= 0)
                .map(|n| Some(n as usize))
                .ok_or_else(|| self.invalid(name, "a non-negative integer or None", v)),
        }
    }

    /// Seeds are accepted as any integer; `None` falls back to `default`.
    pub(crate) fn seed(&mut self, name: &'static str, default: u64) -> Result<u64> {
        match self.lookup(name) {
            None | Some(ParamValue::None) => Ok(default),
            Some(v) => v
                .as_i64()
                .map(|n| n as u64)
                .ok_or_else(|| self.invalid(name, "an integer seed", v)),
        }
    }

    pub(crate) fn bool(&mut self, name: &'static str, default: bool) -> Result<bool> {
        match self.lookup(name) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.invalid(name, "a boolean", v)),
        }
    }

    pub(crate) fn choice(
        &mut self,
        name: &'static str,
        allowed: &[&str],
        default: &str,
    ) -> Result<String> {
        match self.lookup(name) {
            None => Ok(default.to_string()),
            Some(v) => match v.as_str() {
                Some(s) if allowed.contains(&s) => Ok(s.to_string()),
                _ => Err(self.invalid(name, &format!("one of {:?}", allowed), v)),
            },
        }
    }

    /// Raw access for parameters with mixed types (e.g. `max_features`).
    pub(crate) fn raw(&mut self, name: &'static str) -> Option<&'a ParamValue> {
        self.lookup(name)
    }

    pub(crate) fn finish(self) -> Result<()> {
        let unknown: Vec<&String> = self
            .params
            .iter()
            .map(|(k, _)| k)
            .filter(|k| !self.seen.contains(&k.as_str()))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ModelSelectionError::config(format!(
                "Invalid parameters {:?} for estimator {}",
                unknown, self.estimator
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_enumeration_last_axis_fastest() {
        let grid = ParamGrid::new()
            .axis("b", vec![1i64, 2])
            .axis("a", vec!["x", "y"]);
        let configs = grid.iter();
        assert_eq!(configs.len(), 4);
        // axes sorted by name: a then b, b varies fastest
        assert_eq!(configs[0], ParamSet::new().with("a", "x").with("b", 1i64));
        assert_eq!(configs[1], ParamSet::new().with("a", "x").with("b", 2i64));
        assert_eq!(configs[2], ParamSet::new().with("a", "y").with("b", 1i64));
        assert_eq!(configs[3], ParamSet::new().with("a", "y").with("b", 2i64));
    }

    #[test]
    fn test_subgrids_are_concatenated() {
        let grid = ParamGrid::new()
            .subgrid()
            .axis("shrink_threshold", vec![ParamValue::None])
            .subgrid()
            .axis("shrink_threshold", vec![0.0, 1.0, 2.0]);
        assert_eq!(grid.len(), 4);
        let configs = grid.iter();
        assert!(configs[0].get("shrink_threshold").unwrap().is_none());
        assert_eq!(configs[3].get("shrink_threshold"), Some(&ParamValue::Float(2.0)));
    }

    #[test]
    fn test_empty_axis_yields_no_configs() {
        let grid = ParamGrid::new().axis::<f64>("C", vec![]);
        assert!(grid.is_empty());
        assert!(grid.iter().is_empty());
    }

    #[test]
    fn test_overrides_deserialize_scalar_and_list() {
        let overrides: ParamOverrides =
            serde_json::from_str(r#"{"C": [1, 10.5], "penalty": "l2"}"#).unwrap();
        let grid = ParamGrid::from_overrides(overrides);
        assert_eq!(grid.len(), 2);
        let configs = grid.iter();
        assert_eq!(configs[0].get("C"), Some(&ParamValue::Int(1)));
        assert_eq!(configs[1].get("C"), Some(&ParamValue::Float(10.5)));
        assert_eq!(configs[1].get("penalty").and_then(|v| v.as_str()), Some("l2"));
    }

    #[test]
    fn test_reader_rejects_unknown_names() {
        let params = ParamSet::new().with("C", 1.0).with("colour", "blue");
        let mut reader = ParamReader::new("LogisticRegression", &params);
        assert_eq!(reader.f64("C", 2.0).unwrap(), 1.0);
        assert!(reader.finish().is_err());
    }

    #[test]
    fn test_param_set_display() {
        let params = ParamSet::new().with("penalty", "l1").with("C", 0.5);
        assert_eq!(params.to_string(), "{'C': 0.5, 'penalty': 'l1'}");
    }
}
