//! Stage configuration.
//!
//! A [`StageConfig`] is the flat parameter map a host hands to each pipeline
//! call: `*_enabled` flags plus stage scalars and strings. Unknown keys are
//! ignored and missing keys fall back to [`StageDefaults`]. The map is parsed
//! into typed views ([`PipelineParams`], [`RealtimeParams`]) before any stage
//! runs, so a malformed value fails the call up front.
//!
//! Stage defaults can be loaded from an `enhance.yml` file; the loaded handle
//! is passed explicitly, there is no process-wide configuration.

mod defaults;
mod params;

pub use defaults::{
    load_enhance_config, EnhanceConfig, EnhanceConfigHandle, StageDefaults, CONFIG_ENV_VAR,
};
pub use params::{
    BackgroundParams, BilateralParams, ContrastParams, PipelineParams, RealtimeParams,
    WaveletParams,
};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auto_adjust::AutoParams;
use crate::error::EnhanceError;

/// One configuration value, as a dynamic host would supply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Flat per-call parameter map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageConfig {
    params: BTreeMap<String, ParamValue>,
}

impl StageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML mapping such as `{stretch_enabled: true, stretch_clip: 2.0}`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.params.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read a boolean flag. Numbers are truthy when non-zero.
    pub fn flag(&self, key: &str, default: bool) -> Result<bool, EnhanceError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(ParamValue::Int(i)) => Ok(*i != 0),
            Some(ParamValue::Float(v)) => Ok(*v != 0.0),
            Some(ParamValue::Text(s)) => s
                .trim()
                .parse::<bool>()
                .map_err(|_| EnhanceError::invalid(key, "a boolean", format!("{:?}", s))),
        }
    }

    /// Read a number. Integers widen; numeric text is parsed.
    pub fn float(&self, key: &str, default: f64) -> Result<f64, EnhanceError> {
        let value = match self.params.get(key) {
            None => return Ok(default),
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(i)) => *i as f64,
            Some(ParamValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| EnhanceError::invalid(key, "a number", format!("{:?}", s)))?,
            Some(other) => return Err(EnhanceError::invalid(key, "a number", other)),
        };
        if value.is_nan() {
            return Err(EnhanceError::invalid(key, "a number", value));
        }
        Ok(value)
    }

    /// Read an integer. Floats truncate toward zero.
    pub fn int(&self, key: &str, default: i64) -> Result<i64, EnhanceError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(ParamValue::Int(i)) => Ok(*i),
            Some(ParamValue::Float(v)) if v.is_finite() => Ok(v.trunc() as i64),
            Some(ParamValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| EnhanceError::invalid(key, "an integer", format!("{:?}", s))),
            Some(other) => Err(EnhanceError::invalid(key, "an integer", other)),
        }
    }

    /// Read a string value.
    pub fn text(&self, key: &str, default: &str) -> Result<String, EnhanceError> {
        match self.params.get(key) {
            None => Ok(default.to_string()),
            Some(ParamValue::Text(s)) => Ok(s.clone()),
            Some(other) => Err(EnhanceError::invalid(key, "a string", other)),
        }
    }

    /// Write suggested values without touching any `*_enabled` flag.
    pub fn merge_auto(&mut self, auto: &AutoParams) -> &mut Self {
        self.set("stretch_clip", auto.stretch_clip);
        self.set("bg_kernel", auto.bg_kernel);
        self.set("contrast_clip", auto.contrast_clip);
        self.set("contrast_tile", auto.contrast_tile);
        self.set("noise_sigma", auto.noise_sigma);
        self.set("gamma", auto.gamma);
        self
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for StageConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests;
