use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{RasterError, RasterResult};

/// Fallback used when a map file does not name one.
pub const DEFAULT_FALLBACK: f64 = -9999.0;

/// An immutable lookup from source cell values to target cell values.
///
/// Keys match by exact value. `-0.0` and `0.0` are the same key and a `NaN` key
/// matches every `NaN` cell. Values without a key map to the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMap {
    entries: HashMap<u64, f64>,
    fallback: f64,
}

/// Map files are either a flat object or carry an explicit fallback.
#[derive(Deserialize)]
#[serde(untagged)]
enum ValueMapFile {
    WithFallback {
        values: BTreeMap<String, f64>,
        #[serde(default = "default_fallback")]
        fallback: f64,
    },
    Flat(BTreeMap<String, f64>),
}

fn default_fallback() -> f64 {
    DEFAULT_FALLBACK
}

impl ValueMap {
    /// Builds a map from `(source, target)` pairs. Later duplicates win.
    pub fn new<I: IntoIterator<Item = (f64, f64)>>(pairs: I, fallback: f64) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(key, value)| (key_bits(key), value))
                .collect(),
            fallback,
        }
    }

    /// Parses a JSON map: `{"1": 10, "2": 20}` or
    /// `{"values": {"1": 10}, "fallback": -9999}`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] for malformed JSON or non-numeric keys.
    pub fn from_json(json: &str) -> RasterResult<Self> {
        let file: ValueMapFile = serde_json::from_str(json)
            .map_err(|e| RasterError::invalid(format!("malformed value map: {e}")))?;
        let (values, fallback) = match file {
            ValueMapFile::WithFallback { values, fallback } => (values, fallback),
            ValueMapFile::Flat(values) => (values, DEFAULT_FALLBACK),
        };

        let mut pairs = Vec::with_capacity(values.len());
        for (key, value) in values {
            let parsed = parse_key(&key).ok_or_else(|| {
                RasterError::invalid(format!("malformed value map: key '{key}' is not a number"))
            })?;
            pairs.push((parsed, value));
        }
        Ok(Self::new(pairs, fallback))
    }

    /// Reads a JSON map file. See [`ValueMap::from_json`].
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::UnreadableSource`] if the file cannot be read, or
    /// [`RasterError::InvalidArgument`] if it is malformed.
    pub fn from_json_file(path: impl AsRef<Path>) -> RasterResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| RasterError::unreadable(path, e))?;
        Self::from_json(&json)
    }

    /// Returns a copy with a different fallback.
    #[must_use]
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every target value, in no particular order.
    pub fn targets(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.values().copied()
    }

    /// The mapped value for `key`, if the key is present.
    #[must_use]
    pub fn get(&self, key: f64) -> Option<f64> {
        self.entries.get(&key_bits(key)).copied()
    }

    #[must_use]
    pub fn contains(&self, key: f64) -> bool {
        self.entries.contains_key(&key_bits(key))
    }

    /// The mapped value for `key`, or the fallback.
    #[must_use]
    pub fn lookup(&self, key: f64) -> f64 {
        self.get(key).unwrap_or(self.fallback)
    }
}

fn parse_key(key: &str) -> Option<f64> {
    let key = key.trim();
    if key.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    key.parse::<f64>().ok()
}

/// Canonical bit pattern so equal values hash equally.
fn key_bits(key: f64) -> u64 {
    if key.is_nan() {
        f64::NAN.to_bits()
    } else if key == 0.0 {
        0.0_f64.to_bits()
    } else {
        key.to_bits()
    }
}
