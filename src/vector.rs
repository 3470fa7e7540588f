use std::collections::BTreeMap;
use std::fmt;

use geo_types::{Geometry, Point};

use crate::{Crs, RasterError, RasterResult};

/// One row of an attribute table.
pub type Record = BTreeMap<String, FieldValue>;

/// A feature attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Numeric view used when burning attributes into rasters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Null => None,
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Real))
                .unwrap_or(FieldValue::Null),
            serde_json::Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Real(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Null => f.write_str("NULL"),
        }
    }
}

/// One geometry with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub attributes: BTreeMap<String, FieldValue>,
}

impl Feature {
    #[must_use]
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&FieldValue> {
        self.attributes.get(name)
    }
}

/// An in-memory vector layer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub crs: Option<Crs>,
    /// Attribute names in source order.
    pub fields: Vec<String>,
    pub features: Vec<Feature>,
}

impl VectorLayer {
    #[must_use]
    pub fn new(crs: Option<Crs>) -> Self {
        Self {
            crs,
            fields: Vec::new(),
            features: Vec::new(),
        }
    }

    /// Appends a feature, registering any attribute names not seen before.
    pub fn push(&mut self, feature: Feature) {
        for name in feature.attributes.keys() {
            if !self.fields.iter().any(|f| f == name) {
                self.fields.push(name.clone());
            }
        }
        self.features.push(feature);
    }

    /// Builds a point layer from table rows holding longitude and latitude
    /// columns. Every column, coordinates included, is kept as an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] naming the first row whose
    /// coordinates are missing or not numeric.
    pub fn from_lon_lat<I>(records: I, lon: &str, lat: &str, crs: Crs) -> RasterResult<Self>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut layer = Self::new(Some(crs));
        for (row, record) in records.into_iter().enumerate() {
            let coordinate = |column: &str| {
                record
                    .get(column)
                    .and_then(FieldValue::as_f64)
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        RasterError::invalid(format!("row {row} has no numeric '{column}' column"))
                    })
            };
            let point = Point::new(coordinate(lon)?, coordinate(lat)?);
            layer.push(Feature {
                geometry: Geometry::Point(point),
                attributes: record,
            });
        }
        Ok(layer)
    }

    /// Like [`VectorLayer::from_lon_lat`], reading the rows from a JSON array of
    /// flat objects.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] for malformed JSON or rows.
    pub fn from_json_records(json: &str, lon: &str, lat: &str, crs: Crs) -> RasterResult<Self> {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(json)
            .map_err(|e| RasterError::invalid(format!("malformed record table: {e}")))?;
        let records = rows.into_iter().map(|row| {
            row.into_iter()
                .map(|(name, value)| (name, FieldValue::from(value)))
                .collect::<Record>()
        });
        Self::from_lon_lat(records, lon, lat, crs)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Burn values of `attribute` for every feature that carries a numeric one.
    pub fn burn_values<'a>(
        &'a self,
        attribute: &'a str,
    ) -> impl Iterator<Item = (&'a Geometry<f64>, f64)> + 'a {
        self.features.iter().filter_map(move |feature| {
            feature
                .attribute(attribute)
                .and_then(FieldValue::as_f64)
                .map(|value| (&feature.geometry, value))
        })
    }
}
