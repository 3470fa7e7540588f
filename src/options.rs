//! Typed options for engine operations.
//!
//! Every operation takes a plain struct whose fields are checked when the struct is
//! built or parsed, instead of forwarding free-form option names to the engine.
//! [`describe`] lists the fields of each struct for command-line discovery.

use std::fmt;
use std::str::FromStr;

use crate::{Crs, DataType, Extent, GridSpec, Raster, RasterError, RasterResult};

/// Compression applied to written rasters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Lzw,
    Deflate,
    /// Lossy; only available through GDAL.
    Jpeg,
}

impl Compression {
    /// The GDAL `COMPRESS=` creation option value, if any.
    #[must_use]
    pub fn creation_option(self) -> Option<&'static str> {
        Some(match self {
            Compression::Lzw => "LZW",
            Compression::Deflate => "DEFLATE",
            Compression::Jpeg => "JPEG",
            Compression::None => None?,
        })
    }
}

impl FromStr for Compression {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "lzw" => Ok(Compression::Lzw),
            "deflate" | "zip" => Ok(Compression::Deflate),
            "jpeg" | "jpg" => Ok(Compression::Jpeg),
            other => Err(RasterError::invalid(format!(
                "unknown compression '{other}', choose one of: none, lzw, deflate, jpeg"
            ))),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.creation_option().unwrap_or("NONE"))
    }
}

/// How a raster is encoded on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    pub data_type: DataType,
    pub nodata: Option<f64>,
    pub compression: Compression,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            data_type: DataType::Float32,
            nodata: Some(-9999.0),
            compression: Compression::None,
        }
    }
}

impl WriteOptions {
    /// Keeps the data type and no-data value of an existing raster.
    #[must_use]
    pub fn from_template(template: &Raster) -> Self {
        Self {
            data_type: template.data_type(),
            nodata: template.nodata(),
            compression: Compression::None,
        }
    }

    #[must_use]
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    #[must_use]
    pub fn nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// Target geometry for warping a raster.
///
/// Unset fields fall back to the source raster's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarpOptions {
    pub target_crs: Option<Crs>,
    /// Ground size of a target pixel as `(x, y)`, both positive.
    pub resolution: Option<(f64, f64)>,
    /// Target bounds in target CRS units.
    pub bounds: Option<Extent>,
    pub output_type: Option<DataType>,
    pub compression: Compression,
    pub nodata: Option<f64>,
}

impl WarpOptions {
    /// Matches CRS, bounds and resolution of a template grid.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if the template grid has no area.
    pub fn from_template(template: &GridSpec) -> RasterResult<Self> {
        Ok(Self {
            target_crs: template.crs().cloned(),
            resolution: Some((template.pixel_width().abs(), template.pixel_height().abs())),
            bounds: Some(template.extent()?),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = Some(crs);
        self
    }

    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] unless both sizes are positive and finite.
    pub fn resolution(mut self, x: f64, y: f64) -> RasterResult<Self> {
        if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
            return Err(RasterError::invalid(format!(
                "resolution must be positive, got ({x}, {y})"
            )));
        }
        self.resolution = Some((x, y));
        Ok(self)
    }

    #[must_use]
    pub fn bounds(mut self, bounds: Extent) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn output_type(mut self, data_type: DataType) -> Self {
        self.output_type = Some(data_type);
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }
}

/// Parameters for burning a vector attribute into a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizeOptions {
    /// Numeric attribute whose value is burned into each touched cell.
    pub attribute: String,
    /// Burn every cell a shape touches instead of only cells whose centre it covers.
    pub all_touched: bool,
    pub nodata: f64,
    pub data_type: DataType,
    pub compression: Compression,
}

impl RasterizeOptions {
    #[must_use]
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            all_touched: false,
            nodata: -9999.0,
            data_type: DataType::Float32,
            compression: Compression::None,
        }
    }

    #[must_use]
    pub fn all_touched(mut self, all_touched: bool) -> Self {
        self.all_touched = all_touched;
        self
    }

    #[must_use]
    pub fn nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// Operations whose options can be listed with [`describe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Write,
    Warp,
    Rasterize,
    Tile,
    MapValues,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Write,
        Operation::Warp,
        Operation::Rasterize,
        Operation::Tile,
        Operation::MapValues,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Operation::Write => "write",
            Operation::Warp => "warp",
            Operation::Rasterize => "rasterize",
            Operation::Tile => "tile",
            Operation::MapValues => "map-values",
        }
    }
}

impl FromStr for Operation {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let wanted = wanted.strip_prefix("gdal").unwrap_or(&wanted);
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == wanted.trim_start_matches('-'))
            .ok_or_else(|| {
                let names: Vec<_> = Operation::ALL.iter().map(|op| op.name()).collect();
                RasterError::invalid(format!(
                    "options for '{s}' are not available, operations with options: {}",
                    names.join(", ")
                ))
            })
    }
}

/// A documented option field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDoc {
    pub name: &'static str,
    pub kind: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

const fn doc(
    name: &'static str,
    kind: &'static str,
    default: &'static str,
    description: &'static str,
) -> OptionDoc {
    OptionDoc {
        name,
        kind,
        default,
        description,
    }
}

const WRITE_DOCS: &[OptionDoc] = &[
    doc("data_type", "DataType", "Float32", "Cell storage type"),
    doc("nodata", "f64", "-9999", "Value marking cells without data"),
    doc("compression", "Compression", "none", "none, lzw, deflate or jpeg"),
];

const WARP_DOCS: &[OptionDoc] = &[
    doc("target_crs", "Crs", "source CRS", "EPSG:<code>, PROJ string or WKT"),
    doc("resolution", "(f64, f64)", "source pixel size", "Target pixel width and height"),
    doc("bounds", "Extent", "source extent", "xmin, ymin, xmax, ymax in target units"),
    doc("output_type", "DataType", "source type", "Cell storage type of the output"),
    doc("compression", "Compression", "none", "none, lzw, deflate or jpeg"),
    doc("nodata", "f64", "source no-data", "Fill value for cells outside the source"),
];

const RASTERIZE_DOCS: &[OptionDoc] = &[
    doc("attribute", "String", "required", "Numeric attribute to burn"),
    doc("all_touched", "bool", "false", "Burn every cell a shape touches"),
    doc("nodata", "f64", "-9999", "Value of cells no shape covers"),
    doc("data_type", "DataType", "Float32", "Cell storage type"),
    doc("compression", "Compression", "none", "none, lzw, deflate or jpeg"),
];

const TILE_DOCS: &[OptionDoc] = &[
    doc("tile_count", "usize", "required", "Requested tiles, rounded up to a square"),
    doc("worker_count", "usize", "available cores", "Concurrent tile jobs"),
    doc("timeout", "Duration", "none", "Per-tile limit before the tile is marked failed"),
];

const MAP_VALUES_DOCS: &[OptionDoc] = &[
    doc("value_map", "ValueMap", "required", "JSON object of source value to target value"),
    doc("fallback", "f64", "-9999", "Value for cells missing from the map"),
    doc("data_type", "DataType", "Float32", "Cell storage type of the output"),
    doc("worker_count", "usize", "available cores", "Concurrent files"),
];

/// Lists the options accepted by `operation`.
#[must_use]
pub fn describe(operation: Operation) -> &'static [OptionDoc] {
    match operation {
        Operation::Write => WRITE_DOCS,
        Operation::Warp => WARP_DOCS,
        Operation::Rasterize => RASTERIZE_DOCS,
        Operation::Tile => TILE_DOCS,
        Operation::MapValues => MAP_VALUES_DOCS,
    }
}
