use std::fmt;
use std::str::FromStr;

use crate::{Crs, Extent, RasterError, RasterResult};

/// Raster geometry: affine placement, dimensions and coordinate reference system.
///
/// The affine terms follow the GDAL geo transform convention. A world coordinate
/// for pixel column `c`, row `r` is
/// `x = origin_x + c * pixel_width + r * rotation_x` and
/// `y = origin_y + c * rotation_y + r * pixel_height`.
/// North-up rasters have a negative `pixel_height`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub(crate) origin_x: f64,
    pub(crate) origin_y: f64,
    pub(crate) pixel_width: f64,
    pub(crate) pixel_height: f64,
    pub(crate) rotation_x: f64,
    pub(crate) rotation_y: f64,
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) crs: Option<Crs>,
}

impl GridSpec {
    /// Builds a grid from a GDAL geo transform
    /// `[origin_x, pixel_width, rotation_x, origin_y, rotation_y, pixel_height]`.
    #[must_use]
    pub fn from_geo_transform(
        transform: [f64; 6],
        width: usize,
        height: usize,
        crs: Option<Crs>,
    ) -> Self {
        Self {
            origin_x: transform[0],
            pixel_width: transform[1],
            rotation_x: transform[2],
            origin_y: transform[3],
            rotation_y: transform[4],
            pixel_height: transform[5],
            width,
            height,
            crs,
        }
    }

    /// Builds a north-up grid whose top-left corner is `(left, top)`.
    ///
    /// Pixel sizes are given as positive ground distances.
    #[must_use]
    pub fn north_up(
        left: f64,
        top: f64,
        pixel_width: f64,
        pixel_height: f64,
        width: usize,
        height: usize,
        crs: Option<Crs>,
    ) -> Self {
        Self::from_geo_transform(
            [left, pixel_width.abs(), 0.0, top, 0.0, -pixel_height.abs()],
            width,
            height,
            crs,
        )
    }

    /// Builds the north-up grid that covers `extent` with the given pixel size.
    ///
    /// Dimensions are rounded to the nearest whole pixel (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if a resolution is not positive.
    pub fn covering(
        extent: &Extent,
        x_resolution: f64,
        y_resolution: f64,
        crs: Option<Crs>,
    ) -> RasterResult<Self> {
        let (xres, yres) = (x_resolution.abs(), y_resolution.abs());
        if !(xres > 0.0 && yres > 0.0 && xres.is_finite() && yres.is_finite()) {
            return Err(RasterError::invalid(format!(
                "resolution must be positive, got ({x_resolution}, {y_resolution})"
            )));
        }
        let width = pixel_count(extent.width() / xres);
        let height = pixel_count(extent.height() / yres);
        Ok(Self::north_up(
            extent.xmin(),
            extent.ymax(),
            xres,
            yres,
            width,
            height,
            crs,
        ))
    }

    /// The GDAL-ordered geo transform.
    #[must_use]
    pub fn geo_transform(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.rotation_x,
            self.origin_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    #[must_use]
    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    #[must_use]
    pub fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    /// Signed pixel height; negative for north-up rasters.
    #[must_use]
    pub fn pixel_height(&self) -> f64 {
        self.pixel_height
    }

    #[must_use]
    pub fn rotation(&self) -> (f64, f64) {
        (self.rotation_x, self.rotation_y)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Returns a copy of this grid with a different CRS label.
    #[must_use]
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    #[must_use]
    pub fn is_rotated(&self) -> bool {
        self.rotation_x != 0.0 || self.rotation_y != 0.0
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World coordinate of a fractional pixel position.
    #[must_use]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.rotation_x,
            self.origin_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a world coordinate on a north-up grid.
    #[must_use]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// The bounding rectangle of all four grid corners.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if the grid has no area.
    #[allow(clippy::cast_precision_loss)]
    pub fn extent(&self) -> RasterResult<Extent> {
        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(w, 0.0),
            self.pixel_to_world(0.0, h),
            self.pixel_to_world(w, h),
        ];
        let xs = corners.iter().map(|c| c.0);
        let ys = corners.iter().map(|c| c.1);
        Extent::new(
            xs.clone().fold(f64::INFINITY, f64::min),
            ys.clone().fold(f64::INFINITY, f64::min),
            xs.fold(f64::NEG_INFINITY, f64::max),
            ys.fold(f64::NEG_INFINITY, f64::max),
        )
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} px, origin ({}, {}), pixel ({}, {})",
            self.width, self.height, self.origin_x, self.origin_y, self.pixel_width, self.pixel_height
        )?;
        if self.is_rotated() {
            write!(f, ", rotation ({}, {})", self.rotation_x, self.rotation_y)?;
        }
        match &self.crs {
            Some(crs) => write!(f, ", {crs}"),
            None => f.write_str(", no CRS"),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_count(value: f64) -> usize {
    (value.round() as usize).max(1)
}

/// A single band of cell values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGrid {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl CellGrid {
    /// Wraps row-major `values`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if `values.len() != width * height`.
    pub fn new(width: usize, height: usize, values: Vec<f64>) -> RasterResult<Self> {
        if values.len() != width * height {
            return Err(RasterError::invalid(format!(
                "{} values do not fill a {width}x{height} grid",
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// A grid with every cell set to `value`.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
        }
    }

    /// Builds a grid from rows of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if rows differ in length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> RasterResult<Self> {
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut values = Vec::with_capacity(width * rows.len());
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(RasterError::invalid("rows must all have the same length"));
            }
            values.extend_from_slice(row);
        }
        Self::new(width, rows.len(), values)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Value at `(col, row)`, if inside the grid.
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col < self.width && row < self.height {
            self.values.get(row * self.width + col).copied()
        } else {
            None
        }
    }

    /// The values of one row.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.height).then(|| &self.values[row * self.width..(row + 1) * self.width])
    }

    /// Applies `f` to every cell, keeping the shape.
    #[must_use]
    pub fn map<F: FnMut(f64) -> f64>(&self, f: F) -> Self {
        Self {
            width: self.width,
            height: self.height,
            values: self.values.iter().copied().map(f).collect(),
        }
    }
}

/// Cell storage types supported when writing rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Byte,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// All supported types, smallest first.
    pub const ALL: [DataType; 8] = [
        DataType::Byte,
        DataType::Int8,
        DataType::UInt16,
        DataType::Int16,
        DataType::UInt32,
        DataType::Int32,
        DataType::Float32,
        DataType::Float64,
    ];

    /// The GDAL name of this type, e.g. `Float32`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::Int8 => "Int8",
            DataType::UInt16 => "UInt16",
            DataType::Int16 => "Int16",
            DataType::UInt32 => "UInt32",
            DataType::Int32 => "Int32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            DataType::Byte => "Eight bit unsigned integer",
            DataType::Int8 => "Eight bit signed integer",
            DataType::UInt16 => "Sixteen bit unsigned integer",
            DataType::Int16 => "Sixteen bit signed integer",
            DataType::UInt32 => "Thirty two bit unsigned integer",
            DataType::Int32 => "Thirty two bit signed integer",
            DataType::Float32 => "Thirty two bit floating point",
            DataType::Float64 => "Sixty four bit floating point",
        }
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Inclusive bounds of an integer type, `None` for floating point.
    #[must_use]
    pub fn integer_range(self) -> Option<(f64, f64)> {
        Some(match self {
            DataType::Byte => (0.0, f64::from(u8::MAX)),
            DataType::Int8 => (f64::from(i8::MIN), f64::from(i8::MAX)),
            DataType::UInt16 => (0.0, f64::from(u16::MAX)),
            DataType::Int16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
            DataType::UInt32 => (0.0, f64::from(u32::MAX)),
            DataType::Int32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
            DataType::Float32 | DataType::Float64 => return None,
        })
    }

    /// Whether `value` can be stored in this type and read back as itself.
    ///
    /// Integer types take whole numbers inside their range only. `Float32`
    /// takes `NaN`, infinities and anything within its range, rounding to
    /// single precision.
    #[must_use]
    pub fn can_hold(self, value: f64) -> bool {
        match (self, self.integer_range()) {
            (_, Some((min, max))) => value.fract() == 0.0 && (min..=max).contains(&value),
            (DataType::Float32, None) => {
                !value.is_finite() || value.abs() <= f64::from(f32::MAX)
            }
            (_, None) => true,
        }
    }

    /// Bits per sample.
    #[must_use]
    pub fn bits(self) -> u16 {
        match self {
            DataType::Byte | DataType::Int8 => 8,
            DataType::UInt16 | DataType::Int16 => 16,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 32,
            DataType::Float64 => 64,
        }
    }
}

impl FromStr for DataType {
    type Err = RasterError;

    /// Accepts `float32`, `Float32` and `GDT_Float32` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let name = lowered.strip_prefix("gdt_").unwrap_or(&lowered);
        DataType::ALL
            .into_iter()
            .find(|dt| dt.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                let names: Vec<_> = DataType::ALL.iter().map(|dt| dt.name()).collect();
                RasterError::invalid(format!(
                    "'{s}' is not an available data type, choose one of: {}",
                    names.join(", ")
                ))
            })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A georeferenced single-band raster held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub(crate) spec: GridSpec,
    pub(crate) cells: CellGrid,
    pub(crate) nodata: Option<f64>,
    pub(crate) data_type: DataType,
}

impl Raster {
    /// Pairs cells with their geometry.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if the shapes disagree.
    pub fn new(
        spec: GridSpec,
        cells: CellGrid,
        nodata: Option<f64>,
        data_type: DataType,
    ) -> RasterResult<Self> {
        if spec.width() != cells.width() || spec.height() != cells.height() {
            return Err(RasterError::invalid(format!(
                "cells are {}x{} but the grid is {}x{}",
                cells.width(),
                cells.height(),
                spec.width(),
                spec.height()
            )));
        }
        Ok(Self {
            spec,
            cells,
            nodata,
            data_type,
        })
    }

    #[must_use]
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    #[must_use]
    pub fn cells(&self) -> &CellGrid {
        &self.cells
    }

    #[must_use]
    pub fn into_cells(self) -> CellGrid {
        self.cells
    }

    #[must_use]
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Whether `value` is NaN or equals the declared no-data value.
    #[must_use]
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| nd == value)
    }

    /// Returns a raster with the same geometry and new cells.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if `cells` has a different shape.
    pub fn with_cells(&self, cells: CellGrid) -> RasterResult<Self> {
        Self::new(self.spec.clone(), cells, self.nodata, self.data_type)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_geo_transform_round_trip() {
        let transform = [431_000.0, 30.0, 0.0, 4_503_000.0, 0.0, -30.0];
        let grid = GridSpec::from_geo_transform(transform, 200, 100, Some(Crs::Epsg(32610)));
        assert_eq!(grid.geo_transform(), transform);
        assert_eq!(grid.len(), 20_000);
        assert!(!grid.is_rotated());
    }

    #[test]
    fn test_extent_of_north_up_grid() {
        let grid = GridSpec::north_up(10.0, 100.0, 2.0, 5.0, 4, 3, None);
        let extent = grid.extent().unwrap();
        assert_eq!(extent.to_array(), [10.0, 85.0, 18.0, 100.0]);
    }

    #[test]
    fn test_extent_of_south_up_grid() {
        let grid = GridSpec::from_geo_transform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0], 2, 2, None);
        assert_eq!(grid.extent().unwrap().to_array(), [0.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_covering_rounds_dimensions() {
        let extent = Extent::new(0.0, 0.0, 100.0, 40.0).unwrap();
        let grid = GridSpec::covering(&extent, 10.0, 10.0, None).unwrap();
        assert_eq!((grid.width(), grid.height()), (10, 4));
        assert_eq!(grid.origin(), (0.0, 40.0));
        assert_eq!(grid.pixel_height(), -10.0);
        assert!(GridSpec::covering(&extent, 0.0, 10.0, None).is_err());
    }

    #[test]
    fn test_pixel_world_conversions() {
        let grid = GridSpec::north_up(100.0, 50.0, 2.0, 2.0, 10, 10, None);
        assert_eq!(grid.pixel_to_world(0.5, 0.5), (101.0, 49.0));
        assert_eq!(grid.world_to_pixel(101.0, 49.0), (0.5, 0.5));
    }

    #[test]
    fn test_cell_grid_shape_is_checked() {
        assert!(CellGrid::new(2, 2, vec![1.0; 3]).is_err());
        let grid = CellGrid::from_rows(&[[1.0, 2.0], [3.0, 255.0]]).unwrap();
        assert_eq!(grid.get(1, 1), Some(255.0));
        assert_eq!(grid.get(2, 0), None);
        assert_eq!(grid.row(0), Some(&[1.0, 2.0][..]));
        assert!(CellGrid::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[rstest]
    #[case("float32", DataType::Float32)]
    #[case("GDT_Float32", DataType::Float32)]
    #[case("gdt_byte", DataType::Byte)]
    #[case(" UInt16 ", DataType::UInt16)]
    #[case("INT32", DataType::Int32)]
    fn test_data_type_parse(#[case] input: &str, #[case] expected: DataType) {
        assert_eq!(input.parse::<DataType>().unwrap(), expected);
    }

    #[rstest]
    #[case("cfloat32")]
    #[case("complex")]
    fn test_data_type_parse_rejects_unknown(#[case] input: &str) {
        let err = input.parse::<DataType>().unwrap_err();
        assert!(err.to_string().contains("Float32"));
    }

    #[rstest]
    #[case(DataType::Byte, 255.0, true)]
    #[case(DataType::Byte, 256.0, false)]
    #[case(DataType::Byte, -9999.0, false)]
    #[case(DataType::Byte, 2.5, false)]
    #[case(DataType::Byte, f64::NAN, false)]
    #[case(DataType::Int16, -9999.0, true)]
    #[case(DataType::Int8, -129.0, false)]
    #[case(DataType::UInt32, 4_294_967_295.0, true)]
    #[case(DataType::Float32, -9999.5, true)]
    #[case(DataType::Float32, f64::NAN, true)]
    #[case(DataType::Float32, 1e300, false)]
    #[case(DataType::Float64, 1e300, true)]
    fn test_can_hold(#[case] data_type: DataType, #[case] value: f64, #[case] expected: bool) {
        assert_eq!(data_type.can_hold(value), expected);
    }

    #[test]
    fn test_raster_nodata() {
        let spec = GridSpec::north_up(0.0, 2.0, 1.0, 1.0, 2, 1, None);
        let cells = CellGrid::new(2, 1, vec![255.0, f64::NAN]).unwrap();
        let raster = Raster::new(spec, cells, Some(255.0), DataType::Byte).unwrap();
        assert!(raster.is_nodata(255.0));
        assert!(raster.is_nodata(f64::NAN));
        assert!(!raster.is_nodata(0.0));
    }
}
