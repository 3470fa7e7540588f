use std::path::Path;

use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalDataType, GdalType, RasterizeOptions as BurnOptions};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::{
    FieldValue as OgrValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal,
};
use gdal::{Dataset, DriverManager};

use crate::engine::GeoEngine;
use crate::options::{RasterizeOptions, WarpOptions, WriteOptions};
use crate::vector::{Feature, FieldValue};
use crate::{
    CellGrid, Crs, DataType, Extent, GridSpec, Raster, RasterError, RasterResult, VectorLayer,
};

/// Delegates every capability to the linked GDAL library.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalEngine;

impl GdalEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn spatial_ref(crs: &Crs) -> RasterResult<SpatialRef> {
    let mut srs = match crs {
        Crs::Epsg(code) => SpatialRef::from_epsg(*code)?,
        Crs::Proj(proj) => SpatialRef::from_proj4(proj)?,
        Crs::Wkt(wkt) => SpatialRef::from_wkt(wkt)?,
    };
    // x = easting / longitude, y = northing / latitude
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

fn crs_of(srs: &SpatialRef) -> Option<Crs> {
    if let (Ok(name), Ok(code)) = (srs.auth_name(), srs.auth_code())
        && name.eq_ignore_ascii_case("EPSG")
        && let Ok(code) = u32::try_from(code)
    {
        return Some(Crs::Epsg(code));
    }
    srs.to_wkt().ok().map(Crs::Wkt)
}

/// Rasters without a geo transform get GDAL's default pixel grid.
fn grid_of(dataset: &Dataset) -> GridSpec {
    let (width, height) = dataset.raster_size();
    let transform = dataset
        .geo_transform()
        .unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    let crs = dataset.spatial_ref().ok().as_ref().and_then(crs_of);
    GridSpec::from_geo_transform(transform, width, height, crs)
}

fn data_type_of(band_type: GdalDataType) -> DataType {
    match band_type {
        GdalDataType::UInt8 => DataType::Byte,
        GdalDataType::Int8 => DataType::Int8,
        GdalDataType::UInt16 => DataType::UInt16,
        GdalDataType::Int16 => DataType::Int16,
        GdalDataType::UInt32 => DataType::UInt32,
        GdalDataType::Int32 => DataType::Int32,
        GdalDataType::Float32 => DataType::Float32,
        _ => DataType::Float64,
    }
}

fn creation_options(compression: crate::Compression) -> RasterResult<CslStringList> {
    let mut options = CslStringList::new();
    if let Some(method) = compression.creation_option() {
        options.set_name_value("COMPRESS", method)?;
    }
    Ok(options)
}

/// Creates a single-band GTiff at `path` carrying `spec` and `values`.
fn create_tiff<T: GdalType + Copy>(
    path: &Path,
    spec: &GridSpec,
    values: &[f64],
    nodata: Option<f64>,
    options: &CslStringList,
    cast: impl Fn(f64) -> T,
) -> RasterResult<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        path,
        spec.width(),
        spec.height(),
        1,
        options,
    )?;
    dataset.set_geo_transform(&spec.geo_transform())?;
    if let Some(crs) = spec.crs() {
        dataset.set_spatial_ref(&spatial_ref(crs)?)?;
    }

    let mut band = dataset.rasterband(1)?;
    band.set_no_data_value(nodata)?;
    let data: Vec<T> = values.iter().map(|&v| cast(v)).collect();
    let mut buffer = Buffer::new((spec.width(), spec.height()), data);
    band.write((0, 0), (spec.width(), spec.height()), &mut buffer)?;
    Ok(())
}

/// Output grid of a warp: explicit bounds or the source extent carried into the target CRS.
#[allow(clippy::cast_precision_loss)]
fn warp_grid(source: &Dataset, options: &WarpOptions) -> RasterResult<GridSpec> {
    let source_grid = grid_of(source);
    let (width, height) = (source_grid.width(), source_grid.height());
    let source_crs = source_grid.crs().cloned();
    let target_crs = options.target_crs.clone().or(source_crs.clone());

    let bounds = match (options.bounds, &source_crs, &target_crs) {
        (Some(bounds), _, _) => bounds,
        (None, Some(from), Some(to)) if from != to => {
            let transform = CoordTransform::new(&spatial_ref(from)?, &spatial_ref(to)?)?;
            let [xmin, ymin, xmax, ymax] =
                transform.transform_bounds(&source_grid.extent()?.to_array(), 21)?;
            Extent::new(xmin, ymin, xmax, ymax)?
        }
        _ => source_grid.extent()?,
    };

    let (xres, yres) = match options.resolution {
        Some(resolution) => resolution,
        None if target_crs == source_crs => (
            source_grid.pixel_width().abs(),
            source_grid.pixel_height().abs(),
        ),
        // Keep the source pixel count across a CRS change.
        None => (
            bounds.width() / width.max(1) as f64,
            bounds.height() / height.max(1) as f64,
        ),
    };
    GridSpec::covering(&bounds, xres, yres, target_crs)
}

fn ogr_value(value: &FieldValue) -> Option<OgrValue> {
    match value {
        FieldValue::Integer(v) => Some(OgrValue::Integer64Value(*v)),
        FieldValue::Real(v) => Some(OgrValue::RealValue(*v)),
        FieldValue::Text(s) => Some(OgrValue::StringValue(s.clone())),
        FieldValue::Null => None,
    }
}

fn field_value(value: Option<OgrValue>) -> FieldValue {
    match value {
        Some(OgrValue::IntegerValue(v)) => FieldValue::Integer(i64::from(v)),
        Some(OgrValue::Integer64Value(v)) => FieldValue::Integer(v),
        Some(OgrValue::RealValue(v)) => FieldValue::Real(v),
        Some(OgrValue::StringValue(s)) => FieldValue::Text(s),
        Some(other) => FieldValue::Text(format!("{other:?}")),
        None => FieldValue::Null,
    }
}

fn vector_driver(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("gpkg") => "GPKG",
        Some("geojson" | "json") => "GeoJSON",
        _ => "ESRI Shapefile",
    }
}

impl GeoEngine for GdalEngine {
    fn open_band(&self, path: &Path, band: usize) -> RasterResult<Raster> {
        let dataset = Dataset::open(path).map_err(|e| RasterError::unreadable(path, e))?;
        let count = dataset.raster_count();
        if band == 0 || band > count {
            return Err(RasterError::invalid(format!(
                "band {band} does not exist, {} has {count} band(s)",
                path.display()
            )));
        }
        let spec = grid_of(&dataset);
        let (width, height) = (spec.width(), spec.height());

        let band = dataset.rasterband(band).map_err(|e| RasterError::unreadable(path, e))?;
        let buffer = band
            .read_as::<f64>((0, 0), (width, height), (width, height), None)
            .map_err(|e| RasterError::unreadable(path, e))?;
        let cells = CellGrid::new(width, height, buffer.data().to_vec())?;

        Raster::new(
            spec,
            cells,
            band.no_data_value(),
            data_type_of(band.band_type()),
        )
    }

    fn open_grid(&self, path: &Path) -> RasterResult<GridSpec> {
        let dataset = Dataset::open(path).map_err(|e| RasterError::unreadable(path, e))?;
        Ok(grid_of(&dataset))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_raster(
        &self,
        path: &Path,
        raster: &Raster,
        options: &WriteOptions,
    ) -> RasterResult<()> {
        let creation = creation_options(options.compression)?;
        let (spec, values, nodata) = (raster.spec(), raster.cells().values(), options.nodata);
        let written = match options.data_type {
            DataType::Byte => create_tiff(path, spec, values, nodata, &creation, |v| v.round() as u8),
            DataType::Int8 => create_tiff(path, spec, values, nodata, &creation, |v| v.round() as i8),
            DataType::UInt16 => create_tiff(path, spec, values, nodata, &creation, |v| v.round() as u16),
            DataType::Int16 => create_tiff(path, spec, values, nodata, &creation, |v| v.round() as i16),
            DataType::UInt32 => create_tiff(path, spec, values, nodata, &creation, |v| v.round() as u32),
            DataType::Int32 => create_tiff(path, spec, values, nodata, &creation, |v| v.round() as i32),
            DataType::Float32 => create_tiff(path, spec, values, nodata, &creation, |v| v as f32),
            DataType::Float64 => create_tiff(path, spec, values, nodata, &creation, |v| v),
        };
        written.map_err(|e| RasterError::write_failure(path, e))
    }

    fn open_vector_layer(&self, path: &Path) -> RasterResult<VectorLayer> {
        let dataset = Dataset::open(path).map_err(|e| RasterError::unreadable(path, e))?;
        let mut layer = dataset.layer(0).map_err(|e| RasterError::unreadable(path, e))?;
        let mut result = VectorLayer::new(layer.spatial_ref().as_ref().and_then(crs_of));
        result.fields = layer.defn().fields().map(|field| field.name()).collect();

        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                continue;
            };
            let mut converted = Feature::new(geometry.to_geo()?);
            for (name, value) in feature.fields() {
                converted = converted.with_attribute(name, field_value(value));
            }
            result.push(converted);
        }
        log::debug!("Read {} features from {}", result.len(), path.display());
        Ok(result)
    }

    fn write_vector_layer(&self, path: &Path, layer: &VectorLayer) -> RasterResult<()> {
        let failure = |e: gdal::errors::GdalError| RasterError::write_failure(path, e);

        let driver = DriverManager::get_driver_by_name(vector_driver(path)).map_err(failure)?;
        let mut dataset = driver.create_vector_only(path).map_err(failure)?;
        let srs = layer.crs.as_ref().map(spatial_ref).transpose()?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("layer");
        let mut output = dataset
            .create_layer(LayerOptions {
                name,
                srs: srs.as_ref(),
                ty: OGRwkbGeometryType::wkbUnknown,
                options: None,
            })
            .map_err(failure)?;

        let field_types: Vec<(&str, u32)> = layer
            .fields
            .iter()
            .map(|name| {
                let kind = layer
                    .features
                    .iter()
                    .find_map(|f| f.attribute(name).filter(|v| **v != FieldValue::Null))
                    .map_or(OGRFieldType::OFTReal, |value| match value {
                        FieldValue::Integer(_) => OGRFieldType::OFTInteger64,
                        FieldValue::Text(_) => OGRFieldType::OFTString,
                        FieldValue::Real(_) | FieldValue::Null => OGRFieldType::OFTReal,
                    });
                (name.as_str(), kind)
            })
            .collect();
        output.create_defn_fields(&field_types).map_err(failure)?;

        for feature in &layer.features {
            let (names, values): (Vec<&str>, Vec<OgrValue>) = feature
                .attributes
                .iter()
                .filter_map(|(name, value)| ogr_value(value).map(|v| (name.as_str(), v)))
                .unzip();
            output
                .create_feature_fields(feature.geometry.to_gdal()?, &names, &values)
                .map_err(failure)?;
        }
        Ok(())
    }

    fn reproject_vector(&self, layer: &VectorLayer, target: &Crs) -> RasterResult<VectorLayer> {
        let Some(source) = &layer.crs else {
            return Err(RasterError::invalid(
                "the layer has no coordinate reference system to reproject from",
            ));
        };
        let transform = CoordTransform::new(&spatial_ref(source)?, &spatial_ref(target)?)?;

        let mut result = VectorLayer::new(Some(target.clone()));
        result.fields.clone_from(&layer.fields);
        for feature in &layer.features {
            let mut geometry = feature.geometry.to_gdal()?;
            geometry.transform_inplace(&transform)?;
            result.features.push(Feature {
                geometry: geometry.to_geo()?,
                attributes: feature.attributes.clone(),
            });
        }
        Ok(result)
    }

    fn rasterize_layer(
        &self,
        layer: &VectorLayer,
        grid: &GridSpec,
        options: &RasterizeOptions,
    ) -> RasterResult<CellGrid> {
        let driver = DriverManager::get_driver_by_name("MEM")?;
        let mut dataset =
            driver.create_with_band_type::<f64, _>("", grid.width(), grid.height(), 1)?;
        dataset.set_geo_transform(&grid.geo_transform())?;
        if let Some(crs) = grid.crs() {
            dataset.set_spatial_ref(&spatial_ref(crs)?)?;
        }
        dataset.rasterband(1)?.fill(options.nodata, None)?;

        let mut geometries = Vec::new();
        let mut burn = Vec::new();
        for (geometry, value) in layer.burn_values(&options.attribute) {
            geometries.push(geometry.to_gdal()?);
            burn.push(value);
        }
        log::debug!(
            "Burning {} of {} features from '{}'",
            geometries.len(),
            layer.len(),
            options.attribute
        );

        let burn_options = BurnOptions {
            all_touched: options.all_touched,
            ..BurnOptions::default()
        };
        gdal::raster::rasterize(&mut dataset, &[1], &geometries, &burn, Some(burn_options))?;

        let buffer = dataset.rasterband(1)?.read_as::<f64>(
            (0, 0),
            (grid.width(), grid.height()),
            (grid.width(), grid.height()),
            None,
        )?;
        CellGrid::new(grid.width(), grid.height(), buffer.data().to_vec())
    }

    fn warp_raster(
        &self,
        source: &Path,
        destination: &Path,
        options: &WarpOptions,
    ) -> RasterResult<()> {
        let source_ds = Dataset::open(source).map_err(|e| RasterError::unreadable(source, e))?;
        let band = source_ds
            .rasterband(1)
            .map_err(|e| RasterError::unreadable(source, e))?;
        let nodata = options.nodata.or(band.no_data_value());
        let data_type = options
            .output_type
            .unwrap_or_else(|| data_type_of(band.band_type()));
        let grid = warp_grid(&source_ds, options)?;

        // Write an empty target with the final geometry, then let GDAL fill it.
        let fill = nodata.unwrap_or(0.0);
        let empty = Raster::new(
            grid.clone(),
            CellGrid::filled(grid.width(), grid.height(), fill),
            nodata,
            data_type,
        )?;
        let write = WriteOptions::default()
            .data_type(data_type)
            .nodata(nodata)
            .compression(options.compression);
        self.write_raster(destination, &empty, &write)?;

        let target = Dataset::open_ex(
            destination,
            gdal::DatasetOptions {
                open_flags: gdal::GdalOpenFlags::GDAL_OF_UPDATE,
                ..gdal::DatasetOptions::default()
            },
        )
        .map_err(|e| RasterError::write_failure(destination, e))?;
        gdal::raster::reproject(&source_ds, &target)
            .map_err(|e| RasterError::write_failure(destination, e))?;
        log::debug!("Warped {} onto {grid}", source.display());
        Ok(())
    }
}
