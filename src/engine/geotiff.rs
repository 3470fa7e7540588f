// Pure Rust GeoTIFF engine built on the `tiff` crate.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{
    ColorType, Gray8, Gray16, Gray32, Gray32Float, Gray64Float, GrayI8, GrayI16, GrayI32,
};
use tiff::encoder::{Compression as TiffCompression, DeflateLevel, DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;

use crate::engine::GeoEngine;
use crate::options::{Compression, RasterizeOptions, WarpOptions, WriteOptions};
use crate::{
    CellGrid, Crs, CrsKind, DataType, GridSpec, Raster, RasterError, RasterResult, VectorLayer,
};

// GeoTIFF tag IDs (not in the standard tag list)
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const MODEL_TYPE_GEOCENTRIC: u16 = 3;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Reads and writes single-band GeoTIFFs without any native dependency.
///
/// Warping is limited to nearest-neighbour resampling within the source CRS,
/// which covers tile extraction and template alignment. Vector operations and
/// cross-CRS warps are reported as [`RasterError::EngineFailure`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TiffEngine;

impl TiffEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn unsupported<T>(operation: &str) -> RasterResult<T> {
        Err(RasterError::engine(format!(
            "{operation} is not supported by the GeoTIFF engine, enable the `gdal` feature"
        )))
    }
}

impl GeoEngine for TiffEngine {
    fn open_band(&self, path: &Path, band: usize) -> RasterResult<Raster> {
        let unreadable = |e: tiff::TiffError| RasterError::unreadable(path, e);

        let file = File::open(path).map_err(|e| RasterError::unreadable(path, e))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(unreadable)?;
        let (width, height) = decoder.dimensions().map_err(unreadable)?;
        let (width, height) = (width as usize, height as usize);

        let transform = read_geo_transform(&mut decoder).map_err(unreadable)?;
        let crs = read_crs(&mut decoder).map_err(unreadable)?;
        let nodata = decoder
            .find_tag(Tag::Unknown(GDAL_NODATA))
            .and_then(|tag| tag.map(tiff::decoder::ifd::Value::into_string).transpose())
            .map_err(unreadable)?
            .and_then(|text| parse_nodata(&text));

        let image = decoder.read_image().map_err(unreadable)?;
        let (values, data_type) = decode_values(image).map_err(|e| RasterError::unreadable(path, e))?;
        let values = select_band(values, width * height, band)?;

        let spec = GridSpec::from_geo_transform(transform, width, height, crs);
        let cells = CellGrid::new(width, height, values)?;
        log::debug!("Opened {}: {spec}, {data_type}", path.display());
        Raster::new(spec, cells, nodata, data_type)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_raster(
        &self,
        path: &Path,
        raster: &Raster,
        options: &WriteOptions,
    ) -> RasterResult<()> {
        let failure = |e: tiff::TiffError| RasterError::write_failure(path, e);

        if raster.spec().is_empty() {
            return Err(RasterError::invalid("cannot write a raster without cells"));
        }
        let compression = match options.compression {
            Compression::None => TiffCompression::Uncompressed,
            Compression::Lzw => TiffCompression::Lzw,
            Compression::Deflate => TiffCompression::Deflate(DeflateLevel::Balanced),
            Compression::Jpeg => return Self::unsupported("JPEG compression"),
        };

        let file = File::create(path).map_err(|e| RasterError::write_failure(path, e))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))
            .map_err(failure)?
            .with_compression(compression);

        let values = raster.cells().values();
        let geo = GeoTags::new(raster.spec(), options.nodata);
        let written = match options.data_type {
            DataType::Byte => encode::<Gray8, _>(&mut encoder, &geo, &cast(values, |v| v as u8)),
            DataType::Int8 => encode::<GrayI8, _>(&mut encoder, &geo, &cast(values, |v| v as i8)),
            DataType::UInt16 => encode::<Gray16, _>(&mut encoder, &geo, &cast(values, |v| v as u16)),
            DataType::Int16 => encode::<GrayI16, _>(&mut encoder, &geo, &cast(values, |v| v as i16)),
            DataType::UInt32 => encode::<Gray32, _>(&mut encoder, &geo, &cast(values, |v| v as u32)),
            DataType::Int32 => encode::<GrayI32, _>(&mut encoder, &geo, &cast(values, |v| v as i32)),
            DataType::Float32 => {
                let data: Vec<f32> = values.iter().map(|&v| v as f32).collect();
                encode::<Gray32Float, _>(&mut encoder, &geo, &data)
            }
            DataType::Float64 => encode::<Gray64Float, _>(&mut encoder, &geo, values),
        };
        written.map_err(failure)?;
        log::debug!("Wrote {} ({})", path.display(), options.data_type);
        Ok(())
    }

    fn open_vector_layer(&self, _path: &Path) -> RasterResult<VectorLayer> {
        Self::unsupported("reading vector layers")
    }

    fn write_vector_layer(&self, _path: &Path, _layer: &VectorLayer) -> RasterResult<()> {
        Self::unsupported("writing vector layers")
    }

    fn reproject_vector(&self, layer: &VectorLayer, target: &Crs) -> RasterResult<VectorLayer> {
        if layer.crs.as_ref() == Some(target) {
            return Ok(layer.clone());
        }
        Self::unsupported("vector reprojection")
    }

    fn rasterize_layer(
        &self,
        _layer: &VectorLayer,
        _grid: &GridSpec,
        _options: &RasterizeOptions,
    ) -> RasterResult<CellGrid> {
        Self::unsupported("rasterization")
    }

    fn warp_raster(
        &self,
        source: &Path,
        destination: &Path,
        options: &WarpOptions,
    ) -> RasterResult<()> {
        let raster = self.open_raster(source)?;
        let target = target_grid(&raster, options)?;
        let nodata = options.nodata.or(raster.nodata());
        let cells = resample_nearest(&raster, &target, nodata.unwrap_or(0.0))?;
        let warped = Raster::new(
            target,
            cells,
            nodata,
            options.output_type.unwrap_or(raster.data_type()),
        )?;

        let write = WriteOptions::default()
            .data_type(warped.data_type())
            .nodata(nodata)
            .compression(options.compression);
        self.write_raster(destination, &warped, &write)
    }
}

/// The grid a warp writes: requested bounds and resolution, source values otherwise.
fn target_grid(raster: &Raster, options: &WarpOptions) -> RasterResult<GridSpec> {
    let spec = raster.spec();
    if spec.is_rotated() {
        return Err(RasterError::engine(
            "the GeoTIFF engine cannot warp rotated rasters",
        ));
    }
    if let Some(target) = &options.target_crs
        && spec.crs() != Some(target)
    {
        return Err(RasterError::engine(format!(
            "reprojecting from {} to {target} needs the `gdal` feature",
            spec.crs().map_or_else(|| "an unknown CRS".to_string(), ToString::to_string)
        )));
    }

    let bounds = match options.bounds {
        Some(bounds) => bounds,
        None => spec.extent()?,
    };
    let (xres, yres) = options
        .resolution
        .unwrap_or((spec.pixel_width().abs(), spec.pixel_height().abs()));
    GridSpec::covering(&bounds, xres, yres, spec.crs().cloned())
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn resample_nearest(raster: &Raster, target: &GridSpec, fill: f64) -> RasterResult<CellGrid> {
    let source = raster.spec();
    let cells = raster.cells();
    let mut values = Vec::with_capacity(target.len());
    for row in 0..target.height() {
        for col in 0..target.width() {
            let (x, y) = target.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);
            let (src_col, src_row) = source.world_to_pixel(x, y);
            let value = if src_col >= 0.0 && src_row >= 0.0 {
                cells.get(src_col.floor() as usize, src_row.floor() as usize)
            } else {
                None
            };
            values.push(match value {
                Some(v) if !raster.is_nodata(v) => v,
                _ => fill,
            });
        }
    }
    CellGrid::new(target.width(), target.height(), values)
}

fn cast<T>(values: &[f64], f: impl Fn(f64) -> T) -> Vec<T> {
    values.iter().map(|&v| f(v.round())).collect()
}

fn encode<C, W>(
    encoder: &mut TiffEncoder<W>,
    geo: &GeoTags,
    data: &[C::Inner],
) -> tiff::TiffResult<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let mut image = encoder.new_image::<C>(geo.width, geo.height)?;
    geo.write(image.encoder())?;
    image.write_data(data)
}

/// GeoTIFF georeferencing tags for one image.
struct GeoTags {
    width: u32,
    height: u32,
    transform: [f64; 6],
    rotated: bool,
    geo_keys: Vec<u16>,
    ascii_params: Option<String>,
    nodata: Option<String>,
}

impl GeoTags {
    #[allow(clippy::cast_possible_truncation)]
    fn new(spec: &GridSpec, nodata: Option<f64>) -> Self {
        let (geo_keys, ascii_params) = geo_key_directory(spec.crs());
        Self {
            width: spec.width() as u32,
            height: spec.height() as u32,
            transform: spec.geo_transform(),
            rotated: spec.is_rotated(),
            geo_keys,
            ascii_params,
            nodata: nodata.map(format_nodata),
        }
    }

    fn write<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
    ) -> tiff::TiffResult<()> {
        let [origin_x, pixel_width, rotation_x, origin_y, rotation_y, pixel_height] =
            self.transform;
        if self.rotated {
            let matrix = [
                pixel_width, rotation_x, 0.0, origin_x,
                rotation_y, pixel_height, 0.0, origin_y,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            dir.write_tag(Tag::Unknown(MODEL_TRANSFORMATION), matrix.as_slice())?;
        } else {
            // The tiepoint ties pixel (0, 0) to the origin; scale Y is positive for north-up.
            let scale = [pixel_width, -pixel_height, 0.0];
            let tiepoint = [0.0, 0.0, 0.0, origin_x, origin_y, 0.0];
            dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())?;
            dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())?;
        }
        dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), self.geo_keys.as_slice())?;
        if let Some(ascii) = &self.ascii_params {
            dir.write_tag(Tag::Unknown(GEO_ASCII_PARAMS), ascii.as_str())?;
        }
        if let Some(nodata) = &self.nodata {
            dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;
        }
        Ok(())
    }
}

/// Builds the GeoKeyDirectory and, for systems without a GeoKey code, the
/// citation text.
///
/// Layout: `[version, revision, minor, count, (key, location, count, value)...]`
/// with keys in ascending order. Geocentric systems have no type key of their
/// own, so they are written as model type 3 with the CRS in the citation.
#[allow(clippy::cast_possible_truncation)]
fn geo_key_directory(crs: Option<&Crs>) -> (Vec<u16>, Option<String>) {
    let mut keys: Vec<[u16; 4]> = Vec::new();
    let mut ascii = None;

    if let Some(crs) = crs {
        let kind = crs.kind();
        let (model, type_key) = match kind {
            CrsKind::Geographic => (MODEL_TYPE_GEOGRAPHIC, Some(GEOGRAPHIC_TYPE)),
            CrsKind::Projected => (MODEL_TYPE_PROJECTED, Some(PROJECTED_CS_TYPE)),
            CrsKind::Geocentric => (MODEL_TYPE_GEOCENTRIC, None),
        };
        keys.push([GT_MODEL_TYPE, 0, 1, model]);
        keys.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);

        let code = crs.epsg().and_then(|code| u16::try_from(code).ok());
        match (type_key, code) {
            (Some(key), Some(code)) => keys.push([key, 0, 1, code]),
            (type_key, _) => {
                let text = format!("{crs}|");
                keys.push([GT_CITATION, GEO_ASCII_PARAMS, text.len() as u16, 0]);
                if let Some(key) = type_key {
                    keys.push([key, 0, 1, USER_DEFINED]);
                }
                ascii = Some(text);
            }
        }
    } else {
        keys.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.into_iter().flatten());
    (directory, ascii)
}

fn read_geo_transform<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
) -> tiff::TiffResult<[f64; 6]> {
    if let Some(matrix) = decoder.find_tag(Tag::Unknown(MODEL_TRANSFORMATION))? {
        let m = matrix.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok([m[3], m[0], m[1], m[7], m[4], m[5]]);
        }
    }

    let scale = decoder
        .find_tag(Tag::Unknown(MODEL_PIXEL_SCALE))?
        .map(tiff::decoder::ifd::Value::into_f64_vec)
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::Unknown(MODEL_TIEPOINT))?
        .map(tiff::decoder::ifd::Value::into_f64_vec)
        .transpose()?;
    match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            // Tiepoint (i, j) -> (x, y); shift to the pixel (0, 0) corner.
            let origin_x = t[3] - t[0] * s[0];
            let origin_y = t[4] + t[1] * s[1];
            Ok([origin_x, s[0], 0.0, origin_y, 0.0, -s[1]])
        }
        // Plain TIFF: GDAL's default pixel grid.
        _ => Ok([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
    }
}

fn read_crs<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> tiff::TiffResult<Option<Crs>> {
    let Some(directory) = decoder.find_tag(Tag::Unknown(GEO_KEY_DIRECTORY))? else {
        return Ok(None);
    };
    let directory: Vec<u32> = directory.into_u32_vec()?;
    let ascii = decoder
        .find_tag(Tag::Unknown(GEO_ASCII_PARAMS))?
        .map(tiff::decoder::ifd::Value::into_string)
        .transpose()?;

    let mut citation = None;
    for entry in directory.get(4..).unwrap_or_default().chunks_exact(4) {
        let (key, location, count, value) = (entry[0], entry[1], entry[2], entry[3]);
        match u16::try_from(key) {
            Ok(GEOGRAPHIC_TYPE | PROJECTED_CS_TYPE) if location == 0 && value != u32::from(USER_DEFINED) => {
                return Ok(Some(Crs::Epsg(value)));
            }
            Ok(GT_CITATION) if location == u32::from(GEO_ASCII_PARAMS) => {
                citation = ascii.as_deref().and_then(|text| {
                    let start = value as usize;
                    let end = start + (count as usize).saturating_sub(1);
                    text.get(start..end)
                        .map(|s| s.trim_end_matches('|').to_string())
                });
            }
            _ => {}
        }
    }
    Ok(citation.and_then(|text| text.parse().ok()))
}

fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim().trim_end_matches('\0');
    if text.eq_ignore_ascii_case("nan") {
        Some(f64::NAN)
    } else {
        text.parse().ok()
    }
}

fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

fn decode_values(image: DecodingResult) -> Result<(Vec<f64>, DataType), String> {
    Ok(match image {
        DecodingResult::U8(v) => (v.into_iter().map(f64::from).collect(), DataType::Byte),
        DecodingResult::I8(v) => (v.into_iter().map(f64::from).collect(), DataType::Int8),
        DecodingResult::U16(v) => (v.into_iter().map(f64::from).collect(), DataType::UInt16),
        DecodingResult::I16(v) => (v.into_iter().map(f64::from).collect(), DataType::Int16),
        DecodingResult::U32(v) => (v.into_iter().map(f64::from).collect(), DataType::UInt32),
        DecodingResult::I32(v) => (v.into_iter().map(f64::from).collect(), DataType::Int32),
        DecodingResult::F32(v) => (v.into_iter().map(f64::from).collect(), DataType::Float32),
        DecodingResult::F64(v) => (v, DataType::Float64),
        #[allow(unreachable_patterns)]
        _ => return Err("unsupported sample format (64-bit integers or half floats)".to_string()),
    })
}

/// Keeps sample `band` (1-based) of every pixel of an interleaved image.
fn select_band(values: Vec<f64>, pixels: usize, band: usize) -> RasterResult<Vec<f64>> {
    let samples = if pixels == 0 { 1 } else { (values.len() / pixels).max(1) };
    if band == 0 || band > samples {
        return Err(RasterError::invalid(format!(
            "band {band} does not exist, the raster has {samples} band(s)"
        )));
    }
    if samples == 1 {
        return Ok(values);
    }
    Ok(values
        .into_iter()
        .skip(band - 1)
        .step_by(samples)
        .take(pixels)
        .collect())
}
