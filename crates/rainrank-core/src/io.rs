//! GeoTIFF access for single-band rainfall grids, plus the plain-text
//! raster-list files the stages hand to each other.
//!
//! Grids are stripped at `BLOCK_ROWS` rows and read/written strip-by-strip,
//! so a stage holds one row band per open raster. Georeference and the
//! nodata sentinel travel as file metadata: `ModelPixelScale` (33550),
//! `ModelTiepoint` (33922), a minimal `GeoKeyDirectory` (34735) carrying the
//! EPSG code, and the `GDAL_NODATA` ASCII tag (42113).

use std::fs;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::ColorType;
use tiff::encoder::{colortype, TiffEncoder, TiffValue};
use tiff::tags::Tag;

use crate::blocks::{row_bands, BLOCK_ROWS};
use crate::error::RasterError;
use crate::grid::{GeoTransform, RainGrid, EPSG_WGS84};

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const GEOKEY_MODEL_TYPE: u16 = 1024;
const GEOKEY_GEOGRAPHIC_TYPE: u16 = 2048;
const GEOKEY_PROJECTED_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

/// Everything about a grid except its samples. What a stage needs to open
/// an output matching its input.
#[derive(Debug, Clone, Copy)]
pub struct GridMeta {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub epsg: u32,
    pub nodata: Option<f32>,
}

/// On-disk sample type of an output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    F32,
    I16,
    I32,
}

/// One row band of output samples, in the type it will be stored as.
pub enum BlockData {
    F32(Vec<f32>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl BlockData {
    /// Cast an f32 working buffer to the storage type of the output.
    pub fn from_f32(format: PixelFormat, samples: Vec<f32>) -> Self {
        match format {
            PixelFormat::F32 => BlockData::F32(samples),
            PixelFormat::I16 => BlockData::I16(samples.iter().map(|&v| v as i16).collect()),
            PixelFormat::I32 => BlockData::I32(samples.iter().map(|&v| v as i32).collect()),
        }
    }
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Streaming reader over a single-band grid. Samples of any supported
/// integer or float type decode to f32. Strip-organised files (everything
/// this pipeline writes) are read one strip at a time; tiled files fall back
/// to a whole-image read at open.
pub struct GridReader {
    decoder: Decoder<BufReader<fs::File>>,
    path: PathBuf,
    width: usize,
    height: usize,
    transform: GeoTransform,
    epsg: Option<u32>,
    nodata: Option<f32>,
    rows_per_strip: usize,
    /// Whole-image cache, only populated for tiled layouts.
    full: Option<Vec<f32>>,
    /// Most recently decoded strip.
    strip: Option<(usize, Vec<f32>)>,
}

impl GridReader {
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        let file = fs::File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

        let (w, h) = decoder.dimensions()?;
        let width = w as usize;
        let height = h as usize;

        let nodata = read_nodata(&mut decoder);
        let transform = read_transform(&mut decoder);
        let epsg = read_epsg(&mut decoder);
        let rows_per_strip = decoder
            .get_tag_u32(Tag::RowsPerStrip)
            .map(|v| v as usize)
            .unwrap_or(height.max(1));

        // Tile-organised files do not map onto the row-band strip walk.
        let tiled = matches!(decoder.find_tag(Tag::TileWidth), Ok(Some(_)));
        let full = if tiled {
            Some(decoded_to_f32(decoder.read_image()?, path)?)
        } else {
            None
        };

        Ok(Self {
            decoder,
            path: path.to_path_buf(),
            width,
            height,
            transform,
            epsg,
            nodata,
            rows_per_strip,
            full,
            strip: None,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// EPSG code from the file's geo keys, if it carries any.
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Declared nodata sentinel. `None` means the file declares none and all
    /// samples participate in statistics.
    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata for deriving an output grid. Files without geo keys are
    /// taken as EPSG:4326, the system the monthly archives arrive in.
    pub fn meta(&self) -> GridMeta {
        GridMeta {
            width: self.width,
            height: self.height,
            transform: self.transform,
            epsg: self.epsg.unwrap_or(EPSG_WGS84),
            nodata: self.nodata,
        }
    }

    /// Fatal unless this raster matches the given dimensions exactly.
    /// The pipeline never resamples.
    pub fn require_shape(&self, width: usize, height: usize) -> Result<(), RasterError> {
        if self.width != width || self.height != height {
            return Err(RasterError::ShapeMismatch {
                path: self.path.clone(),
                got_width: self.width,
                got_height: self.height,
                want_width: width,
                want_height: height,
            });
        }
        Ok(())
    }

    /// Storage sample type of the file, for stages that carry their input's
    /// type through to the output. Anything unrecognised reads as f32.
    pub fn storage_format(&mut self) -> PixelFormat {
        let sample_format = self
            .decoder
            .find_tag(Tag::SampleFormat)
            .ok()
            .flatten()
            .map(value_u16_first)
            .unwrap_or(1);
        let bits = self
            .decoder
            .find_tag(Tag::BitsPerSample)
            .ok()
            .flatten()
            .map(value_u16_first)
            .unwrap_or(32);
        match (sample_format, bits) {
            (2, 16) => PixelFormat::I16,
            (2, 32) => PixelFormat::I32,
            _ => PixelFormat::F32,
        }
    }

    /// Read rows `y0 .. y0 + rows` as one row-major f32 buffer.
    pub fn read_rows(&mut self, y0: usize, rows: usize) -> Result<Vec<f32>, RasterError> {
        if let Some(full) = &self.full {
            return Ok(full[y0 * self.width..(y0 + rows) * self.width].to_vec());
        }

        let width = self.width;
        let mut out = Vec::with_capacity(rows * width);
        let mut y = y0;
        while y < y0 + rows {
            let strip_idx = y / self.rows_per_strip;
            let strip_y0 = strip_idx * self.rows_per_strip;
            let strip_end = (strip_y0 + self.rows_per_strip).min(self.height);
            let take = strip_end.min(y0 + rows) - y;

            let data = self.strip_data(strip_idx)?;
            let offset = (y - strip_y0) * width;
            out.extend_from_slice(&data[offset..offset + take * width]);
            y += take;
        }
        Ok(out)
    }

    /// Read the entire band. Bounded-memory callers should prefer
    /// `read_rows` over the row-band sequence.
    pub fn read_all(&mut self) -> Result<Vec<f32>, RasterError> {
        self.read_rows(0, self.height)
    }

    fn strip_data(&mut self, strip_idx: usize) -> Result<&[f32], RasterError> {
        if !matches!(&self.strip, Some((idx, _)) if *idx == strip_idx) {
            let decoded = self.decoder.read_chunk(strip_idx as u32)?;
            self.strip = Some((strip_idx, decoded_to_f32(decoded, &self.path)?));
        }
        match &self.strip {
            Some((_, data)) => Ok(data),
            None => unreachable!("strip cache populated above"),
        }
    }
}

/// Read a whole grid into memory with its metadata.
pub fn read_grid(path: &Path) -> Result<RainGrid, RasterError> {
    let mut reader = GridReader::open(path)?;
    let meta = reader.meta();
    let data = reader.read_all()?;
    Ok(RainGrid {
        data,
        width: meta.width,
        height: meta.height,
        transform: meta.transform,
        epsg: meta.epsg,
        nodata: meta.nodata,
    })
}

fn decoded_to_f32(decoded: DecodingResult, path: &Path) -> Result<Vec<f32>, RasterError> {
    let out = match decoded {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => {
            return Err(RasterError::UnsupportedPixelFormat {
                path: path.to_path_buf(),
            })
        }
    };
    Ok(out)
}

fn read_nodata<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    let value = decoder.find_tag(Tag::Unknown(TAG_GDAL_NODATA)).ok()??;
    match value {
        Value::Ascii(s) => s.trim_end_matches('\0').trim().parse::<f32>().ok(),
        _ => None,
    }
}

fn read_transform<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> GeoTransform {
    let scale = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .ok()
        .flatten()
        .map(value_f64_list)
        .unwrap_or_default();
    let tie = decoder
        .find_tag(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .ok()
        .flatten()
        .map(value_f64_list)
        .unwrap_or_default();

    if scale.len() >= 2 && tie.len() >= 5 {
        // Tiepoint maps raster (i, j) to model (x, y); normalise to pixel (0, 0).
        GeoTransform {
            origin_x: tie[3] - tie[0] * scale[0],
            origin_y: tie[4] + tie[1] * scale[1],
            pixel_width: scale[0],
            pixel_height: -scale[1],
        }
    } else {
        GeoTransform::new(0.0, 0.0, 1.0, -1.0)
    }
}

fn read_epsg<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder
        .find_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
        .ok()
        .flatten()
        .map(value_u16_list)?;
    // Entries of four shorts each, after the four-short header.
    for entry in keys.chunks_exact(4).skip(1) {
        if entry[0] == GEOKEY_PROJECTED_TYPE || entry[0] == GEOKEY_GEOGRAPHIC_TYPE {
            return Some(entry[3] as u32);
        }
    }
    None
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Double(d) => Some(*d),
        Value::Float(f) => Some(f64::from(*f)),
        Value::Short(s) => Some(f64::from(*s)),
        Value::Unsigned(u) => Some(f64::from(*u)),
        Value::Signed(i) => Some(f64::from(*i)),
        _ => None,
    }
}

fn value_f64_list(value: Value) -> Vec<f64> {
    match value {
        Value::List(items) => items.iter().filter_map(value_f64).collect(),
        other => value_f64(&other).into_iter().collect(),
    }
}

fn value_u16_first(value: Value) -> u16 {
    match value {
        Value::Short(s) => s,
        Value::List(items) => items
            .iter()
            .find_map(|v| match v {
                Value::Short(s) => Some(*s),
                _ => None,
            })
            .unwrap_or(0),
        _ => 0,
    }
}

fn value_u16_list(value: Value) -> Vec<u16> {
    match value {
        Value::List(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::Short(s) => Some(*s),
                _ => None,
            })
            .collect(),
        Value::Short(s) => vec![s],
        _ => Vec::new(),
    }
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Write a grid strip-by-strip from a sequence of row-band blocks produced
/// in `row_bands(meta.height, BLOCK_ROWS)` order. The band iterator is
/// consumed lazily, so producers stream and peak memory stays one band.
pub fn write_blocks<I>(
    path: &Path,
    meta: &GridMeta,
    format: PixelFormat,
    blocks: I,
) -> Result<(), RasterError>
where
    I: IntoIterator<Item = Result<BlockData, RasterError>>,
{
    let file = BufWriter::new(fs::File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    match format {
        PixelFormat::F32 => write_typed::<colortype::Gray32Float, _, _>(
            &mut encoder,
            path,
            meta,
            blocks,
            |b| match b {
                BlockData::F32(v) => Some(v),
                _ => None,
            },
        ),
        PixelFormat::I16 => write_typed::<colortype::GrayI16, _, _>(
            &mut encoder,
            path,
            meta,
            blocks,
            |b| match b {
                BlockData::I16(v) => Some(v),
                _ => None,
            },
        ),
        PixelFormat::I32 => write_typed::<colortype::GrayI32, _, _>(
            &mut encoder,
            path,
            meta,
            blocks,
            |b| match b {
                BlockData::I32(v) => Some(v),
                _ => None,
            },
        ),
    }
}

fn write_typed<C, I, F>(
    encoder: &mut TiffEncoder<BufWriter<fs::File>>,
    path: &Path,
    meta: &GridMeta,
    blocks: I,
    unwrap: F,
) -> Result<(), RasterError>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    I: IntoIterator<Item = Result<BlockData, RasterError>>,
    F: Fn(BlockData) -> Option<Vec<C::Inner>>,
{
    let mut image = encoder.new_image::<C>(meta.width as u32, meta.height as u32)?;
    image.rows_per_strip(BLOCK_ROWS as u32)?;

    let t = &meta.transform;
    let scale = [t.pixel_width, -t.pixel_height, 0.0];
    let tie = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    let model = if crate::grid::is_geographic(meta.epsg) {
        MODEL_TYPE_GEOGRAPHIC
    } else {
        MODEL_TYPE_PROJECTED
    };
    let code_key = if model == MODEL_TYPE_GEOGRAPHIC {
        GEOKEY_GEOGRAPHIC_TYPE
    } else {
        GEOKEY_PROJECTED_TYPE
    };
    let keys: [u16; 12] = [
        1, 1, 0, 2, // header: version 1.1, two keys
        GEOKEY_MODEL_TYPE, 0, 1, model,
        code_key, 0, 1, meta.epsg as u16,
    ];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])?;
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tie[..])?;
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), &keys[..])?;
    if let Some(nd) = meta.nodata {
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_NODATA), format!("{nd}").as_str())?;
    }

    for block in blocks {
        let data = unwrap(block?).ok_or_else(|| RasterError::BlockFormatMismatch {
            path: path.to_path_buf(),
        })?;
        image.write_strip(&data)?;
    }
    image.finish()?;
    Ok(())
}

/// Write an in-memory grid, casting samples to the requested storage type.
pub fn write_grid(path: &Path, grid: &RainGrid, format: PixelFormat) -> Result<(), RasterError> {
    let meta = GridMeta {
        width: grid.width,
        height: grid.height,
        transform: grid.transform,
        epsg: grid.epsg,
        nodata: grid.nodata,
    };
    let blocks = row_bands(grid.height, BLOCK_ROWS).map(|band| {
        let samples = &grid.data[band.y0 * grid.width..(band.y0 + band.rows) * grid.width];
        Ok(match format {
            PixelFormat::F32 => BlockData::F32(samples.to_vec()),
            PixelFormat::I16 => BlockData::I16(samples.iter().map(|&v| v as i16).collect()),
            PixelFormat::I32 => BlockData::I32(samples.iter().map(|&v| v as i32).collect()),
        })
    });
    write_blocks(path, &meta, format, blocks)
}

// ── Raster list files ────────────────────────────────────────────────────────

/// Read a newline-delimited list of raster paths, skipping blank lines.
pub fn read_raster_list(path: &Path) -> Result<Vec<PathBuf>, RasterError> {
    let text = fs::read_to_string(path)?;
    let files: Vec<PathBuf> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect();
    if files.is_empty() {
        return Err(RasterError::EmptyStack {
            path: path.to_path_buf(),
        });
    }
    Ok(files)
}

/// Write a newline-delimited list of raster paths.
pub fn write_raster_list(path: &Path, files: &[PathBuf]) -> Result<(), RasterError> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    for file in files {
        writeln!(out, "{}", file.display())?;
    }
    out.flush()?;
    Ok(())
}
