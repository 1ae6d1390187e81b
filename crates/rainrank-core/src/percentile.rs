//! Per-pixel percentile rank of a target rainfall grid against a historical
//! stack of grids for the same season.
//!
//! The stage runs in two passes over the output, matching the upstream
//! producer's behaviour exactly: pass 1 ranks every pixel (the target's
//! nodata sentinel is just a number to the ranking loop) into a temporary
//! raster; pass 2 re-reads the temporary raster together with the original
//! target, forces the output nodata wherever the target is nodata, writes the
//! final raster, and deletes the temporary.

use std::fs;
use std::path::{Path, PathBuf};

use crate::blocks::{row_bands, BLOCK_ROWS};
use crate::error::RasterError;
use crate::io::{write_blocks, BlockData, GridMeta, GridReader, PixelFormat};

/// Nodata sentinel of percentile output rasters.
pub const PERCENTILE_NODATA: f32 = -1.0;

/// Substitute for a raw score of exactly zero. A lowest-on-record reading
/// must stay distinguishable from the nodata sentinel.
pub const LOWEST_SCORE: f32 = 0.01;

/// Percentage of `dist` at or below `sample` under the mean tie rule:
/// values strictly below count fully, exact ties count half, values above
/// count nothing. An empty distribution yields NaN.
pub fn percentile_of_score(dist: &[f32], sample: f32) -> f32 {
    let mut below = 0usize;
    let mut equal = 0usize;
    for &v in dist {
        if v < sample {
            below += 1;
        } else if v == sample {
            equal += 1;
        }
    }
    (below as f32 + 0.5 * equal as f32) / dist.len() as f32 * 100.0
}

/// Ranks row bands of a target grid against the matching bands of a
/// historical stack. The nodata sentinel is per-engine configuration;
/// `None` disables masking entirely.
pub struct PercentileRankEngine {
    nodata: Option<f32>,
}

impl PercentileRankEngine {
    pub fn new(nodata: Option<f32>) -> Self {
        Self { nodata }
    }

    /// Rank one row band. `history` holds the same band from each historical
    /// grid; all buffers must be the same length as `target`.
    ///
    /// History masking is per-element: a sample is dropped from a pixel's
    /// distribution when that sample equals the sentinel, independent of
    /// whether the target is nodata there. A pixel whose distribution masks
    /// to empty scores the output nodata.
    pub fn rank_block(&self, history: &[Vec<f32>], target: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(target.len());
        let mut dist: Vec<f32> = Vec::with_capacity(history.len());
        for (i, &sample) in target.iter().enumerate() {
            dist.clear();
            for band in history {
                let v = band[i];
                if self.nodata != Some(v) {
                    dist.push(v);
                }
            }
            let score = if dist.is_empty() {
                PERCENTILE_NODATA
            } else {
                let raw = percentile_of_score(&dist, sample);
                if raw == 0.0 {
                    LOWEST_SCORE
                } else {
                    raw
                }
            };
            out.push(score);
        }
        out
    }
}

/// Compute the percentile-rank raster of `target_path` against the stack of
/// `history_paths`, writing f32 scores with nodata `-1` to `output_path`.
/// All rasters must share the target's exact dimensions.
pub fn rank_against_history(
    history_paths: &[PathBuf],
    target_path: &Path,
    output_path: &Path,
) -> Result<(), RasterError> {
    if history_paths.is_empty() {
        return Err(RasterError::EmptyStack {
            path: target_path.to_path_buf(),
        });
    }

    let mut target = GridReader::open(target_path)?;
    let width = target.width();
    let height = target.height();

    let mut history = Vec::with_capacity(history_paths.len());
    for path in history_paths {
        let reader = GridReader::open(path)?;
        reader.require_shape(width, height)?;
        history.push(reader);
    }

    let nodata = target.nodata();
    let engine = PercentileRankEngine::new(nodata);
    let meta = GridMeta {
        nodata: Some(PERCENTILE_NODATA),
        ..target.meta()
    };

    // Pass 1: raw scores for every pixel, into a temporary raster.
    let tmp_path = unmasked_path(output_path);
    {
        let blocks = row_bands(height, BLOCK_ROWS).map(|band| {
            let mut bands = Vec::with_capacity(history.len());
            for reader in &mut history {
                bands.push(reader.read_rows(band.y0, band.rows)?);
            }
            let samples = target.read_rows(band.y0, band.rows)?;
            Ok(BlockData::F32(engine.rank_block(&bands, &samples)))
        });
        write_blocks(&tmp_path, &meta, PixelFormat::F32, blocks)?;
    }

    // Pass 2: mask by the original target and finalise.
    {
        let mut raw = GridReader::open(&tmp_path)?;
        let mut mask = GridReader::open(target_path)?;
        let blocks = row_bands(height, BLOCK_ROWS).map(|band| {
            let mut scores = raw.read_rows(band.y0, band.rows)?;
            let samples = mask.read_rows(band.y0, band.rows)?;
            if let Some(nd) = nodata {
                for (score, &sample) in scores.iter_mut().zip(&samples) {
                    if sample == nd {
                        *score = PERCENTILE_NODATA;
                    }
                }
            }
            Ok(BlockData::F32(scores))
        });
        write_blocks(output_path, &meta, PixelFormat::F32, blocks)?;
    }
    fs::remove_file(&tmp_path)?;
    Ok(())
}

fn unmasked_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "percentile".into());
    name.push(".unmasked.tif");
    output.with_file_name(name)
}
