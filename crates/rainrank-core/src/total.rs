//! Seasonal rainfall totals: the per-pixel sum of a list of monthly grids.

use std::path::{Path, PathBuf};

use crate::blocks::{row_bands, BLOCK_ROWS};
use crate::error::RasterError;
use crate::io::{write_blocks, BlockData, GridMeta, GridReader, PixelFormat};

/// Nodata sentinel of seasonal total rasters.
pub const TOTAL_NODATA: i32 = -1;

/// Sum one row band across the monthly stack. Samples equal to the sentinel
/// are skipped; a pixel with no valid sample, or a negative total, is `-1`.
pub fn sum_bands(bands: &[Vec<f32>], nodata: Option<f32>) -> Vec<i32> {
    let len = bands.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let mut sum = 0.0f64;
        let mut any_valid = false;
        for band in bands {
            let v = band[i];
            if nodata != Some(v) {
                sum += f64::from(v);
                any_valid = true;
            }
        }
        if !any_valid || sum < 0.0 {
            out.push(TOTAL_NODATA);
        } else {
            out.push(sum as i32);
        }
    }
    out
}

/// Sum the listed monthly grids into a seasonal total raster, i32 in
/// millimetres with nodata `-1`. The sentinel comes from the first listed
/// grid's metadata; all grids must share its dimensions.
pub fn sum_rasters(paths: &[PathBuf], output: &Path) -> Result<(), RasterError> {
    let Some(first) = paths.first() else {
        return Err(RasterError::EmptyStack {
            path: output.to_path_buf(),
        });
    };

    let mut readers = vec![GridReader::open(first)?];
    let width = readers[0].width();
    let height = readers[0].height();
    for path in &paths[1..] {
        let reader = GridReader::open(path)?;
        reader.require_shape(width, height)?;
        readers.push(reader);
    }

    let nodata = readers[0].nodata();
    let meta = GridMeta {
        nodata: Some(TOTAL_NODATA as f32),
        ..readers[0].meta()
    };

    let blocks = row_bands(height, BLOCK_ROWS).map(|band| {
        let mut bands = Vec::with_capacity(readers.len());
        for reader in &mut readers {
            bands.push(reader.read_rows(band.y0, band.rows)?);
        }
        Ok(BlockData::I32(sum_bands(&bands, nodata)))
    });
    write_blocks(output, &meta, PixelFormat::I32, blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GeoTransform, RainGrid, EPSG_WGS84};
    use crate::io::{read_grid, write_grid};

    #[test]
    fn sums_skip_the_sentinel() {
        let bands = vec![vec![10.0, -9999.0], vec![20.0, 5.0]];
        assert_eq!(sum_bands(&bands, Some(-9999.0)), vec![30, 5]);
    }

    #[test]
    fn fully_masked_pixel_is_nodata() {
        let bands = vec![vec![-9999.0], vec![-9999.0]];
        assert_eq!(sum_bands(&bands, Some(-9999.0)), vec![TOTAL_NODATA]);
    }

    #[test]
    fn negative_totals_collapse_to_nodata() {
        let bands = vec![vec![-5.0], vec![2.0]];
        assert_eq!(sum_bands(&bands, None), vec![TOTAL_NODATA]);
    }

    #[test]
    fn no_declared_sentinel_sums_everything() {
        let bands = vec![vec![1.5], vec![2.5]];
        assert_eq!(sum_bands(&bands, None), vec![4]);
    }

    #[test]
    fn stage_totals_a_monthly_stack() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transform = GeoTransform::new(129.0, -11.0, 0.05, -0.05);
        let months = [
            (dir.path().join("m1.tif"), vec![10.0, 0.0, -9999.0, 40.0]),
            (dir.path().join("m2.tif"), vec![15.0, 30.0, -9999.0, 2.0]),
        ];
        for (path, data) in &months {
            let grid = RainGrid {
                data: data.clone(),
                width: 2,
                height: 2,
                transform,
                epsg: EPSG_WGS84,
                nodata: Some(-9999.0),
            };
            write_grid(path, &grid, PixelFormat::F32).expect("write month");
        }

        let output = dir.path().join("total.tif");
        let paths: Vec<PathBuf> = months.iter().map(|(p, _)| p.clone()).collect();
        sum_rasters(&paths, &output).expect("sum");

        let back = read_grid(&output).expect("read");
        assert_eq!(back.data, vec![25.0, 30.0, -1.0, 42.0]);
        assert_eq!(back.nodata, Some(-1.0));
    }
}
