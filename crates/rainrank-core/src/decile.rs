//! Percentile scores to decile classes 1-10 over fixed breakpoints.
//!
//! The breakpoint table is carried over verbatim from the upstream rewrite
//! sequence, including its off-by-epsilon gaps: values in `(k*10.0,
//! k*10.00001]` fall into no bucket, pass through unclassified, and reach
//! the output through the truncating i16 cast. Downstream consumers may
//! depend on that behaviour, so it is preserved rather than repaired.

use std::path::Path;

use crate::blocks::{row_bands, BLOCK_ROWS};
use crate::error::RasterError;
use crate::io::{write_blocks, BlockData, GridMeta, GridReader, PixelFormat};

/// Nodata sentinel of decile output rasters.
pub const DECILE_NODATA: i16 = -1;

/// Sentinel convention of the upstream percentile producer. Used when the
/// input file declares no nodata of its own.
pub const DEFAULT_INPUT_NODATA: f32 = -32767.0;

/// Upper deciles: (exclusive lower bound, inclusive upper bound, class).
/// Class 1 is special-cased: it admits any score in [0, 10].
const BREAKS: [(f32, f32, i16); 9] = [
    (10.00001, 20.0, 2),
    (20.00001, 30.0, 3),
    (30.00001, 40.0, 4),
    (40.00001, 50.0, 5),
    (50.00001, 60.0, 6),
    (60.00001, 70.0, 7),
    (70.00001, 80.0, 8),
    (80.00001, 90.0, 9),
    (90.00001, 100.0, 10),
];

/// Maps percentile scores to decile classes, translating the input sentinel
/// to the output one on the way through.
pub struct DecileClassifier {
    input_nodata: f32,
}

impl Default for DecileClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_NODATA)
    }
}

impl DecileClassifier {
    pub fn new(input_nodata: f32) -> Self {
        Self { input_nodata }
    }

    /// Decile bucket for a score, or `None` for values no bucket admits:
    /// negatives (the nodata sentinels) and the breakpoint-gap values.
    pub fn bucket(score: f32) -> Option<i16> {
        if (0.0..=10.0).contains(&score) {
            return Some(1);
        }
        BREAKS
            .iter()
            .find(|(lo, hi, _)| score > *lo && score <= *hi)
            .map(|&(_, _, class)| class)
    }

    /// Classify one sample. Nodata normalises to `-1`; anything no bucket
    /// admits passes through and truncates in the i16 cast.
    pub fn classify_value(&self, value: f32) -> i16 {
        let v = if value == self.input_nodata {
            f32::from(DECILE_NODATA)
        } else {
            value
        };
        match Self::bucket(v) {
            Some(class) => class,
            None => v as i16,
        }
    }

    pub fn classify_block(&self, scores: &[f32]) -> Vec<i16> {
        scores.iter().map(|&v| self.classify_value(v)).collect()
    }
}

/// Convert a percentile raster to a decile raster, i16 with nodata `-1`.
/// The input sentinel is the file's declared nodata when present, otherwise
/// the documented upstream convention of `-32767`.
pub fn percentiles_to_deciles(input: &Path, output: &Path) -> Result<(), RasterError> {
    let mut reader = GridReader::open(input)?;
    let classifier = DecileClassifier::new(reader.nodata().unwrap_or(DEFAULT_INPUT_NODATA));
    let meta = GridMeta {
        nodata: Some(f32::from(DECILE_NODATA)),
        ..reader.meta()
    };

    let height = reader.height();
    let blocks = row_bands(height, BLOCK_ROWS).map(|band| {
        let scores = reader.read_rows(band.y0, band.rows)?;
        Ok(BlockData::I16(classifier.classify_block(&scores)))
    });
    write_blocks(output, &meta, PixelFormat::I16, blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GeoTransform, RainGrid, EPSG_AUSTRALIAN_ALBERS};
    use crate::io::{read_grid, write_grid};

    #[test]
    fn boundary_scores_take_the_lower_class() {
        assert_eq!(DecileClassifier::bucket(10.0), Some(1));
        assert_eq!(DecileClassifier::bucket(20.0), Some(2));
        assert_eq!(DecileClassifier::bucket(55.0), Some(6));
        assert_eq!(DecileClassifier::bucket(100.0), Some(10));
    }

    #[test]
    fn lowest_score_substitute_lands_in_class_one() {
        assert_eq!(DecileClassifier::bucket(0.01), Some(1));
        assert_eq!(DecileClassifier::bucket(0.0), Some(1));
    }

    #[test]
    fn breakpoint_gap_values_have_no_bucket() {
        // (10.0, 10.00001] is admitted by no class.
        assert_eq!(DecileClassifier::bucket(10.00001), None);
        assert_eq!(DecileClassifier::bucket(90.00001), None);
    }

    #[test]
    fn gap_values_pass_through_and_truncate() {
        let classifier = DecileClassifier::default();
        assert_eq!(classifier.classify_value(10.00001), 10);
        assert_eq!(classifier.classify_value(30.00001), 30);
    }

    #[test]
    fn input_sentinel_normalises_to_output_sentinel() {
        let classifier = DecileClassifier::default();
        assert_eq!(classifier.classify_value(-32767.0), DECILE_NODATA);

        let custom = DecileClassifier::new(-1.0);
        assert_eq!(custom.classify_value(-1.0), DECILE_NODATA);
    }

    #[test]
    fn stage_writes_i16_classes_with_nodata_flag() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("perc.tif");
        let grid = RainGrid {
            data: vec![0.01, 10.0, 55.0, 100.0, -32767.0, 73.2],
            width: 3,
            height: 2,
            transform: GeoTransform::new(0.0, 0.0, 1000.0, -1000.0),
            epsg: EPSG_AUSTRALIAN_ALBERS,
            nodata: Some(-32767.0),
        };
        write_grid(&input, &grid, PixelFormat::F32).expect("write");

        let output = dir.path().join("decile.tif");
        percentiles_to_deciles(&input, &output).expect("classify");

        let back = read_grid(&output).expect("read");
        assert_eq!(back.data, vec![1.0, 1.0, 6.0, 10.0, -1.0, 8.0]);
        assert_eq!(back.nodata, Some(-1.0));
    }
}
