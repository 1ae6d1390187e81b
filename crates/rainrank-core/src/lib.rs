//! Seasonal rainfall statistics over gridded monthly rainfall archives:
//! period totals, per-pixel percentile ranks against the historical record,
//! decile classes, and the reproject/clip steps that put the results on the
//! regional map.
//!
//! Every stage streams its rasters as fixed-height row bands, so memory is
//! bounded by band size times stack depth rather than raster size. Stages
//! compose in-process through the functions in each module; the tool
//! binaries keep the one-file-per-stage handoff available on the command
//! line.

pub mod blocks;
pub mod clip;
pub mod decile;
pub mod error;
pub mod grid;
pub mod io;
pub mod percentile;
pub mod season;
pub mod total;
pub mod warp;

pub use error::RasterError;
pub use grid::{GeoTransform, RainGrid};
