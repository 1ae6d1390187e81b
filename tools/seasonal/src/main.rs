/// Seasonal rainfall pipeline over a monthly grid archive: select the grids
/// for each period, total them, reproject the total to GDA94 / Australian
/// Albers, and optionally clip it to a regional boundary — composed
/// in-process per period, one period per output set.
///
/// Runs a single period (--start/--finish, both YYYYMM) or one period per
/// year in the archive (--start-month/--finish-month, with --cross-year for
/// seasons spanning two calendar years).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;

use rainrank_core::clip::{clip_to_boundary, Boundary};
use rainrank_core::season::{find_rasters, select_period, years, SeasonWindow};
use rainrank_core::total::sum_rasters;
use rainrank_core::warp::reproject_to_albers;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "seasonal", about = "Seasonal total rainfall grids from a monthly archive")]
struct Args {
    /// Directory of monthly rainfall grids, searched recursively.
    #[arg(long)]
    rain_dir: PathBuf,

    /// End of the monthly grid file names.
    #[arg(long, default_value = "rain.tif")]
    suffix: String,

    /// Start of a single period, YYYYMM.
    #[arg(long)]
    start: Option<u32>,

    /// Finish of a single period, YYYYMM (inclusive).
    #[arg(long)]
    finish: Option<u32>,

    /// Start month (1-12) for one period per archive year.
    #[arg(long)]
    start_month: Option<u32>,

    /// Finish month (1-12) for one period per archive year.
    #[arg(long)]
    finish_month: Option<u32>,

    /// Every-year seasons finish in the following calendar year.
    #[arg(long)]
    cross_year: bool,

    /// Output directory for the totals and warped grids.
    #[arg(short, long)]
    outdir: PathBuf,

    /// Optional GeoJSON boundary (in EPSG:3577) to clip the warped grids to.
    #[arg(long)]
    boundary: Option<PathBuf>,

    /// Name prefix of the clipped outputs.
    #[arg(long, default_value = "NT")]
    clip_prefix: String,
}

// ── Run manifest ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PeriodSummary {
    start: u32,
    finish: u32,
    monthly_grids: usize,
    total: PathBuf,
    albers: PathBuf,
    clipped: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunManifest {
    rain_dir: PathBuf,
    suffix: String,
    periods: Vec<PeriodSummary>,
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

fn run_period(
    files: &[PathBuf],
    start: u32,
    finish: u32,
    outdir: &Path,
    boundary: Option<&Boundary>,
    clip_prefix: &str,
) -> Result<PeriodSummary> {
    let months = select_period(files, start, finish);
    if months.is_empty() {
        bail!("no monthly grids found for period {start}-{finish}");
    }

    let total = outdir.join(format!("AU_{start}{finish}_total_rainfall.tif"));
    sum_rasters(&months, &total).with_context(|| format!("totalling {start}-{finish}"))?;
    eprintln!(
        "[seasonal] {start}-{finish}: {} monthly grids -> {}",
        months.len(),
        total.display()
    );

    let albers = outdir.join(format!("AU_{start}{finish}_total_rainfall_albers.tif"));
    reproject_to_albers(&total, &albers)
        .with_context(|| format!("reprojecting {}", total.display()))?;

    let clipped = match boundary {
        Some(bnd) => {
            let path =
                outdir.join(format!("{clip_prefix}_{start}{finish}_total_rainfall_albers.tif"));
            clip_to_boundary(&albers, bnd, &path)
                .with_context(|| format!("clipping {}", albers.display()))?;
            Some(path)
        }
        None => None,
    };

    Ok(PeriodSummary {
        start,
        finish,
        monthly_grids: months.len(),
        total,
        albers,
        clipped,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    let files = find_rasters(&args.rain_dir, &args.suffix)
        .with_context(|| format!("searching {}", args.rain_dir.display()))?;
    if files.is_empty() {
        bail!("no *{} grids under {}", args.suffix, args.rain_dir.display());
    }
    eprintln!("[seasonal] {} monthly grids in the archive", files.len());

    let periods: Vec<(u32, u32)> = match (args.start, args.finish, args.start_month, args.finish_month) {
        (Some(start), Some(finish), None, None) => vec![(start, finish)],
        (None, None, Some(start_month), Some(finish_month)) => {
            let window = SeasonWindow {
                start_month,
                finish_month,
                cross_year: args.cross_year,
            };
            years(&files)
                .into_iter()
                .map(|year| window.period_for(year))
                .collect()
        }
        _ => bail!("pass either --start/--finish or --start-month/--finish-month"),
    };

    let boundary = match &args.boundary {
        Some(path) => Some(
            Boundary::from_geojson_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    fs::create_dir_all(&args.outdir)?;

    // Periods write disjoint output sets, so they can run concurrently.
    let summaries: Vec<PeriodSummary> = periods
        .par_iter()
        .map(|&(start, finish)| {
            run_period(
                &files,
                start,
                finish,
                &args.outdir,
                boundary.as_ref(),
                &args.clip_prefix,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let manifest = RunManifest {
        rain_dir: args.rain_dir.clone(),
        suffix: args.suffix.clone(),
        periods: summaries,
    };
    let manifest_path = args.outdir.join("manifest.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

    eprintln!(
        "[seasonal] {} periods complete, manifest at {}",
        manifest.periods.len(),
        manifest_path.display()
    );
    Ok(())
}
