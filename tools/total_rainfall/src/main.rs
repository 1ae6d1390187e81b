/// Seasonal total rainfall grid from a list of monthly rainfall grids.
/// Output is i32 millimetres with nodata -1.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rainrank_core::io::read_raster_list;
use rainrank_core::total::sum_rasters;

#[derive(Parser, Debug)]
#[command(name = "total_rainfall", about = "Sum monthly rainfall grids into a seasonal total")]
struct Args {
    /// List file of the monthly grids to sum, one path per line.
    #[arg(short = 'l', long)]
    imglist: PathBuf,

    /// Output total rainfall grid.
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let months = read_raster_list(&args.imglist)
        .with_context(|| format!("reading {}", args.imglist.display()))?;
    eprintln!("[total_rainfall] summing {} monthly grids", months.len());

    sum_rasters(&months, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    eprintln!("[total_rainfall] {} is complete", args.output.display());
    Ok(())
}
