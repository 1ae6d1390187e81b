/// Percentile score of a seasonal rainfall grid against the long-term
/// record: for every pixel, the rank of the current total within the listed
/// historical totals, 0.01-100 with nodata -1.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rainrank_core::io::read_raster_list;
use rainrank_core::percentile::rank_against_history;

#[derive(Parser, Debug)]
#[command(
    name = "percentile_rank",
    about = "Rank a seasonal rainfall grid against a stack of historical seasons"
)]
struct Args {
    /// List file of the historical seasonal grids, one path per line.
    #[arg(short = 'l', long)]
    imglist: PathBuf,

    /// Seasonal grid to rank.
    #[arg(short, long)]
    img: PathBuf,

    /// Output percentile score grid.
    #[arg(short, long)]
    outfile: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let history = read_raster_list(&args.imglist)
        .with_context(|| format!("reading {}", args.imglist.display()))?;
    eprintln!(
        "[percentile_rank] ranking {} against {} historical grids",
        args.img.display(),
        history.len()
    );

    rank_against_history(&history, &args.img, &args.outfile)
        .with_context(|| format!("writing {}", args.outfile.display()))?;

    eprintln!("[percentile_rank] {} is complete", args.outfile.display());
    Ok(())
}
