/// Convert a percentile score grid to decile classes:
///   1 = 0-10%, 2 = 10.001-20%, ... 10 = 90.001-100%
/// Output is i16 with nodata -1.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rainrank_core::decile::percentiles_to_deciles;

#[derive(Parser, Debug)]
#[command(name = "decile", about = "Convert a percentile score grid to decile classes")]
struct Args {
    /// Input percentile score grid.
    #[arg(short, long)]
    inimage: PathBuf,

    /// Output decile grid.
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    percentiles_to_deciles(&args.inimage, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    eprintln!("[decile] {} is complete", args.output.display());
    Ok(())
}
