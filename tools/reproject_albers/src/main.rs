/// Reproject a geographic rainfall grid to GDA94 / Australian Albers
/// (EPSG:3577), nearest neighbour.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use rainrank_core::warp::reproject_to_albers;

#[derive(Parser, Debug)]
#[command(
    name = "reproject_albers",
    about = "Reproject a rainfall grid to GDA94 / Australian Albers"
)]
struct Args {
    /// Grid to reproject.
    #[arg(short, long)]
    img: PathBuf,

    /// Output path; defaults to the input name with an _albers.tif suffix.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let output = args.output.unwrap_or_else(|| albers_name(&args.img));
    reproject_to_albers(&args.img, &output)
        .with_context(|| format!("reprojecting {}", args.img.display()))?;

    eprintln!("[reproject_albers] {} has been reprojected", output.display());
    Ok(())
}

fn albers_name(img: &Path) -> PathBuf {
    let stem = img
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reprojected".into());
    img.with_file_name(format!("{stem}_albers.tif"))
}
