/// Clip a rainfall grid to a polygon boundary. The boundary is GeoJSON in
/// the grid's coordinate system; output is cropped to the boundary's
/// bounding box with everything outside the polygon set to nodata.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rainrank_core::clip::{clip_to_boundary, Boundary};

#[derive(Parser, Debug)]
#[command(name = "clip_boundary", about = "Clip a rainfall grid to a polygon boundary")]
struct Args {
    /// Grid to clip.
    #[arg(short, long)]
    img: PathBuf,

    /// GeoJSON boundary polygon, in the grid's coordinate system.
    #[arg(short, long)]
    boundary: PathBuf,

    /// Output clipped grid.
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let boundary = Boundary::from_geojson_file(&args.boundary)
        .with_context(|| format!("reading {}", args.boundary.display()))?;
    clip_to_boundary(&args.img, &boundary, &args.output)
        .with_context(|| format!("clipping {}", args.img.display()))?;

    eprintln!(
        "[clip_boundary] {} has been clipped to {}",
        args.img.display(),
        args.boundary.display()
    );
    Ok(())
}
