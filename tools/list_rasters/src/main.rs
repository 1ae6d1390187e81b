/// Build a raster list file: every file under a directory tree whose name
/// ends with the given suffix, one path per line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rainrank_core::io::write_raster_list;
use rainrank_core::season::find_rasters;

#[derive(Parser, Debug)]
#[command(name = "list_rasters", about = "List rainfall grids under a directory into a list file")]
struct Args {
    /// Directory to search, recursively.
    #[arg(short, long)]
    dir: PathBuf,

    /// End of the file names to match, e.g. rain.tif
    #[arg(short, long, default_value = "rain.tif")]
    suffix: String,

    /// Output list file, one raster path per line.
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let files = find_rasters(&args.dir, &args.suffix)
        .with_context(|| format!("searching {}", args.dir.display()))?;
    write_raster_list(&args.output, &files)
        .with_context(|| format!("writing {}", args.output.display()))?;

    eprintln!(
        "[list_rasters] {} rasters -> {}",
        files.len(),
        args.output.display()
    );
    Ok(())
}
