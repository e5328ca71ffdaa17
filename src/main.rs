use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use photo_kmz::{PhotoKmz, SideFolders};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SideFolderLayout {
    /// files_geo, files_nongeo and files_nonimg next to the archive.
    PerBucket,
    /// A single no_gps folder.
    NoGps,
    None,
}

impl From<SideFolderLayout> for SideFolders {
    fn from(layout: SideFolderLayout) -> Self {
        match layout {
            SideFolderLayout::PerBucket => SideFolders::PerBucket,
            SideFolderLayout::NoGps => SideFolders::NoGps,
            SideFolderLayout::None => SideFolders::None,
        }
    }
}

#[derive(Parser)]
#[command(name = "photo_kmz", version, about = "Turn a folder of geotagged photos into a KMZ package")]
struct Args {
    /// Directory scanned recursively for photos
    image_dir: PathBuf,

    /// Path of the KMZ archive to write
    #[arg(default_value = "images.kmz")]
    output: PathBuf,

    /// Add a fly-through tour visiting every placemark in capture order
    #[arg(long)]
    tour: bool,

    /// Review folders written next to the archive
    #[arg(long, value_enum, default_value_t = SideFolderLayout::PerBucket)]
    side_folders: SideFolderLayout,

    /// exiftool executable, searched for in PATH when not given
    #[arg(long = "exiftool", env = "EXIFTOOL_PATH")]
    exiftool_path: Option<PathBuf>,

    /// Seconds spent flying to each tour waypoint
    #[arg(long, default_value_t = 3.0, value_parser = non_negative)]
    fly_duration: f64,

    /// Camera distance from each tour waypoint, in meters
    #[arg(long, default_value_t = 500.0, value_parser = non_negative)]
    range: f64,
}

fn non_negative(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("expected a finite, non-negative number, got {s}"))
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut pipeline = PhotoKmz::builder()
        .maybe_exiftool_path(args.exiftool_path)
        .tour(args.tour)
        .side_folders(args.side_folders.into())
        .fly_duration_secs(args.fly_duration)
        .look_at_range_m(args.range)
        .build()?;

    let summary = pipeline
        .run(&args.image_dir, &args.output)
        .wrap_err_with(|| format!("Could not package {}", args.image_dir.display()))?;

    info!(
        "{} files: {} placemarks, {} without GPS, {} non-image",
        summary.total(),
        summary.geotagged,
        summary.non_geo,
        summary.non_image
    );
    for folder in &summary.side_folders {
        info!("Review folder: {}", folder.display());
    }

    Ok(())
}
