use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use opencv::{core::Vector, imgcodecs};
use serde::{Deserialize, Serialize};

use soccer_vision::{
    camera::{Camera, OpenCvCamera},
    config::{CameraConfig, VisionConfig},
};

const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Parser)]
#[command(about = "Save frames from the overhead camera for offline color tuning")]
struct Args {
    /// Directory the frames and metadata.json are written to
    out_dir: PathBuf,

    /// Prefix of every saved file name
    #[arg(short, long, default_value = "field")]
    label: String,

    /// Number of frames to save
    #[arg(short = 'n', long, default_value_t = 10)]
    count: usize,

    /// Milliseconds between saved frames
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[derive(Default, Serialize, Deserialize)]
struct Metadata {
    images: Vec<ImageMetadata>,
}

#[derive(Serialize, Deserialize)]
struct ImageMetadata {
    index: usize,
    label: String,
    file: String,
    camera: CameraConfig,
    captured_at_ms: u128,
}

/// Existing index of `path`, empty when there is none yet. A corrupt index is an
/// error so the run does not overwrite it.
fn read_metadata(path: &Path) -> Result<Metadata> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Metadata::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()))
        }
    };

    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = VisionConfig::load_or_default(&args.config)?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let metadata_path = args.out_dir.join(METADATA_FILE);
    let mut metadata = read_metadata(&metadata_path)?;

    let mut camera = OpenCvCamera::new(&config.camera)?;

    // Let exposure settle before the first frame.
    thread::sleep(Duration::from_millis(1000));

    let mut saved = 0;
    while saved < args.count {
        let frame = match camera.grab_frame()? {
            Some(frame) => frame,
            None => {
                warn!("Camera returned no frame, retrying");
                thread::sleep(Duration::from_millis(args.interval_ms));
                continue;
            }
        };

        let index = metadata.images.len();
        let file = format!("{}_{}.png", args.label, index);
        let path = args.out_dir.join(&file);

        let written = imgcodecs::imwrite(&path.to_string_lossy(), &frame.mat, &Vector::new())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !written {
            anyhow::bail!("OpenCV refused to write {}", path.display());
        }

        info!("Saved {}", path.display());

        metadata.images.push(ImageMetadata {
            index,
            label: args.label.clone(),
            file,
            camera: config.camera.clone(),
            captured_at_ms: frame
                .timestamp
                .duration_since(SystemTime::UNIX_EPOCH)?
                .as_millis(),
        });
        saved += 1;

        thread::sleep(Duration::from_millis(args.interval_ms));
    }

    let metadata_file = fs::File::create(&metadata_path)
        .with_context(|| format!("Failed to create {}", metadata_path.display()))?;
    serde_json::to_writer_pretty(metadata_file, &metadata)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sample_images_{}_{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_metadata_starts_empty() {
        let dir = scratch_dir("missing");
        let path = dir.join(METADATA_FILE);
        let _ = fs::remove_file(&path);

        assert!(read_metadata(&path).unwrap().images.is_empty());
    }

    #[test]
    fn test_existing_metadata_is_kept() {
        let dir = scratch_dir("existing");
        let path = dir.join(METADATA_FILE);
        let metadata = Metadata {
            images: vec![ImageMetadata {
                index: 0,
                label: "field".to_string(),
                file: "field_0.png".to_string(),
                camera: CameraConfig::default(),
                captured_at_ms: 1,
            }],
        };
        fs::write(&path, serde_json::to_string(&metadata).unwrap()).unwrap();

        let read = read_metadata(&path).unwrap();
        assert_eq!(read.images.len(), 1);
        assert_eq!(read.images[0].file, "field_0.png");
    }

    #[test]
    fn test_corrupt_metadata_is_an_error() {
        let dir = scratch_dir("corrupt");
        let path = dir.join(METADATA_FILE);
        fs::write(&path, "{ \"images\": [").unwrap();

        let err = read_metadata(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ \"images\": [");
    }

    #[test]
    fn test_unreadable_metadata_is_an_error() {
        // A directory where the file should be is not the same as no file.
        let dir = scratch_dir("unreadable");
        let path = dir.join(METADATA_FILE);
        let _ = fs::remove_file(&path);
        fs::create_dir_all(&path).unwrap();

        assert!(read_metadata(&path).is_err());
    }
}
