use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use opencv::{core::Vector, imgcodecs, prelude::*};
use serde::Serialize;

use soccer_vision::{
    camera::StillImageCamera, config::VisionConfig, objects::FrameDetections, overlay,
    pipeline::VisionPipeline,
};

#[derive(Debug, Parser)]
#[command(about = "Run ball and robot detection over saved frames")]
struct Args {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// If given, annotated copies of the images are written here
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Images to run the detection on
    #[arg(required = true)]
    image_paths: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ImageDetections<'a> {
    image: &'a str,
    #[serde(flatten)]
    detections: &'a FrameDetections,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = VisionConfig::load_or_default(&args.config)?;

    if let Some(out_dir) = &args.out_dir {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    }

    let camera = StillImageCamera::from_paths(&args.image_paths[..])?;
    let mut pipeline = VisionPipeline::from_config(camera, &config)?;

    for path in &args.image_paths {
        let report = pipeline
            .run(None)?
            .with_context(|| format!("No frame for {}", path.display()))?;

        let image = path.to_string_lossy();
        println!(
            "{}",
            serde_json::to_string(&ImageDetections {
                image: &image,
                detections: &report.detections,
            })?
        );

        if let Some(out_dir) = &args.out_dir {
            let mut annotated = report.frame.mat.try_clone()?;
            overlay::draw_detections(&mut annotated, &report.detections)?;

            let file_name = path
                .file_name()
                .with_context(|| format!("{} has no file name", path.display()))?;
            let out_path = out_dir.join(file_name);

            imgcodecs::imwrite(&out_path.to_string_lossy(), &annotated, &Vector::new())
                .with_context(|| format!("Failed to write {}", out_path.display()))?;
            info!("Wrote {}", out_path.display());
        }
    }

    Ok(())
}
