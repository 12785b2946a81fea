use std::{path::PathBuf, thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{debug, info, warn};
use opencv::prelude::*;

use soccer_vision::{
    calibration::{Trackbars, TRACKBAR_WINDOW},
    camera::OpenCvCamera,
    config::{HsvRange, VisionConfig},
    display::{Display, KeyAction},
    overlay,
    pipeline::VisionPipeline,
};

#[derive(Debug, Parser)]
#[command(about = "Locate the ball and robots on the field from the overhead camera")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Camera index, overriding the one in the configuration
    #[arg(long)]
    camera: Option<i32>,

    /// Track whatever the HSV sliders select instead of the configured colors
    #[arg(long, conflicts_with = "headless")]
    calibrate: bool,

    /// Run without windows and log every frame's detections
    #[arg(long)]
    headless: bool,

    /// Also show the frame converted to HSV
    #[arg(long)]
    show_hsv: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = VisionConfig::load_or_default(&args.config)?;
    if let Some(index) = args.camera {
        config.camera.index = index;
    }

    let camera = OpenCvCamera::new(&config.camera)?;
    let mut pipeline = VisionPipeline::from_config(camera, &config)?;

    let trackbars = if args.calibrate {
        Some(Trackbars::create(TRACKBAR_WINDOW, &HsvRange::default())?)
    } else {
        None
    };

    let display = if args.headless {
        None
    } else {
        Some(Display::open(
            args.show_hsv || config.display.show_hsv,
            args.calibrate,
        )?)
    };

    let frame_delay = Duration::from_millis(config.display.frame_delay_ms);
    let mut was_noisy = false;

    info!(
        "Tracking {} with {} robot(s)",
        if args.calibrate { "slider range" } else { "configured colors" },
        pipeline.targets().robots.len()
    );

    loop {
        let calibration = trackbars.as_ref().map(Trackbars::range).transpose()?;

        if let Some(report) = pipeline.run(calibration)? {
            let detections = &report.detections;

            if detections.is_noisy() != was_noisy {
                was_noisy = detections.is_noisy();
                if was_noisy {
                    warn!("Too much noise in {}, adjust the filter", detections.noisy.join(", "));
                } else {
                    info!("Noise cleared");
                }
            }

            match &display {
                Some(display) => {
                    let mut annotated = report.frame.mat.try_clone()?;
                    overlay::draw_detections(&mut annotated, detections)?;
                    display.show(&report, &annotated)?;
                }
                None => info!("{}", serde_json::to_string(detections)?),
            }
        }

        match &display {
            Some(display) => match display.wait(config.display.frame_delay_ms)? {
                KeyAction::Quit => break,
                KeyAction::PrintRange => match &calibration {
                    Some(range) => info!("Current range: {}", serde_json::to_string(range)?),
                    None => debug!("Not calibrating, no range to print"),
                },
                KeyAction::Continue => {}
            },
            None => thread::sleep(frame_delay),
        }
    }

    info!("Stopped");

    Ok(())
}
