use anyhow::{Context, Result};
use log::{debug, warn};
use opencv::core::Mat;

use crate::{
    camera::{Camera as CameraTrait, Frame},
    config::{HsvRange, Targets, VisionConfig},
    error::CameraError,
    extraction::{BlobSearch, ColorBlobExtractor, ColorMask},
    objects::{Ball, FrameDetections, Robot},
};

/// One processed frame along with the images the display windows need.
pub struct FrameReport {
    pub frame: Frame,
    pub hsv: Mat,
    pub detections: FrameDetections,
    pub ball_mask: ColorMask,
}

pub struct VisionPipeline<Camera: CameraTrait> {
    camera: Camera,
    extractor: ColorBlobExtractor,
    targets: Targets,
    missed_frames: u32,
    max_missed_frames: u32,
}

impl<Camera: CameraTrait> VisionPipeline<Camera> {
    pub fn new(camera: Camera, extractor: ColorBlobExtractor, targets: Targets) -> Self {
        VisionPipeline {
            camera,
            extractor,
            targets,
            missed_frames: 0,
            max_missed_frames: u32::MAX,
        }
    }

    pub fn from_config(camera: Camera, config: &VisionConfig) -> Result<Self> {
        let extractor = ColorBlobExtractor::new(config.detection.clone())?;

        let mut pipeline = Self::new(camera, extractor, config.targets());
        pipeline.max_missed_frames = config.camera.max_missed_frames;

        Ok(pipeline)
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Grabs and processes the next frame. With a calibration range the
    /// configured targets are ignored and the range is tracked as the ball.
    ///
    /// Returns `Ok(None)` when the camera skipped a frame.
    pub fn run(&mut self, calibration: Option<HsvRange>) -> Result<Option<FrameReport>> {
        let frame = match self.grab()? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let report = match calibration {
            Some(range) => self.process(frame, &Targets::calibration(range))?,
            None => self.process(frame, &self.targets)?,
        };

        Ok(Some(report))
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        match self.camera.grab_frame()? {
            Some(frame) => {
                self.missed_frames = 0;
                Ok(Some(frame))
            }
            None => {
                self.missed_frames += 1;
                if self.missed_frames >= self.max_missed_frames {
                    return Err(CameraError::Starved(self.missed_frames).into());
                }

                warn!("Camera returned no frame ({} in a row)", self.missed_frames);
                Ok(None)
            }
        }
    }

    pub fn process(&self, frame: Frame, targets: &Targets) -> Result<FrameReport> {
        let hsv = self.extractor.to_hsv(&frame.mat)?;
        let mut detections = FrameDetections::new(frame.size()?);

        let ball_mask = self
            .extractor
            .locate(&hsv, &targets.ball)
            .context("Ball search failed")?;

        match &ball_mask.search {
            BlobSearch::Found(blob) => {
                detections.ball = Some(Ball {
                    position: blob.centroid,
                    color: targets.ball,
                });
            }
            BlobSearch::TooNoisy { contours } => {
                debug!("Ball mask has {} contours", contours);
                detections.noisy.push("ball".to_string());
            }
            BlobSearch::NotFound => {}
        }

        for target in &targets.robots {
            let mask = self
                .extractor
                .locate(&hsv, &target.color)
                .with_context(|| format!("Search for robot {} failed", target.name))?;

            match mask.search {
                BlobSearch::Found(blob) => detections.robots.push(Robot {
                    name: target.name.clone(),
                    team: target.team,
                    position: blob.centroid,
                    angle: None,
                }),
                BlobSearch::TooNoisy { contours } => {
                    debug!("Robot {} mask has {} contours", target.name, contours);
                    detections.noisy.push(target.name.clone());
                }
                BlobSearch::NotFound => {}
            }
        }

        debug!("{:?}", detections);

        Ok(FrameReport {
            frame,
            hsv,
            detections,
            ball_mask,
        })
    }
}
