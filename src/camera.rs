use std::{path::Path, time::SystemTime};

use anyhow::{Context, Result};
use log::info;
use opencv::{
    core::{Mat, Size},
    imgcodecs::{self, IMREAD_COLOR},
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::{config::CameraConfig, error::CameraError};

/// A BGR image together with the moment it was captured.
pub struct Frame {
    pub timestamp: SystemTime,
    pub mat: Mat,
}

impl Frame {
    pub fn new(mat: Mat) -> Self {
        Frame {
            timestamp: SystemTime::now(),
            mat,
        }
    }

    pub fn size(&self) -> Result<Size> {
        Ok(self.mat.size()?)
    }
}

pub trait Camera {
    /// Returns `Ok(None)` when the device had no frame ready for this read.
    fn grab_frame(&mut self) -> Result<Option<Frame>>;
}

pub struct OpenCvCamera {
    capture: VideoCapture,
}

impl OpenCvCamera {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let mut capture = VideoCapture::new(config.index, videoio::CAP_ANY)
            .with_context(|| format!("Failed to create capture for camera {}", config.index))?;

        if !capture.is_opened()? {
            return Err(CameraError::Open(config.index).into());
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.frame_width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.frame_height as f64)?;

        info!(
            "Opened camera {} at {}x{}",
            config.index,
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)?,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?,
        );

        Ok(OpenCvCamera { capture })
    }
}

impl Camera for OpenCvCamera {
    fn grab_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        let grabbed = self
            .capture
            .read(&mut mat)
            .context("Failed to read frame from camera")?;

        if !grabbed || mat.empty() {
            return Ok(None);
        }

        Ok(Some(Frame::new(mat)))
    }
}

/// Replays a fixed set of images, looping back to the first one.
pub struct StillImageCamera {
    frames: Vec<Mat>,
    next: usize,
}

impl StillImageCamera {
    pub fn new(frames: Vec<Mat>) -> Result<Self> {
        if frames.is_empty() {
            return Err(CameraError::NoStillFrames.into());
        }

        Ok(StillImageCamera { frames, next: 0 })
    }

    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let frames = paths
            .iter()
            .map(|path| read_image(path.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Self::new(frames)
    }
}

impl Camera for StillImageCamera {
    fn grab_frame(&mut self) -> Result<Option<Frame>> {
        let mat = self.frames[self.next].try_clone()?;
        self.next = (self.next + 1) % self.frames.len();

        Ok(Some(Frame::new(mat)))
    }
}

pub fn read_image(path: &Path) -> Result<Mat> {
    let path_str = path.to_string_lossy();
    let mat = imgcodecs::imread(&path_str, IMREAD_COLOR)
        .with_context(|| format!("Failed to read image {}", path_str))?;

    if mat.empty() {
        anyhow::bail!("Image {} is empty or unreadable", path_str);
    }

    Ok(mat)
}
