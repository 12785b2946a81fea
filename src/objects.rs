use std::fmt;

use nalgebra::Point2;
use opencv::core::Size;
use serde::{Deserialize, Serialize};

use crate::config::HsvRange;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Home,
    Away,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Home => write!(f, "home"),
            Team::Away => write!(f, "away"),
        }
    }
}

/// The ball as seen in a single frame.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Ball {
    /// Centroid in pixels, origin at the top-left corner.
    pub position: Point2<f64>,
    /// Threshold window the ball was found with.
    pub color: HsvRange,
}

/// A robot as seen in a single frame.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Robot {
    pub name: String,
    pub team: Team,
    pub position: Point2<f64>,
    /// Heading in degrees. Nothing in the color pipeline measures it yet.
    pub angle: Option<f64>,
}

/// Everything found in one frame. Nothing carries over to the next one.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FrameDetections {
    pub ball: Option<Ball>,
    pub robots: Vec<Robot>,
    /// Names of the targets whose masks had too many contours to trust.
    pub noisy: Vec<String>,
    pub frame_width: i32,
    pub frame_height: i32,
}

impl FrameDetections {
    pub fn new(frame_size: Size) -> Self {
        FrameDetections {
            frame_width: frame_size.width,
            frame_height: frame_size.height,
            ..Default::default()
        }
    }

    pub fn is_noisy(&self) -> bool {
        !self.noisy.is_empty()
    }

    /// Every reported position lies inside the frame.
    pub fn within_bounds(&self) -> bool {
        let inside = |p: &Point2<f64>| {
            (0.0..self.frame_width as f64).contains(&p.x)
                && (0.0..self.frame_height as f64).contains(&p.y)
        };

        self.ball.iter().all(|ball| inside(&ball.position))
            && self.robots.iter().all(|robot| inside(&robot.position))
    }
}
