use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{object}: {channel} bound {value} is outside 0..={max}")]
    BoundOutOfRange {
        object: String,
        channel: &'static str,
        value: i32,
        max: i32,
    },

    #[error("{object}: {channel} minimum {min} is greater than maximum {max}")]
    InvertedRange {
        object: String,
        channel: &'static str,
        min: i32,
        max: i32,
    },

    #[error("at most {max} robots can be tracked, {found} configured")]
    TooManyRobots { max: usize, found: usize },

    #[error("robot name {0:?} is used more than once")]
    DuplicateRobot(String),

    #[error("object area bounds are empty: min {min} >= max {max}")]
    EmptyAreaBounds { min: f64, max: f64 },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("could not open camera at index {0}")]
    Open(i32),

    #[error("no frame received for {0} consecutive reads")]
    Starved(u32),

    #[error("still image camera has no frames")]
    NoStillFrames,
}
