pub mod calibration;
pub mod camera;
pub mod config;
pub mod display;
pub mod error;
pub mod extraction;
pub mod objects;
pub mod overlay;
pub mod pipeline;
