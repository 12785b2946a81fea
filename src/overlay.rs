//! Annotations drawn on top of the camera frame.

use anyhow::Result;
use nalgebra::Point2;
use opencv::{
    core::{Mat, Point, Scalar},
    imgproc::{self, FONT_HERSHEY_PLAIN, LINE_8},
};

use crate::objects::{Ball, FrameDetections, Robot};

pub const NOISE_WARNING: &str = "TOO MUCH NOISE! ADJUST FILTER";

const MARKER_RADIUS: i32 = 10;

fn red() -> Scalar {
    Scalar::new(0., 0., 255., 0.)
}

fn green() -> Scalar {
    Scalar::new(0., 255., 0., 0.)
}

/// Pixel the marker is drawn on. Positions are truncated, not rounded.
pub fn pixel(position: &Point2<f64>) -> Point {
    Point::new(position.x as i32, position.y as i32)
}

fn label(frame: &mut Mat, text: &str, origin: Point) -> Result<()> {
    imgproc::put_text(
        frame,
        text,
        origin,
        FONT_HERSHEY_PLAIN,
        1.,
        green(),
        1,
        LINE_8,
        false,
    )?;

    Ok(())
}

/// Circle plus `(x,y)` caption at a detected centroid.
fn marker(frame: &mut Mat, at: Point) -> Result<()> {
    imgproc::circle(frame, at, MARKER_RADIUS, red(), 1, LINE_8, 0)?;
    label(
        frame,
        &format!("({},{})", at.x, at.y),
        Point::new(at.x, at.y + 20),
    )
}

pub fn draw_ball(frame: &mut Mat, ball: &Ball) -> Result<()> {
    let at = pixel(&ball.position);

    marker(frame, at)?;
    label(frame, "Ball", Point::new(at.x + 25, at.y + 35))
}

pub fn draw_robot(frame: &mut Mat, robot: &Robot) -> Result<()> {
    let at = pixel(&robot.position);
    let angle = match robot.angle {
        Some(angle) => format!("angle: {:.0}", angle),
        None => "angle: n/a".to_string(),
    };

    marker(frame, at)?;
    label(frame, "Robot", Point::new(at.x + 20, at.y + 35))?;
    label(
        frame,
        &format!("Team {}", robot.team),
        Point::new(at.x + 20, at.y + 60),
    )?;
    label(frame, &angle, Point::new(at.x + 20, at.y + 75))
}

pub fn draw_all_robots(frame: &mut Mat, robots: &[Robot]) -> Result<()> {
    for robot in robots {
        draw_robot(frame, robot)?;
    }

    Ok(())
}

pub fn draw_noise_warning(frame: &mut Mat) -> Result<()> {
    imgproc::put_text(
        frame,
        NOISE_WARNING,
        Point::new(0, 50),
        FONT_HERSHEY_PLAIN,
        2.,
        red(),
        2,
        LINE_8,
        false,
    )?;

    Ok(())
}

pub fn draw_detections(frame: &mut Mat, detections: &FrameDetections) -> Result<()> {
    if let Some(ball) = &detections.ball {
        draw_ball(frame, ball)?;
    }

    draw_all_robots(frame, &detections.robots)?;

    if detections.is_noisy() {
        draw_noise_warning(frame)?;
    }

    Ok(())
}
