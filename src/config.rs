//! Runtime configuration, read from `config.json`.
//!
//! Every section falls back to its defaults when omitted, so an empty object
//! `{}` is a valid configuration that tracks the whole HSV range as the ball.

use std::{collections::HashSet, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::{info, warn};
use opencv::core::{Scalar, Size};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, objects::Team};

/// Upper end of every HSV slider and configured bound.
pub const HSV_LIMIT: i32 = 256;

/// Most robots the field carries at once.
pub const MAX_ROBOTS: usize = 4;

pub const DEFAULT_FRAME_WIDTH: i32 = 640;
pub const DEFAULT_FRAME_HEIGHT: i32 = 480;

/// Inclusive HSV threshold window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HsvRange {
    pub h_min: i32,
    pub h_max: i32,
    pub s_min: i32,
    pub s_max: i32,
    pub v_min: i32,
    pub v_max: i32,
}

impl Default for HsvRange {
    fn default() -> Self {
        HsvRange {
            h_min: 0,
            h_max: HSV_LIMIT,
            s_min: 0,
            s_max: HSV_LIMIT,
            v_min: 0,
            v_max: HSV_LIMIT,
        }
    }
}

impl HsvRange {
    /// Lower and upper bounds as accepted by `core::in_range`.
    pub fn bounds(&self) -> (Scalar, Scalar) {
        (
            Scalar::new(self.h_min as f64, self.s_min as f64, self.v_min as f64, 0.),
            Scalar::new(self.h_max as f64, self.s_max as f64, self.v_max as f64, 0.),
        )
    }

    pub fn contains(&self, h: i32, s: i32, v: i32) -> bool {
        (self.h_min..=self.h_max).contains(&h)
            && (self.s_min..=self.s_max).contains(&s)
            && (self.v_min..=self.v_max).contains(&v)
    }

    fn channels(&self) -> [(&'static str, i32, i32); 3] {
        [
            ("hue", self.h_min, self.h_max),
            ("saturation", self.s_min, self.s_max),
            ("value", self.v_min, self.v_max),
        ]
    }

    pub fn validate(&self, object: &str) -> Result<(), ConfigError> {
        for (channel, min, max) in self.channels() {
            for value in [min, max] {
                if !(0..=HSV_LIMIT).contains(&value) {
                    return Err(ConfigError::BoundOutOfRange {
                        object: object.to_string(),
                        channel,
                        value,
                        max: HSV_LIMIT,
                    });
                }
            }

            if min > max {
                return Err(ConfigError::InvertedRange {
                    object: object.to_string(),
                    channel,
                    min,
                    max,
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub index: i32,
    pub frame_width: i32,
    pub frame_height: i32,
    /// Consecutive empty reads tolerated before giving up on the device.
    pub max_missed_frames: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            index: 0,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            max_missed_frames: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// Blobs at or below this many square pixels are noise.
    pub min_object_area: f64,
    /// Blobs at or above this many square pixels mean the filter is too loose.
    /// Unset, it follows the size of the searched frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_object_area: Option<f64>,
    /// A mask with this many contours or more is reported as noisy.
    pub max_num_objects: usize,
    pub erode_kernel: i32,
    pub dilate_kernel: i32,
    pub erode_iterations: i32,
    pub dilate_iterations: i32,
}

impl DetectionConfig {
    /// Upper area bound for a mask of `size`: two thirds of it unless configured.
    pub fn max_area_for(&self, size: Size) -> f64 {
        self.max_object_area
            .unwrap_or((size.width as f64) * (size.height as f64) / 1.5)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            min_object_area: (40 * 40) as f64,
            max_object_area: None,
            max_num_objects: 50,
            erode_kernel: 3,
            dilate_kernel: 8,
            erode_iterations: 2,
            dilate_iterations: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Delay between frames, also the time given to the GUI to repaint.
    pub frame_delay_ms: u64,
    pub show_hsv: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            frame_delay_ms: 30,
            show_hsv: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobotTarget {
    pub name: String,
    pub team: Team,
    pub color: HsvRange,
}

/// The colors the loop looks for on every frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Targets {
    pub ball: HsvRange,
    pub robots: Vec<RobotTarget>,
}

impl Targets {
    /// Slider-driven targets: the ball is whatever the sliders select.
    pub fn calibration(range: HsvRange) -> Self {
        Targets {
            ball: range,
            robots: Vec::new(),
        }
    }
}

/// Unknown keys are rejected at every level, so a misspelled section does not
/// quietly fall back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisionConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub display: DisplayConfig,
    pub ball: HsvRange,
    pub robots: Vec<RobotTarget>,
}

impl VisionConfig {
    pub fn targets(&self) -> Targets {
        Targets {
            ball: self.ball,
            robots: self.robots.clone(),
        }
    }

    pub fn frame_size(&self) -> Size {
        Size::new(self.camera.frame_width, self.camera.frame_height)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;

        let config: VisionConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::load(path)
        } else {
            warn!("{} not found, using the default configuration", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.frame_width <= 0 {
            return Err(ConfigError::NotPositive("camera.frame_width"));
        }
        if self.camera.frame_height <= 0 {
            return Err(ConfigError::NotPositive("camera.frame_height"));
        }
        if self.camera.max_missed_frames == 0 {
            return Err(ConfigError::NotPositive("camera.max_missed_frames"));
        }

        let detection = &self.detection;
        for (name, value) in [
            ("detection.erode_kernel", detection.erode_kernel),
            ("detection.dilate_kernel", detection.dilate_kernel),
            ("detection.erode_iterations", detection.erode_iterations),
            ("detection.dilate_iterations", detection.dilate_iterations),
        ] {
            if value <= 0 {
                return Err(ConfigError::NotPositive(name));
            }
        }
        if detection.max_num_objects == 0 {
            return Err(ConfigError::NotPositive("detection.max_num_objects"));
        }
        let max_object_area = detection.max_area_for(self.frame_size());
        if detection.min_object_area >= max_object_area {
            return Err(ConfigError::EmptyAreaBounds {
                min: detection.min_object_area,
                max: max_object_area,
            });
        }

        self.ball.validate("ball")?;

        if self.robots.len() > MAX_ROBOTS {
            return Err(ConfigError::TooManyRobots {
                max: MAX_ROBOTS,
                found: self.robots.len(),
            });
        }

        let mut names = HashSet::new();
        for robot in &self.robots {
            if !names.insert(robot.name.as_str()) {
                return Err(ConfigError::DuplicateRobot(robot.name.clone()));
            }
            robot.color.validate(&robot.name)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "camera": { "index": 1 },
        "ball": { "h_min": 5, "h_max": 22, "s_min": 150, "s_max": 256, "v_min": 150, "v_max": 256 },
        "robots": [
            { "name": "home1", "team": "home",
              "color": { "h_min": 110, "h_max": 130, "s_min": 150, "s_max": 256, "v_min": 100, "v_max": 256 } },
            { "name": "away1", "team": "away",
              "color": { "h_min": 25, "h_max": 35, "s_min": 150, "s_max": 256, "v_min": 150, "v_max": 256 } }
        ]
    }"#;

    fn range(h: (i32, i32), s: (i32, i32), v: (i32, i32)) -> HsvRange {
        HsvRange {
            h_min: h.0,
            h_max: h.1,
            s_min: s.0,
            s_max: s.1,
            v_min: v.0,
            v_max: v.1,
        }
    }

    #[test]
    fn test_parse_sample() {
        let config: VisionConfig = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(config.camera.index, 1);
        assert_eq!(config.camera.frame_width, 640);
        assert_eq!(config.detection, DetectionConfig::default());
        assert_eq!(config.ball, range((5, 22), (150, 256), (150, 256)));
        assert_eq!(config.robots.len(), 2);
        assert_eq!(config.robots[1].team, Team::Away);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: VisionConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, VisionConfig::default());
        assert_eq!(config.detection.min_object_area, 1600.);
        assert_eq!(config.detection.max_object_area, None);
        assert_eq!(config.detection.max_area_for(config.frame_size()), 204800.);
        assert_eq!(config.detection.max_num_objects, 50);
        assert_eq!(config.display.frame_delay_ms, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let r = range((5, 22), (150, 256), (150, 256));

        assert!(r.contains(5, 150, 150));
        assert!(r.contains(22, 255, 255));
        assert!(!r.contains(23, 200, 200));
        assert!(!r.contains(10, 149, 200));
    }

    #[test]
    fn test_bounds_order_channels() {
        let (lower, upper) = range((1, 2), (3, 4), (5, 6)).bounds();

        assert_eq!(lower.0, [1., 3., 5., 0.]);
        assert_eq!(upper.0, [2., 4., 6., 0.]);
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut config = VisionConfig::default();
        config.ball = range((30, 10), (0, 256), (0, 256));

        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                object: "ball".to_string(),
                channel: "hue",
                min: 30,
                max: 10,
            })
        );
    }

    #[test]
    fn test_rejects_out_of_range_bound() {
        let mut config = VisionConfig::default();
        config.ball = range((0, 256), (0, 300), (0, 256));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::BoundOutOfRange { channel: "saturation", value: 300, .. })
        ));
    }

    #[test]
    fn test_rejects_fifth_robot() {
        let mut config = VisionConfig::default();
        config.robots = (0..5)
            .map(|i| RobotTarget {
                name: format!("robot{}", i),
                team: Team::Home,
                color: HsvRange::default(),
            })
            .collect();

        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyRobots { max: 4, found: 5 })
        );
    }

    #[test]
    fn test_rejects_duplicate_robot_names() {
        let mut config = VisionConfig::default();
        let robot = RobotTarget {
            name: "home1".to_string(),
            team: Team::Home,
            color: HsvRange::default(),
        };
        config.robots = vec![robot.clone(), robot];

        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateRobot("home1".to_string()))
        );
    }

    #[test]
    fn test_rejects_empty_area_bounds() {
        let mut config = VisionConfig::default();
        config.detection.min_object_area = 5000.;
        config.detection.max_object_area = Some(4000.);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyAreaBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_missed_frames() {
        let mut config = VisionConfig::default();
        config.camera.max_missed_frames = 0;

        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("camera.max_missed_frames"))
        );
    }

    #[test]
    fn test_area_bound_follows_frame_size() {
        let mut config = VisionConfig::default();
        config.camera.frame_width = 1280;
        config.camera.frame_height = 720;

        assert_eq!(config.detection.max_area_for(config.frame_size()), 614400.);

        // A minimum that only fits the larger frame.
        config.detection.min_object_area = 300_000.;
        assert!(config.validate().is_ok());
        config.camera.frame_width = 640;
        config.camera.frame_height = 480;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyAreaBounds { .. })
        ));
    }

    #[test]
    fn test_configured_area_bound_wins() {
        let detection = DetectionConfig {
            max_object_area: Some(5000.),
            ..DetectionConfig::default()
        };

        assert_eq!(detection.max_area_for(Size::new(1280, 720)), 5000.);
    }

    #[test]
    fn test_rejects_misspelled_keys() {
        for json in [
            r#"{ "detecton": { "min_object_area": 10.0 } }"#,
            r#"{ "robot": [] }"#,
            r#"{ "camera": { "idx": 1 } }"#,
            r#"{ "ball": { "h_min": 0, "h_max": 10, "s_min": 0, "s_max": 10, "v_min": 0, "v_max": 10, "hue": 3 } }"#,
        ] {
            assert!(
                serde_json::from_str::<VisionConfig>(json).is_err(),
                "accepted {}",
                json
            );
        }
    }

    #[test]
    fn test_targets_mirror_config() {
        let config: VisionConfig = serde_json::from_str(SAMPLE).unwrap();
        let targets = config.targets();

        assert_eq!(targets.ball, config.ball);
        assert_eq!(targets.robots, config.robots);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = format!("{}/config.json", env!("CARGO_MANIFEST_DIR"));
        let config = VisionConfig::load(&path).unwrap();

        assert_eq!(config.robots.len(), MAX_ROBOTS);
        assert_eq!(
            config
                .robots
                .iter()
                .filter(|robot| robot.team == Team::Home)
                .count(),
            2
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = VisionConfig::load_or_default("does/not/exist.json").unwrap();

        assert_eq!(config, VisionConfig::default());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = VisionConfig::load("does/not/exist.json").unwrap_err();

        assert!(format!("{:#}", err).contains("does/not/exist.json"));
    }
}
