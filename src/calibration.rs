//! Slider window for tuning an HSV range against the live feed.

use anyhow::{Context, Result};
use opencv::highgui;

use crate::config::{HsvRange, HSV_LIMIT};

pub const TRACKBAR_WINDOW: &str = "Trackbars";

const SLIDER_NAMES: [&str; 6] = ["H_MIN", "H_MAX", "S_MIN", "S_MAX", "V_MIN", "V_MAX"];

/// Slider positions in the order the sliders appear in the window.
pub fn slider_values(range: &HsvRange) -> [i32; 6] {
    [
        range.h_min,
        range.h_max,
        range.s_min,
        range.s_max,
        range.v_min,
        range.v_max,
    ]
}

pub fn range_from_sliders(values: [i32; 6]) -> HsvRange {
    let [h_min, h_max, s_min, s_max, v_min, v_max] = values;

    HsvRange {
        h_min,
        h_max,
        s_min,
        s_max,
        v_min,
        v_max,
    }
}

pub struct Trackbars {
    window: String,
}

impl Trackbars {
    /// Opens the slider window with every slider spanning `0..=HSV_LIMIT`.
    pub fn create(window: &str, initial: &HsvRange) -> Result<Self> {
        highgui::named_window(window, highgui::WINDOW_NORMAL)
            .context("Failed to create trackbar window")?;

        for (name, value) in SLIDER_NAMES.iter().zip(slider_values(initial)) {
            highgui::create_trackbar(name, window, None, HSV_LIMIT, None)
                .with_context(|| format!("Failed to create trackbar {}", name))?;
            highgui::set_trackbar_pos(name, window, value)?;
        }

        Ok(Trackbars {
            window: window.to_string(),
        })
    }

    pub fn range(&self) -> Result<HsvRange> {
        let mut values = [0; 6];
        for (value, name) in values.iter_mut().zip(SLIDER_NAMES) {
            *value = highgui::get_trackbar_pos(name, &self.window)?;
        }

        Ok(range_from_sliders(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slider_order_matches_names() {
        let range = HsvRange {
            h_min: 1,
            h_max: 2,
            s_min: 3,
            s_max: 4,
            v_min: 5,
            v_max: 6,
        };

        assert_eq!(slider_values(&range), [1, 2, 3, 4, 5, 6]);
        assert_eq!(range_from_sliders(slider_values(&range)), range);
    }

    #[test]
    fn test_initial_sliders_span_everything() {
        assert_eq!(
            slider_values(&HsvRange::default()),
            [0, HSV_LIMIT, 0, HSV_LIMIT, 0, HSV_LIMIT]
        );
    }
}
