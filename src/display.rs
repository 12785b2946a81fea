use anyhow::{Context, Result};
use opencv::{core::Mat, highgui};

use crate::pipeline::FrameReport;

pub const ORIGINAL_WINDOW: &str = "Original Image";
pub const HSV_WINDOW: &str = "HSV Image";
pub const THRESHOLD_WINDOW: &str = "Thresholded Image";
pub const MORPHOLOGY_WINDOW: &str = "After Morphological Operations";

const KEY_ESCAPE: i32 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
    PrintRange,
}

impl KeyAction {
    pub fn from_key(key: i32) -> Self {
        if key < 0 {
            return KeyAction::Continue;
        }

        match key & 0xff {
            KEY_ESCAPE => KeyAction::Quit,
            k if k == b'q' as i32 || k == b'Q' as i32 => KeyAction::Quit,
            k if k == b'p' as i32 || k == b'P' as i32 => KeyAction::PrintRange,
            _ => KeyAction::Continue,
        }
    }
}

pub struct Display {
    show_hsv: bool,
    show_masks: bool,
}

impl Display {
    pub fn open(show_hsv: bool, show_masks: bool) -> Result<Self> {
        let mut windows = vec![ORIGINAL_WINDOW];
        if show_hsv {
            windows.push(HSV_WINDOW);
        }
        if show_masks {
            windows.push(THRESHOLD_WINDOW);
            windows.push(MORPHOLOGY_WINDOW);
        }

        for window in windows {
            highgui::named_window(window, highgui::WINDOW_AUTOSIZE)
                .with_context(|| format!("Failed to create window {}", window))?;
        }

        Ok(Display {
            show_hsv,
            show_masks,
        })
    }

    pub fn show(&self, report: &FrameReport, annotated: &Mat) -> Result<()> {
        highgui::imshow(ORIGINAL_WINDOW, annotated)?;

        if self.show_hsv {
            highgui::imshow(HSV_WINDOW, &report.hsv)?;
        }

        if self.show_masks {
            highgui::imshow(THRESHOLD_WINDOW, &report.ball_mask.thresholded)?;
            highgui::imshow(MORPHOLOGY_WINDOW, &report.ball_mask.cleaned)?;
        }

        Ok(())
    }

    /// Gives the windows `delay_ms` to repaint; nothing shows up without it.
    pub fn wait(&self, delay_ms: u64) -> Result<KeyAction> {
        let key = highgui::wait_key(delay_ms.clamp(1, i32::MAX as u64) as i32)?;

        Ok(KeyAction::from_key(key))
    }
}
