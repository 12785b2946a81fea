use anyhow::{Context, Result};
use nalgebra::Point2;
use opencv::{
    core::{self, Mat, Point, Size, Vec4i, Vector},
    imgproc,
    prelude::*,
};

use crate::config::{DetectionConfig, HsvRange};

/// A connected region of thresholded pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub centroid: Point2<f64>,
    pub area: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlobSearch {
    Found(Blob),
    NotFound,
    /// The mask broke up into too many pieces to pick one.
    TooNoisy { contours: usize },
}

impl BlobSearch {
    pub fn blob(&self) -> Option<&Blob> {
        match self {
            BlobSearch::Found(blob) => Some(blob),
            _ => None,
        }
    }
}

/// Intermediate masks kept for the calibration windows.
pub struct ColorMask {
    pub thresholded: Mat,
    pub cleaned: Mat,
    pub search: BlobSearch,
}

pub struct ColorBlobExtractor {
    config: DetectionConfig,
    erode_element: Mat,
    dilate_element: Mat,
}

impl ColorBlobExtractor {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        let anchor = Point::new(-1, -1);
        let erode_element = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(config.erode_kernel, config.erode_kernel),
            anchor,
        )?;
        // Larger element so what survives erosion is clearly visible.
        let dilate_element = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(config.dilate_kernel, config.dilate_kernel),
            anchor,
        )?;

        Ok(ColorBlobExtractor {
            config,
            erode_element,
            dilate_element,
        })
    }

    pub fn to_hsv(&self, image: &Mat) -> Result<Mat> {
        let mut hsv_image = Mat::default();
        imgproc::cvt_color(image, &mut hsv_image, imgproc::COLOR_BGR2HSV, 0)
            .context("BGR to HSV conversion failed")?;

        Ok(hsv_image)
    }

    pub fn threshold(&self, hsv_image: &Mat, range: &HsvRange) -> Result<Mat> {
        let (lower, upper) = range.bounds();

        let mut thresholded_image = Mat::default();
        core::in_range(hsv_image, &lower, &upper, &mut thresholded_image)
            .context("HSV thresholding failed")?;

        Ok(thresholded_image)
    }

    /// Erodes away speckle, then dilates what is left back into solid blobs.
    pub fn clean(&self, mask: &Mat) -> Result<Mat> {
        let anchor = Point::new(-1, -1);
        let border_value = imgproc::morphology_default_border_value()?;

        let mut eroded = Mat::default();
        imgproc::erode(
            mask,
            &mut eroded,
            &self.erode_element,
            anchor,
            self.config.erode_iterations,
            core::BORDER_CONSTANT,
            border_value,
        )
        .context("Erosion failed")?;

        let mut dilated = Mat::default();
        imgproc::dilate(
            &eroded,
            &mut dilated,
            &self.dilate_element,
            anchor,
            self.config.dilate_iterations,
            core::BORDER_CONSTANT,
            border_value,
        )
        .context("Dilation failed")?;

        Ok(dilated)
    }

    pub fn find_largest_blob(&self, mask: &Mat) -> Result<BlobSearch> {
        let mut contours = Vector::<Vector<Point>>::new();
        let mut hierarchy = Vector::<Vec4i>::new();
        imgproc::find_contours_with_hierarchy(
            mask,
            &mut contours,
            &mut hierarchy,
            imgproc::RETR_CCOMP,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .context("Contour search failed")?;

        if hierarchy.is_empty() {
            return Ok(BlobSearch::NotFound);
        }

        if hierarchy.len() >= self.config.max_num_objects {
            return Ok(BlobSearch::TooNoisy {
                contours: hierarchy.len(),
            });
        }

        let min_object_area = self.config.min_object_area;
        let max_object_area = self.config.max_area_for(mask.size()?);
        let mut largest: Option<Blob> = None;

        for (index, links) in hierarchy.iter().enumerate() {
            // Holes have a parent; only outer boundaries are candidates.
            if links[3] >= 0 {
                continue;
            }

            let contour = contours.get(index)?;
            let moments = imgproc::moments(&contour, false)?;
            let area = moments.m00;

            if area <= min_object_area || area >= max_object_area {
                continue;
            }

            if largest.as_ref().map_or(true, |blob| area > blob.area) {
                largest = Some(Blob {
                    centroid: Point2::new(moments.m10 / area, moments.m01 / area),
                    area,
                });
            }
        }

        Ok(largest.map_or(BlobSearch::NotFound, BlobSearch::Found))
    }

    /// Threshold, clean and search one color range of an HSV image.
    pub fn locate(&self, hsv_image: &Mat, range: &HsvRange) -> Result<ColorMask> {
        let thresholded = self.threshold(hsv_image, range)?;
        let cleaned = self.clean(&thresholded)?;
        let search = self.find_largest_blob(&cleaned)?;

        Ok(ColorMask {
            thresholded,
            cleaned,
            search,
        })
    }
}
