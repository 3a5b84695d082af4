use image::{GrayImage, RgbImage};

use super::config::DefectConfig;
use super::mask::{count_nonzero, prediction_mask, MASK_ON};
use crate::detection::model::Prediction;

#[derive(Debug, Clone)]
pub struct DefectAnalysis {
    pub total_log_area: u64,
    pub defect_area: u64,
    /// Percentage of the log surface covered by defects.
    pub defect_ratio: f64,
    pub surface_mask: GrayImage,
    pub defect_mask: GrayImage,
    pub overlay: RgbImage,
}

impl DefectAnalysis {
    pub fn rounded_ratio(&self) -> f64 {
        (self.defect_ratio * 100.0).round() / 100.0
    }
}

pub fn defect_ratio(defect_area: u64, total_log_area: u64) -> f64 {
    if total_log_area == 0 {
        return 0.0;
    }
    defect_area as f64 / total_log_area as f64 * 100.0
}

/// Adds `weight * color` to every pixel set in `mask`, saturating.
pub fn blend_mask(base: &mut RgbImage, mask: &GrayImage, color: [u8; 3], weight: f32) {
    for (pixel, m) in base.pixels_mut().zip(mask.pixels()) {
        if m[0] == 0 {
            continue;
        }
        for (channel, c) in pixel.0.iter_mut().zip(color) {
            let v = *channel as f32 + weight * c as f32;
            *channel = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

pub fn analyze_defects(
    image: &RgbImage,
    surface: &[Prediction],
    defects: &[Prediction],
    config: &DefectConfig,
) -> DefectAnalysis {
    let (width, height) = image.dimensions();
    let surface_mask = prediction_mask(width, height, surface, MASK_ON);
    let defect_mask = prediction_mask(width, height, defects, MASK_ON);

    let total_log_area = count_nonzero(&surface_mask);
    let defect_area = count_nonzero(&defect_mask);
    let defect_ratio = defect_ratio(defect_area, total_log_area);

    // surface first, defects on top
    let mut overlay = image.clone();
    blend_mask(&mut overlay, &surface_mask, config.surface_color, config.blend_weight);
    blend_mask(&mut overlay, &defect_mask, config.defect_color, config.blend_weight);

    log::debug!(
        "Log area {} px, defect area {} px, ratio {:.2}%",
        total_log_area,
        defect_area,
        defect_ratio
    );

    DefectAnalysis {
        total_log_area,
        defect_area,
        defect_ratio,
        surface_mask,
        defect_mask,
        overlay,
    }
}
