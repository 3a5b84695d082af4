use image::{GrayImage, RgbImage};

use super::AnalysisError;

pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, AnalysisError> {
    let image = image::load_from_memory(bytes).map_err(AnalysisError::Decode)?;
    log::debug!("Decoded {}x{} color image", image.width(), image.height());
    Ok(image.to_rgb8())
}

pub fn decode_gray(bytes: &[u8]) -> Result<GrayImage, AnalysisError> {
    let image = image::load_from_memory(bytes).map_err(AnalysisError::Decode)?;
    log::debug!("Decoded {}x{} grayscale image", image.width(), image.height());
    Ok(image.to_luma8())
}
