use serde::{Deserialize, Serialize};
use std::path::Path;

use super::AnalysisError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub defect: DefectConfig,
    pub ring: RingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectConfig {
    pub surface_color: [u8; 3],
    pub defect_color: [u8; 3],
    pub blend_weight: f32,
}

impl Default for DefectConfig {
    fn default() -> Self {
        Self {
            surface_color: [0, 255, 255],
            defect_color: [255, 0, 255],
            blend_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleOffset {
    pub alpha: f32,
    pub beta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlurSpec {
    pub kernel: usize,
    pub sigma: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub gamma: f32,
    /// Applied in order after the gamma stage.
    pub contrast: Vec<ScaleOffset>,
    pub sharpen_blur: BlurSpec,
    pub sharpen_weights: (f32, f32),
    pub smooth_blur: BlurSpec,
    pub canny_low: f32,
    pub canny_high: f32,
    pub radial_bins: usize,
    pub polar_threshold: u8,
    pub scan_lines: usize,
    pub peak_distance: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            gamma: 2.5,
            contrast: vec![
                ScaleOffset { alpha: 1.2, beta: -20.0 },
                ScaleOffset { alpha: 1.3, beta: 20.0 },
            ],
            sharpen_blur: BlurSpec { kernel: 7, sigma: 10.0 },
            sharpen_weights: (1.5, -0.5),
            smooth_blur: BlurSpec { kernel: 3, sigma: 1.0 },
            canny_low: 50.0,
            canny_high: 150.0,
            radial_bins: 360,
            polar_threshold: 15,
            scan_lines: 20,
            peak_distance: 5,
        }
    }
}

impl AnalysisConfig {
    /// Loads overrides from a YAML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "Analysis config {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        let config: AnalysisConfig = serde_yaml::from_str(&config_str)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        let ring = &self.ring;
        for blur in [ring.sharpen_blur, ring.smooth_blur] {
            if blur.kernel % 2 == 0 || blur.sigma <= 0.0 {
                return Err(AnalysisError::Config(format!(
                    "blur kernel must be odd with positive sigma, got {:?}",
                    blur
                )));
            }
        }
        if ring.gamma <= 0.0 {
            return Err(AnalysisError::Config("gamma must be positive".into()));
        }
        if ring.canny_low > ring.canny_high {
            return Err(AnalysisError::Config(
                "canny_low must not exceed canny_high".into(),
            ));
        }
        if ring.scan_lines == 0 || ring.radial_bins == 0 || ring.peak_distance == 0 {
            return Err(AnalysisError::Config(
                "scan_lines, radial_bins and peak_distance must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = "ring:\n  canny_low: 40\n  scan_lines: 12\n";
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.ring.canny_low, 40.0);
        assert_eq!(config.ring.scan_lines, 12);
        assert_eq!(config.ring.canny_high, 150.0);
        assert_eq!(config.defect.blend_weight, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn even_kernel_is_rejected() {
        let mut config = AnalysisConfig::default();
        config.ring.sharpen_blur.kernel = 6;
        assert!(matches!(config.validate(), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AnalysisConfig::load("does/not/exist.yaml").unwrap();
        assert_eq!(config.ring.scan_lines, 20);
        assert_eq!(config.ring.contrast.len(), 2);
    }
}
