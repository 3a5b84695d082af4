pub mod config;
pub mod decode;
pub mod defect;
pub mod edges;
pub mod mask;
pub mod peaks;
pub mod render;
pub mod ring;
pub mod stats;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid image file: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("Failed to render figure: {0}")]
    Render(String),
    #[error("Failed to load analysis config: {0}")]
    Config(String),
}
