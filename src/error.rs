use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by loading and configuration. Stamping itself never
/// fails; it ignores requests it cannot honour.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid configuration file: {0}")]
    Config(#[from] serde_json::Error),

    #[error("brush size {0}px is not one of the selectable sizes")]
    InvalidBrushSize(u32),

    #[error("opacity {0} is outside 1..=255")]
    InvalidOpacity(u32),

    #[error("canvas must be at least 1x1, got {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },
}
