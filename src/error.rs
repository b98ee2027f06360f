use thiserror::Error;

pub type Result<T> = std::result::Result<T, VizError>;

/// Every way a session command, an export or a user input can fail.
///
/// None of these are fatal: whoever receives one can keep using the session.
#[derive(Debug, Error)]
pub enum VizError {
    #[error("request to the simulation service failed: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("simulation service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no GC cycles have been recorded yet")]
    EmptyHistory,

    #[error("there is no rendered surface to export")]
    RenderTargetMissing,

    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("unknown workload type `{0}`")]
    UnknownWorkload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("label font could not be parsed: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
}

impl VizError {
    /// True for failures of a remote call, the only kind a user may want to
    /// retry by repeating the command.
    pub fn is_remote(&self) -> bool {
        matches!(self, VizError::Remote(_) | VizError::Status { .. })
    }
}
