use thiserror::Error;

use crate::sim::EpisodePhase;

/// Reasons a single track generation attempt can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("no closed loop found in {samples} marched samples")]
    NoClosedLoopFound { samples: usize },
    #[error("degenerate curve: {0}")]
    DegenerateCurve(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("track generation failed: {0}")]
    GenerationFailed(#[from] GenerationError),
    #[error("invalid action `{action}`, expected {expected}")]
    InvalidAction {
        action: String,
        expected: &'static str,
    },
    #[error("goal bin {bin} outside 0..{num_bins}")]
    InvalidGoalBin { bin: u32, num_bins: u32 },
    #[error("episode is {0:?}, reset before stepping")]
    EpisodeNotActive(EpisodePhase),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
