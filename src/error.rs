use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Which pass over the data an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Train,
    Valid,
    Test,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Train => "train",
            Phase::Valid => "valid",
            Phase::Test => "test",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong while building or running a `Trainer`.
///
/// - `Config` is raised at construction time; no trainer is created.
/// - `Interrupted` is raised by `Trainer::run` after the interrupted epoch has
///   been salvaged; the trainer can be resumed with another `run`.
/// - `EmptySource` and `Computation` abort the current epoch without touching
///   history or the epoch counter.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `epoch` is the last epoch whose losses are committed (0 if none).
    #[error("training interrupted after epoch {epoch}")]
    Interrupted { epoch: usize },

    #[error("{phase} source produced no batches")]
    EmptySource { phase: Phase },

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrainError {
    pub fn config(msg: impl Into<String>) -> Self {
        TrainError::Config(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        TrainError::Computation(msg.into())
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, TrainError::Interrupted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_phase() {
        let err = TrainError::EmptySource { phase: Phase::Valid };
        assert_eq!(err.to_string(), "valid source produced no batches");
    }

    #[test]
    fn only_interrupted_reports_interruption() {
        assert!(TrainError::Interrupted { epoch: 3 }.is_interrupted());
        assert!(!TrainError::config("bad").is_interrupted());
        assert!(!TrainError::computation("nan").is_interrupted());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TrainError = io.into();
        assert!(matches!(err, TrainError::Io(_)));
    }
}
