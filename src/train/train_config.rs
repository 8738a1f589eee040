use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Cosmetic settings passed through to presentation sinks. They never affect
/// training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Curve opacity in [0, 1].
    pub alpha: f64,
    /// Figure width and height in inches.
    pub figsize: (f64, f64),
    pub train_color: String,
    pub valid_color: String,
    pub test_color: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            alpha: 0.97,
            figsize: (9.0, 6.0),
            train_color: "b".into(),
            valid_color: "r".into(),
            test_color: "g".into(),
        }
    }
}

/// Run parameters for a `Trainer`.
///
/// # Fields
/// - `epochs`: total number of epochs; must be at least 1
/// - `clip_threshold`: when set, gradient norm is clipped to this value
///   before every optimizer step
/// - `display`: cosmetics forwarded in every report
/// - `save_path`: where sinks may persist a rendering of the curves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    #[serde(default)]
    pub clip_threshold: Option<f64>,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub save_path: Option<PathBuf>,
}

impl TrainConfig {
    /// Creates a config with no clipping, default cosmetics and no save path.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            clip_threshold: None,
            display: DisplayConfig::default(),
            save_path: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TrainError::config("epochs must be at least 1"));
        }
        if let Some(clip) = self.clip_threshold {
            if !clip.is_finite() || clip <= 0.0 {
                return Err(TrainError::config(format!(
                    "clip_threshold must be a positive finite number, got {}",
                    clip
                )));
            }
        }
        let d = &self.display;
        if !(0.0..=1.0).contains(&d.alpha) {
            return Err(TrainError::config(format!("alpha must lie in [0, 1], got {}", d.alpha)));
        }
        let (w, h) = d.figsize;
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(TrainError::config(format!(
                "figsize must be two positive numbers, got ({}, {})",
                w, h
            )));
        }
        Ok(())
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads and validates a config written by `save_json` (or by hand).
    pub fn load_json(path: impl AsRef<Path>) -> Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
