use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::train::train_config::DisplayConfig;

/// Snapshot pushed to the presentation sink once per epoch.
///
/// An interrupted epoch still produces a report (with `interrupted` set) as
/// long as its losses were salvaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// 1-based number of the epoch that just finished.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss of this epoch.
    pub train_loss: f64,
    pub valid_loss: Option<f64>,
    pub test_loss: Option<f64>,
    pub train_history: Vec<f64>,
    pub valid_history: Vec<f64>,
    pub test_history: Vec<f64>,
    /// Wall-clock seconds spent in `run` so far, across all runs.
    pub elapsed_secs: f64,
    /// Estimate for the epochs still to go, at this epoch's pace.
    pub remaining_secs: f64,
    /// Epochs per second, from this epoch's duration alone.
    pub speed: f64,
    pub interrupted: bool,
    pub display: DisplayConfig,
    /// Where a sink may persist a rendering of the curves.
    pub save_path: Option<PathBuf>,
}

impl EpochReport {
    pub fn epochs_left(&self) -> usize {
        self.total_epochs.saturating_sub(self.epoch)
    }

    /// Human-readable block with the same fields a console dashboard shows.
    pub fn render_text(&self) -> String {
        let fmt_loss = |l: Option<f64>| match l {
            Some(v) => format!("{:>12.6}", v),
            None => format!("{:>12}", "-"),
        };
        format!(
            "Epoch:        {:>10} / {}{}\n\
             Train loss:   {:>12.6}   Val loss:       {}   Test loss: {}\n\
             Time elapsed: {:>10} sec  Time remaining: {:>10} sec  Speed: {:>10.4} ep/sec\n",
            self.epoch,
            self.total_epochs,
            if self.interrupted { " (interrupted)" } else { "" },
            self.train_loss,
            fmt_loss(self.valid_loss),
            fmt_loss(self.test_loss),
            self.elapsed_secs as u64,
            self.remaining_secs.round() as u64,
            self.speed,
        )
    }
}

#[cfg(test)]
pub(crate) fn sample_report() -> EpochReport {
    EpochReport {
        epoch: 2,
        total_epochs: 5,
        train_loss: 0.25,
        valid_loss: Some(0.5),
        test_loss: None,
        train_history: vec![1.0, 0.25],
        valid_history: vec![1.5, 0.5],
        test_history: vec![],
        elapsed_secs: 4.2,
        remaining_secs: 6.0,
        speed: 0.5,
        interrupted: false,
        display: DisplayConfig::default(),
        save_path: None,
    }
}
