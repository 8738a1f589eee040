use serde::{Deserialize, Serialize};

/// Per-epoch working values, overwritten every epoch.
///
/// Holds the losses the controller is about to commit so that an interrupted
/// commit can be completed from the same numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochScratch {
    pub train_loss: f64,
    pub valid_loss: Option<f64>,
    pub test_loss: Option<f64>,
}

/// What the recovery routine had to append to complete a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovered {
    pub train: bool,
    pub valid: bool,
    pub test: bool,
}

impl Recovered {
    pub fn any(&self) -> bool {
        self.train || self.valid || self.test
    }
}

/// Append-only train/valid/test loss curves.
///
/// Between epochs `train.len() == epoch - 1`. The valid curve grows in step
/// with train when a valid source is configured and stays empty otherwise;
/// the same goes for test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    train: Vec<f64>,
    valid: Vec<f64>,
    test: Vec<f64>,
    has_valid: bool,
    has_test: bool,
}

impl LossHistory {
    pub fn new(has_valid: bool, has_test: bool) -> Self {
        LossHistory { has_valid, has_test, ..Default::default() }
    }

    pub fn has_valid(&self) -> bool {
        self.has_valid
    }

    pub fn has_test(&self) -> bool {
        self.has_test
    }

    /// Number of epochs with a committed train loss.
    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    pub fn train(&self) -> &[f64] {
        &self.train
    }

    pub fn valid(&self) -> &[f64] {
        &self.valid
    }

    pub fn test(&self) -> &[f64] {
        &self.test
    }

    pub fn commit_train(&mut self, loss: f64) {
        self.train.push(loss);
    }

    /// No-op when validation is disabled.
    pub fn commit_valid(&mut self, loss: Option<f64>) {
        if self.has_valid {
            self.valid.push(loss.unwrap_or(f64::NAN));
        }
    }

    /// No-op when testing is disabled.
    pub fn commit_test(&mut self, loss: Option<f64>) {
        if self.has_test {
            self.test.push(loss.unwrap_or(f64::NAN));
        }
    }

    /// Completes a commit for `epoch` that may have stopped part-way.
    ///
    /// Each curve is compared against `epoch` on its own and gets the scratch
    /// value appended only if it is still short, so calling this any number
    /// of times after a full or partial commit never duplicates an entry.
    pub fn recover(&mut self, epoch: usize, scratch: &EpochScratch) -> Recovered {
        let mut recovered = Recovered::default();
        if self.train.len() < epoch {
            self.train.push(scratch.train_loss);
            recovered.train = true;
        }
        if self.has_valid && self.valid.len() < epoch {
            self.valid.push(scratch.valid_loss.unwrap_or(f64::NAN));
            recovered.valid = true;
        }
        if self.has_test && self.test.len() < epoch {
            self.test.push(scratch.test_loss.unwrap_or(f64::NAN));
            recovered.test = true;
        }
        recovered
    }

    pub fn clear(&mut self) {
        self.train.clear();
        self.valid.clear();
        self.test.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> EpochScratch {
        EpochScratch { train_loss: 1.0, valid_loss: Some(2.0), test_loss: Some(3.0) }
    }

    #[test]
    fn disabled_curves_stay_empty() {
        let mut h = LossHistory::new(false, false);
        h.commit_train(0.5);
        h.commit_valid(Some(0.7));
        h.commit_test(Some(0.9));
        assert_eq!(h.train(), &[0.5]);
        assert!(h.valid().is_empty());
        assert!(h.test().is_empty());
    }

    #[test]
    fn recover_fills_a_partial_commit() {
        let mut h = LossHistory::new(true, true);
        h.commit_train(1.0);
        let rec = h.recover(1, &scratch());
        assert_eq!(rec, Recovered { train: false, valid: true, test: true });
        assert_eq!((h.train(), h.valid(), h.test()), (&[1.0][..], &[2.0][..], &[3.0][..]));
    }

    #[test]
    fn recover_is_idempotent() {
        let mut h = LossHistory::new(true, true);
        h.commit_train(1.0);
        h.commit_valid(Some(2.0));
        h.commit_test(Some(3.0));
        assert!(!h.recover(1, &scratch()).any());
        assert!(!h.recover(1, &scratch()).any());
        assert_eq!(h.len(), 1);
        assert_eq!(h.test().len(), 1);
    }

    #[test]
    fn recover_handles_nothing_committed() {
        let mut h = LossHistory::new(false, true);
        let rec = h.recover(1, &scratch());
        assert!(rec.train && rec.test && !rec.valid);
        assert_eq!(h.test(), &[3.0]);
    }

    #[test]
    fn test_without_valid_tracks_train() {
        let mut h = LossHistory::new(false, true);
        for epoch in 1..=3 {
            h.commit_train(epoch as f64);
            h.recover(epoch, &scratch());
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.test().len(), 3);
        assert!(h.valid().is_empty());
    }

    #[test]
    fn clear_keeps_enabled_flags() {
        let mut h = LossHistory::new(true, false);
        h.commit_train(1.0);
        h.commit_valid(Some(1.0));
        h.clear();
        assert!(h.is_empty());
        assert!(h.valid().is_empty());
        assert!(h.has_valid());
    }
}
