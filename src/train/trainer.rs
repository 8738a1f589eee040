use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::data::batch_source::BatchSource;
use crate::error::{Phase, Result, TrainError};
use crate::model::traits::{LossOutput, Model, Optimizer};
use crate::train::cancel::{CancelToken, Cancelled};
use crate::train::history::{EpochScratch, LossHistory};
use crate::train::report::EpochReport;
use crate::train::sink::{LogSink, ReportSink};
use crate::train::timing::{EpochTimer, EpochTiming};
use crate::train::train_config::{DisplayConfig, TrainConfig};

/// Read-only view of the trainer handed to the forward and loss callables.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// 1-based epoch being run.
    pub epoch: usize,
    pub total_epochs: usize,
    pub phase: Phase,
    /// 1-based index of the batch within the current pass.
    pub batch: usize,
    /// Losses committed by earlier epochs.
    pub history: &'a LossHistory,
}

/// `forward(ctx, model, batch) -> output`
pub type ForwardFn<M, B, R> = Box<dyn FnMut(&StepContext<'_>, &mut M, &B) -> Result<R>>;

/// `loss(ctx, batch, output) -> scalar + gradient for Model::backward`
pub type LossFn<M, B, R> =
    Box<dyn FnMut(&StepContext<'_>, &B, &R) -> Result<LossOutput<<M as Model>::Grad>>>;

type Source<B> = Box<dyn BatchSource<Batch = B>>;

struct Steps<M: Model, B, R> {
    forward: ForwardFn<M, B, R>,
    loss: LossFn<M, B, R>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects a trainer's collaborators and run parameters.
///
/// `build` validates everything at once; on error nothing is constructed.
pub struct TrainerBuilder<M: Model, O, B, R> {
    model: M,
    optimizer: O,
    forward: Option<ForwardFn<M, B, R>>,
    loss: Option<LossFn<M, B, R>>,
    train_source: Option<Source<B>>,
    valid_source: Option<Source<B>>,
    test_source: Option<Source<B>>,
    sink: Option<Box<dyn ReportSink>>,
    cancel: Option<CancelToken>,
    config: TrainConfig,
}

impl<M, O, B, R> TrainerBuilder<M, O, B, R>
where
    M: Model,
    O: Optimizer<M>,
    B: 'static,
{
    pub fn forward<F>(mut self, f: F) -> Self
    where
        F: FnMut(&StepContext<'_>, &mut M, &B) -> Result<R> + 'static,
    {
        self.forward = Some(Box::new(f));
        self
    }

    pub fn loss<F>(mut self, f: F) -> Self
    where
        F: FnMut(&StepContext<'_>, &B, &R) -> Result<LossOutput<M::Grad>> + 'static,
    {
        self.loss = Some(Box::new(f));
        self
    }

    pub fn train_source(mut self, source: impl BatchSource<Batch = B> + 'static) -> Self {
        self.train_source = Some(Box::new(source));
        self
    }

    pub fn valid_source(mut self, source: impl BatchSource<Batch = B> + 'static) -> Self {
        self.valid_source = Some(Box::new(source));
        self
    }

    pub fn test_source(mut self, source: impl BatchSource<Batch = B> + 'static) -> Self {
        self.test_source = Some(Box::new(source));
        self
    }

    /// Replaces every run parameter at once (epochs, clipping, cosmetics,
    /// save path).
    pub fn config(mut self, config: TrainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.config.epochs = epochs;
        self
    }

    pub fn clip_threshold(mut self, max_norm: f64) -> Self {
        self.config.clip_threshold = Some(max_norm);
        self
    }

    pub fn display(mut self, display: DisplayConfig) -> Self {
        self.config.display = display;
        self
    }

    pub fn save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.save_path = Some(path.into());
        self
    }

    /// Defaults to `LogSink`.
    pub fn sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Defaults to a fresh token, reachable through `Trainer::cancel_token`.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<Trainer<M, O, B, R>> {
        self.config.validate()?;
        let forward = self
            .forward
            .ok_or_else(|| TrainError::config("a forward callable is required"))?;
        let loss = self
            .loss
            .ok_or_else(|| TrainError::config("a loss callable is required"))?;
        let train_source = self
            .train_source
            .ok_or_else(|| TrainError::config("a train source is required"))?;

        let history = LossHistory::new(self.valid_source.is_some(), self.test_source.is_some());
        let initial_mode = self.model.is_training();

        Ok(Trainer {
            model: self.model,
            optimizer: self.optimizer,
            steps: Steps { forward, loss },
            train_source,
            valid_source: self.valid_source,
            test_source: self.test_source,
            sink: self.sink.unwrap_or_else(|| Box::new(LogSink)),
            cancel: self.cancel.unwrap_or_default(),
            config: self.config,
            history,
            timer: EpochTimer::new(),
            scratch: EpochScratch::default(),
            epoch: 1,
            completed: false,
            initial_mode,
        })
    }
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Epoch-driven training controller.
///
/// Each epoch runs a train pass, then (when configured) valid and test
/// passes, then commits the three mean losses to the history and reports to
/// the sink. Between epochs the history always holds exactly `epoch - 1`
/// train losses.
///
/// A cancellation observed while committing does not lose the epoch: the
/// commit is completed, timing and reporting still happen, the epoch counter
/// advances, and only then does `run` return `TrainError::Interrupted`.
/// Calling `run` again resumes at the next epoch.
pub struct Trainer<M: Model, O, B, R> {
    model: M,
    optimizer: O,
    steps: Steps<M, B, R>,
    train_source: Source<B>,
    valid_source: Option<Source<B>>,
    test_source: Option<Source<B>>,
    sink: Box<dyn ReportSink>,
    cancel: CancelToken,
    config: TrainConfig,
    history: LossHistory,
    timer: EpochTimer,
    scratch: EpochScratch,
    epoch: usize,
    completed: bool,
    initial_mode: bool,
}

impl<M, O, B, R> Trainer<M, O, B, R>
where
    M: Model,
    O: Optimizer<M>,
    B: 'static,
{
    pub fn builder(model: M, optimizer: O) -> TrainerBuilder<M, O, B, R> {
        TrainerBuilder {
            model,
            optimizer,
            forward: None,
            loss: None,
            train_source: None,
            valid_source: None,
            test_source: None,
            sink: None,
            cancel: None,
            config: TrainConfig::new(0),
        }
    }

    /// Runs epochs `epoch..=total_epochs`.
    ///
    /// Returns immediately once the run has completed. On `Interrupted` the
    /// trainer is consistent and a later `run` continues with the next epoch
    /// (or just marks the run completed if the interrupted epoch was the
    /// last). Any other error leaves the failed epoch uncommitted and the
    /// counter where it was.
    pub fn run(&mut self) -> Result<()> {
        if self.completed {
            return Ok(());
        }
        let total = self.config.epochs;

        debug!(from = self.epoch, total, "training started");
        self.timer.start();

        while self.epoch <= total {
            if self.cancel.take() {
                warn!(epoch = self.epoch, "cancelled before the epoch started");
                self.model.set_training(self.initial_mode);
                return Err(TrainError::Interrupted { epoch: self.epoch - 1 });
            }

            self.scratch = self.run_phases()?;

            let interrupted = match self.try_commit() {
                Ok(()) => false,
                Err(Cancelled) => {
                    let recovered = self.history.recover(self.epoch, &self.scratch);
                    warn!(epoch = self.epoch, ?recovered, "cancelled while committing losses");
                    self.model.set_training(self.initial_mode);
                    true
                }
            };

            self.finish_epoch(interrupted);

            // A signal raised after the last checkpoint (from the sink, say)
            // still stops the run here, with the epoch already committed.
            if !interrupted && self.cancel.take() {
                warn!(epoch = self.epoch - 1, "cancelled after the epoch was committed");
                self.model.set_training(self.initial_mode);
                return Err(TrainError::Interrupted { epoch: self.epoch - 1 });
            }
            if interrupted {
                return Err(TrainError::Interrupted { epoch: self.epoch - 1 });
            }
        }

        self.completed = true;
        self.model.set_training(self.initial_mode);
        info!(
            epochs = total,
            elapsed_secs = self.timer.elapsed_secs(),
            "training completed"
        );
        Ok(())
    }

    /// Forgets all progress: empty histories, epoch 1, not completed, zero
    /// elapsed time, no pending cancellation. Model and optimizer state are
    /// left alone.
    pub fn clear_history(&mut self) {
        self.cancel.take();
        self.history.clear();
        self.epoch = 1;
        self.completed = false;
        self.timer.reset();
        self.scratch = EpochScratch::default();
    }

    fn run_phases(&mut self) -> Result<EpochScratch> {
        let ctx = StepContext {
            epoch: self.epoch,
            total_epochs: self.config.epochs,
            phase: Phase::Train,
            batch: 0,
            history: &self.history,
        };

        debug!(epoch = ctx.epoch, "train phase");
        self.model.set_training(true);
        let train_loss = train_pass(
            &mut self.model,
            &mut self.optimizer,
            &*self.train_source,
            &mut self.steps,
            self.config.clip_threshold,
            ctx,
        )?;

        let mut valid_loss = None;
        let mut test_loss = None;
        if self.valid_source.is_some() || self.test_source.is_some() {
            debug!(epoch = ctx.epoch, "evaluation phase");
            self.model.set_training(false);
            self.model.set_grad_enabled(false);

            let evaluated = eval_phase(
                &mut self.model,
                self.valid_source.as_deref(),
                self.test_source.as_deref(),
                &mut self.steps,
                ctx,
            );

            // Re-enabled on the error path as well.
            self.model.set_grad_enabled(true);
            (valid_loss, test_loss) = evaluated?;
        }

        Ok(EpochScratch { train_loss, valid_loss, test_loss })
    }

    /// Appends this epoch's losses, checking for cancellation after each one.
    fn try_commit(&mut self) -> std::result::Result<(), Cancelled> {
        let s = self.scratch;
        self.history.commit_train(s.train_loss);
        self.cancel.checkpoint()?;
        if self.history.has_valid() {
            self.history.commit_valid(s.valid_loss);
            self.cancel.checkpoint()?;
        }
        if self.history.has_test() {
            self.history.commit_test(s.test_loss);
            self.cancel.checkpoint()?;
        }
        Ok(())
    }

    /// Timing, reporting and the epoch increment; runs for interrupted epochs
    /// too.
    fn finish_epoch(&mut self, interrupted: bool) {
        let timing = self.timer.record();
        debug!(
            epoch = self.epoch,
            duration_ms = timing.duration.as_millis() as u64,
            "epoch timed"
        );
        let report = self.build_report(&timing, interrupted);
        self.sink.report(&report);
        self.epoch += 1;
    }

    fn build_report(&self, timing: &EpochTiming, interrupted: bool) -> EpochReport {
        let mut report = EpochReport {
            epoch: self.epoch,
            total_epochs: self.config.epochs,
            train_loss: self.scratch.train_loss,
            valid_loss: self.scratch.valid_loss,
            test_loss: self.scratch.test_loss,
            train_history: self.history.train().to_vec(),
            valid_history: self.history.valid().to_vec(),
            test_history: self.history.test().to_vec(),
            elapsed_secs: self.timer.elapsed_secs(),
            remaining_secs: 0.0,
            speed: timing.speed,
            interrupted,
            display: self.config.display.clone(),
            save_path: self.config.save_path.clone(),
        };
        report.remaining_secs = timing.remaining_secs(report.epochs_left());
        report
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn train_source(&self) -> &dyn BatchSource<Batch = B> {
        &*self.train_source
    }

    pub fn valid_source(&self) -> Option<&dyn BatchSource<Batch = B>> {
        self.valid_source.as_deref()
    }

    pub fn test_source(&self) -> Option<&dyn BatchSource<Batch = B>> {
        self.test_source.as_deref()
    }

    pub fn total_epochs(&self) -> usize {
        self.config.epochs
    }

    pub fn clip_threshold(&self) -> Option<f64> {
        self.config.clip_threshold
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.config.display
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.config.save_path.as_deref()
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn train_loss_history(&self) -> Vec<f64> {
        self.history.train().to_vec()
    }

    pub fn valid_loss_history(&self) -> Vec<f64> {
        self.history.valid().to_vec()
    }

    pub fn test_loss_history(&self) -> Vec<f64> {
        self.history.test().to_vec()
    }

    /// Next epoch to run, 1-based.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.timer.elapsed_secs()
    }

    /// Model mode captured at construction; restored when `run` returns.
    pub fn initial_mode(&self) -> bool {
        self.initial_mode
    }

    /// A handle that interrupts this trainer's `run` when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn into_parts(self) -> (M, O) {
        (self.model, self.optimizer)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// One optimisation pass; returns the mean loss over batches.
fn train_pass<M, O, B, R>(
    model: &mut M,
    optimizer: &mut O,
    source: &dyn BatchSource<Batch = B>,
    steps: &mut Steps<M, B, R>,
    clip_threshold: Option<f64>,
    mut ctx: StepContext<'_>,
) -> Result<f64>
where
    M: Model,
    O: Optimizer<M>,
{
    let mut total = 0.0;
    let mut count = 0usize;

    for batch in source.batches() {
        ctx.batch = count + 1;
        optimizer.zero_grad(model);

        let output = (steps.forward)(&ctx, model, &batch)?;
        let loss = (steps.loss)(&ctx, &batch, &output)?;
        model.backward(&loss.grad)?;

        if let Some(max_norm) = clip_threshold {
            model.clip_grad_norm(max_norm);
        }
        optimizer.step(model)?;

        total += loss.value;
        count += 1;
    }

    mean_loss(total, count, ctx.phase)
}

/// Valid pass then test pass, each only if its source is configured.
fn eval_phase<M, B, R>(
    model: &mut M,
    valid: Option<&dyn BatchSource<Batch = B>>,
    test: Option<&dyn BatchSource<Batch = B>>,
    steps: &mut Steps<M, B, R>,
    ctx: StepContext<'_>,
) -> Result<(Option<f64>, Option<f64>)>
where
    M: Model,
{
    let valid_loss = match valid {
        Some(source) => {
            let ctx = StepContext { phase: Phase::Valid, ..ctx };
            Some(eval_pass(model, source, steps, ctx)?)
        }
        None => None,
    };
    let test_loss = match test {
        Some(source) => {
            let ctx = StepContext { phase: Phase::Test, ..ctx };
            Some(eval_pass(model, source, steps, ctx)?)
        }
        None => None,
    };
    Ok((valid_loss, test_loss))
}

/// Forward and loss only; the caller has already disabled gradient tracking.
fn eval_pass<M, B, R>(
    model: &mut M,
    source: &dyn BatchSource<Batch = B>,
    steps: &mut Steps<M, B, R>,
    mut ctx: StepContext<'_>,
) -> Result<f64>
where
    M: Model,
{
    let mut total = 0.0;
    let mut count = 0usize;

    for batch in source.batches() {
        ctx.batch = count + 1;
        let output = (steps.forward)(&ctx, model, &batch)?;
        total += (steps.loss)(&ctx, &batch, &output)?.value;
        count += 1;
    }

    mean_loss(total, count, ctx.phase)
}

/// Batch-count-weighted mean.
fn mean_loss(total: f64, count: usize, phase: Phase) -> Result<f64> {
    if count == 0 {
        return Err(TrainError::EmptySource { phase });
    }
    Ok(total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_loss_divides_by_batch_count() {
        assert_eq!(mean_loss(12.0, 3, Phase::Train).unwrap(), 4.0);
    }

    #[test]
    fn mean_loss_rejects_empty_passes() {
        assert!(matches!(
            mean_loss(0.0, 0, Phase::Test),
            Err(TrainError::EmptySource { phase: Phase::Test })
        ));
    }
}
