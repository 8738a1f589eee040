use std::io::Write;
use std::path::Path;
use std::sync::mpsc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::train::report::EpochReport;

/// Consumer of per-epoch reports.
///
/// Reporting never fails from the trainer's point of view: a sink that does
/// I/O logs its own errors and carries on, so a broken terminal or a full
/// disk cannot abort a run.
pub trait ReportSink {
    fn report(&mut self, report: &EpochReport);
}

impl<F: FnMut(&EpochReport)> ReportSink for F {
    fn report(&mut self, report: &EpochReport) {
        self(report)
    }
}

/// One structured `tracing` event per epoch. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&mut self, r: &EpochReport) {
        info!(
            epoch = r.epoch,
            total_epochs = r.total_epochs,
            train_loss = r.train_loss,
            valid_loss = ?r.valid_loss,
            test_loss = ?r.test_loss,
            elapsed_secs = r.elapsed_secs,
            remaining_secs = r.remaining_secs,
            speed = r.speed,
            interrupted = r.interrupted,
            "epoch finished"
        );
    }
}

/// Renders `EpochReport::render_text` to any writer.
pub struct TextSink<W: Write> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        TextSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl TextSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        TextSink::new(std::io::stdout())
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn report(&mut self, report: &EpochReport) {
        let text = report.render_text();
        let written = self
            .writer
            .write_all(text.as_bytes())
            .and_then(|_| self.writer.flush());
        if let Err(e) = written {
            warn!(error = %e, "could not write epoch report");
        }
    }
}

/// Loss curves as persisted by `CurveFileSink`.
#[derive(Debug, Serialize)]
struct CurveFile<'a> {
    epochs: Vec<usize>,
    train: &'a [f64],
    valid: &'a [f64],
    test: &'a [f64],
    display: &'a crate::train::train_config::DisplayConfig,
}

/// Rewrites the report's `save_path` with the current loss curves after every
/// epoch. Does nothing for reports without a save path.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurveFileSink;

impl CurveFileSink {
    fn write(path: &Path, report: &EpochReport) -> Result<()> {
        let curves = CurveFile {
            epochs: (1..=report.train_history.len()).collect(),
            train: &report.train_history,
            valid: &report.valid_history,
            test: &report.test_history,
            display: &report.display,
        };
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &curves)?;
        Ok(())
    }
}

impl ReportSink for CurveFileSink {
    fn report(&mut self, report: &EpochReport) {
        if let Some(path) = &report.save_path {
            if let Err(e) = CurveFileSink::write(path, report) {
                warn!(path = %path.display(), error = %e, "could not save loss curves");
            }
        }
    }
}

/// Forwards each report over a channel, e.g. to a UI thread.
///
/// Once the receiver hangs up, further reports are dropped silently.
pub struct ChannelSink {
    tx: mpsc::Sender<EpochReport>,
    connected: bool,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<EpochReport>) -> Self {
        ChannelSink { tx, connected: true }
    }
}

impl ReportSink for ChannelSink {
    fn report(&mut self, report: &EpochReport) {
        if self.connected && self.tx.send(report.clone()).is_err() {
            warn!("report receiver disconnected");
            self.connected = false;
        }
    }
}

/// Fans every report out to several sinks, in insertion order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        MultiSink::default()
    }

    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ReportSink for MultiSink {
    fn report(&mut self, report: &EpochReport) {
        for sink in &mut self.sinks {
            sink.report(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::report::sample_report;

    #[test]
    fn text_sink_writes_the_rendered_block() {
        let mut sink = TextSink::new(Vec::new());
        sink.report(&sample_report());
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, sample_report().render_text());
    }

    #[test]
    fn curve_file_sink_persists_histories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curves.json");
        let mut report = sample_report();
        report.save_path = Some(path.clone());

        CurveFileSink.report(&report);

        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["epochs"], serde_json::json!([1, 2]));
        assert_eq!(json["train"], serde_json::json!([1.0, 0.25]));
        assert_eq!(json["test"], serde_json::json!([]));
        assert_eq!(json["display"]["valid_color"], "r");
    }

    #[test]
    fn curve_file_sink_skips_reports_without_path() {
        CurveFileSink.report(&sample_report());
    }

    #[test]
    fn channel_sink_survives_a_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelSink::new(tx);
        sink.report(&sample_report());
        assert_eq!(rx.recv().unwrap().epoch, 2);

        drop(rx);
        sink.report(&sample_report());
        sink.report(&sample_report());
        assert!(!sink.connected);
    }

    #[test]
    fn multi_sink_reaches_every_sink() {
        let (tx_a, rx_a) = mpsc::channel();
        let (tx_b, rx_b) = mpsc::channel();
        let mut sink = MultiSink::new()
            .with(ChannelSink::new(tx_a))
            .with(ChannelSink::new(tx_b));
        sink.report(&sample_report());
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn closures_are_sinks() {
        let mut epochs = Vec::new();
        {
            let mut sink = |r: &EpochReport| epochs.push(r.epoch);
            sink.report(&sample_report());
        }
        assert_eq!(epochs, vec![2]);
    }
}
