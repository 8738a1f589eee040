// Trains a linear regressor on synthetic data with the epoch controller.
// Ctrl-C stops the run once the current epoch's losses are committed and
// reported.
//
// Run with:
//   cargo run -- --epochs 50 --clip 1.0 --save-curves curves.json

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ferrite_trainer::data::{linear_samples, split_samples, Sample};
use ferrite_trainer::{
    mse_loss, CurveFileSink, LinearModel, LogSink, MultiSink, Result, ShuffledBatches, Sgd,
    TextSink, TrainConfig, Trainer,
};

#[derive(Debug, Parser)]
#[command(name = "ferrite-trainer", about = "Epoch-driven training loop demo")]
struct Args {
    /// JSON run config (see `TrainConfig`); flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    epochs: Option<usize>,

    /// Clip gradient norm to this value before each step.
    #[arg(long)]
    clip: Option<f64>,

    /// Persist loss curves as JSON after every epoch.
    #[arg(long)]
    save_curves: Option<PathBuf>,

    #[arg(long, default_value_t = 0.05)]
    lr: f64,

    #[arg(long, default_value_t = 0.0)]
    momentum: f64,

    #[arg(long, default_value_t = 32)]
    batch_size: usize,

    #[arg(long, default_value_t = 1000)]
    samples: usize,

    /// Percent of samples held out for validation.
    #[arg(long, default_value_t = 20)]
    valid_pct: u8,

    /// Percent of samples held out for testing.
    #[arg(long, default_value_t = 10)]
    test_pct: u8,

    /// Print a text block per epoch instead of log lines.
    #[arg(long)]
    text: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => {}
        Err(e) if e.is_interrupted() => {
            info!("{}", e);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::load_json(path)?,
        None => TrainConfig::new(20),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if args.clip.is_some() {
        config.clip_threshold = args.clip;
    }
    if args.save_curves.is_some() {
        config.save_path = args.save_curves.clone();
    }
    if args.batch_size == 0 {
        return Err(ferrite_trainer::TrainError::config("batch size must be at least 1"));
    }

    let true_weights = [3.0, -2.0, 0.5];
    let samples = linear_samples(args.samples, &true_weights, 1.0, 0.1);
    let (train, valid, test) = split_samples(samples, args.valid_pct, args.test_pct);
    info!(train = train.len(), valid = valid.len(), test = test.len(), "dataset ready");

    let sink = if args.text {
        MultiSink::new().with(TextSink::stdout()).with(CurveFileSink)
    } else {
        MultiSink::new().with(LogSink).with(CurveFileSink)
    };

    let model = LinearModel::new(true_weights.len(), 1);
    let optimizer = Sgd::new(args.lr).with_momentum(args.momentum);
    let mut builder = Trainer::builder(model, optimizer)
        .config(config)
        .forward(|_, model: &mut LinearModel, batch: &Vec<Sample>| {
            let inputs: Vec<Vec<f64>> = batch.iter().map(|(x, _)| x.clone()).collect();
            model.forward(&inputs)
        })
        .loss(|_, batch: &Vec<Sample>, output: &Vec<Vec<f64>>| {
            let targets: Vec<Vec<f64>> = batch.iter().map(|(_, y)| y.clone()).collect();
            mse_loss(output, &targets)
        })
        .train_source(ShuffledBatches::new(train, args.batch_size))
        .sink(sink);
    if !valid.is_empty() {
        builder = builder.valid_source(ShuffledBatches::new(valid, args.batch_size).sequential());
    }
    if !test.is_empty() {
        builder = builder.test_source(ShuffledBatches::new(test, args.batch_size).sequential());
    }
    let mut trainer = builder.build()?;

    let cancel = trainer.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        error!("could not install Ctrl-C handler: {}", e);
    }

    let outcome = trainer.run();

    let model = trainer.model();
    info!(
        weights = ?model.weights,
        bias = ?model.biases,
        epochs_run = trainer.epoch() - 1,
        elapsed_secs = trainer.elapsed_secs(),
        "final parameters"
    );
    outcome
}
