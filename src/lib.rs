pub mod error;
pub mod data;
pub mod model;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{Phase, Result, TrainError};
pub use data::batch_source::{BatchSource, FnSource, ShuffledBatches};
pub use model::traits::{LossOutput, Model, Optimizer, Parameterized};
pub use model::linear::LinearModel;
pub use model::mse::mse_loss;
pub use optim::sgd::Sgd;
pub use train::cancel::CancelToken;
pub use train::report::EpochReport;
pub use train::sink::{ChannelSink, CurveFileSink, LogSink, MultiSink, ReportSink, TextSink};
pub use train::train_config::{DisplayConfig, TrainConfig};
pub use train::trainer::{StepContext, Trainer, TrainerBuilder};
