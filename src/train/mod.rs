pub mod cancel;
pub mod history;
pub mod report;
pub mod sink;
pub mod timing;
pub mod train_config;
pub mod trainer;

pub use cancel::CancelToken;
pub use history::{EpochScratch, LossHistory, Recovered};
pub use report::EpochReport;
pub use sink::{ChannelSink, CurveFileSink, LogSink, MultiSink, ReportSink, TextSink};
pub use timing::{EpochTimer, EpochTiming};
pub use train_config::{DisplayConfig, TrainConfig};
pub use trainer::{ForwardFn, LossFn, StepContext, Trainer, TrainerBuilder};
