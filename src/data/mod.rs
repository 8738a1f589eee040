pub mod batch_source;
pub mod toy;

pub use batch_source::{BatchSource, FnSource, ShuffledBatches};
pub use toy::{linear_samples, split_samples, Sample};
