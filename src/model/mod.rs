pub mod traits;
pub mod linear;
pub mod mse;

pub use traits::{LossOutput, Model, Optimizer, Parameterized};
pub use linear::LinearModel;
pub use mse::mse_loss;
