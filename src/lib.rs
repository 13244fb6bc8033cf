//! Delivery-duration estimation for a simulated Berlin courier fleet.
//!
//! Synthetic trips train a random-forest estimator; trip attributes are
//! encoded, predicted and explained with exact Shapley attributions, and
//! recent durations are checked for drift against the training baseline.

pub mod config;
pub mod drift;
pub mod encoder;
pub mod error;
pub mod explain;
pub mod forest;
pub mod generator;
pub mod geo;
pub mod model;
mod persist;
pub mod pii;
pub mod tools;
pub mod train;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use tools::Toolbox;
