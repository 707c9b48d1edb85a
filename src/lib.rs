//! Job recommender library

pub mod availability;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod processing;

pub use config::Config;
pub use error::{JobbotError, Result};
pub use pipeline::{Pipeline, RunOptions, RunReport};
