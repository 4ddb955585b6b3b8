//! Configuration management

mod settings;
#[cfg(test)]
mod tests;

pub use settings::{ConfigError, Settings, MAX_RESUME_TICK_MS};
