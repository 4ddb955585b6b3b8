//! Command-line front end

mod cli;

pub use cli::{Args, Cli};
