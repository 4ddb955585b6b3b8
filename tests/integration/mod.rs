//! Integration tests module
//!
//! This module organizes all integration tests for the soundbridge crate.

pub mod audio_test;
pub mod bridge_test;
pub mod config_test;
pub mod coordinator_test;
