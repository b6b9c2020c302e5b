//! Foundation module - Core utilities
//!
//! Fundamental utilities used throughout the library:
//! - Frame timing
//! - Logging utilities

pub mod logging;
pub mod time;
