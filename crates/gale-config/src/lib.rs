//! Gale Config - Configuration resolution for the Gale inference engine
//!
//! This crate turns the engine's raw option surface into a validated,
//! immutable configuration:
//! - Compatibility rules that pick the legacy or next-generation runtime
//! - Generation-specific defaulting driven by hardware and usage context
//! - Per-concern builders with a strict conflict and validation taxonomy
//! - An ordered notice stream instead of ad-hoc logging

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod hardware;
pub mod options;
pub mod resolver;

pub mod error;
pub mod notice;

pub use config::{ResolvedConfig, RuntimeGeneration};
pub use error::{ConfigError, Result};
pub use hardware::{ComputeCapability, DeviceType, HardwareContext, UsageContext};
pub use notice::{Notice, NoticeLevel};
pub use options::EngineOptions;
pub use resolver::{resolve, Resolution, ResolutionPolicy, RuntimeOverride};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{ConfigError, Result};
    pub use crate::hardware::*;
    pub use crate::notice::{Notice, NoticeLevel};
    pub use crate::options::{EngineOptions, NGRAM_SPECULATIVE_MODEL};
    pub use crate::resolver::{resolve, Resolution, ResolutionPolicy, RuntimeOverride};
}
