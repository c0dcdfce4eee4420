//! Configuration module for callsift
//!
//! Handles loading and managing application settings from TOML files and the environment.

mod settings;

pub use settings::{GeneralSettings, LlmSettings, PipelineSettings, Settings};
