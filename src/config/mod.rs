//! Configuration module for longscribe
//!
//! Handles loading and managing application settings from TOML files.

mod settings;

pub use settings::{
    ChunkingSettings, EncoderSettings, GeneralSettings, RetrySettings, Settings, TimeoutSettings,
    TranscriptionSettings,
};
