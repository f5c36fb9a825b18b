//! Shared types, error model, clock, and configuration for drugwatch.
//!
//! This crate is the foundation depended on by all other drugwatch crates.
//! It provides:
//! - [`DrugwatchError`]: the unified error type
//! - Domain types ([`DrugEvent`], [`NewDrugEvent`], [`EventType`], [`DataSource`], [`ScrapeResult`])
//! - The [`Clock`] capability used for every notion of "today"
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], [`ScheduleConfig`], config loading)

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AppConfig, ScheduleConfig, ScheduleSection, ScrapeConfig, ScrapeSection, SourceSection,
    SourcesConfig, StorageSection, config_dir, config_file_path, init_config, init_config_at,
    load_config, load_config_from,
};
pub use error::{DrugwatchError, Result};
pub use types::{
    DataSource, DrugEvent, EventType, LOOKBACK_DAYS, NewDrugEvent, ScrapeResult,
};
