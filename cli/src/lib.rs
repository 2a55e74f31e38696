//! CLI utilities for spksim.
//!
//! Per-user paths under `~/.spksim`, the optional `config.yaml` with extra
//! model entries, and the CSV results writer.

pub mod config;
pub mod output;
pub mod paths;

pub use config::{load_config, resolve_cache_dir, Config, ModelEntry};
pub use output::{mean_score, save_csv, write_csv, ScoreLayout, ScoreRecord};
pub use paths::Paths;
