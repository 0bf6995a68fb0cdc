pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::sqlite::SqliteSink;
pub use config::{toml_config::TomlConfig, CliConfig};
pub use core::{etl::EtlEngine, pipeline::SheetPipeline};
pub use utils::error::{EtlError, Result};
