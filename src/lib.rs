pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, OutputFormat};

pub use crate::config::cli::LocalStorage;
pub use crate::config::toml_config::LayerConfig;
pub use crate::core::analysis::SpatialAnalyzer;
pub use crate::core::egrn::{parse_egrn, EgrnExtractor};
pub use crate::core::kpt::{parse_zone_map, ZoneMapExtractor};
pub use crate::domain::model::{AnalysisReport, Parcel, RestrictionRecord, ZoneRecord, ZoneResolution};
pub use crate::utils::error::{Result, ZoningError};
