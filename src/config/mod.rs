pub mod cli;
pub mod layers;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_file_extension, validate_path, validate_required_field, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Full report wrapped with a timestamp
    Json,
    /// Matched records only
    Csv,
    /// Human-readable digest
    Summary,
    /// ZIP with the JSON report, the CSV and the digest
    Bundle,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "parcel-zoning")]
#[command(about = "Territorial zone and restriction analysis for a land parcel")]
pub struct CliConfig {
    #[arg(long, help = "EGRN extract: XML, ZIP or gzip")]
    pub egrn: String,

    #[arg(long, help = "KPT extract used as the zone map")]
    pub kpt: Option<String>,

    #[arg(long, help = "Layer configuration (TOML)")]
    pub config: Option<String>,

    #[arg(long, default_value = ".", help = "Directory relative layer paths start from")]
    pub layers_dir: String,

    #[arg(long, help = "Output file; stdout when omitted")]
    pub output: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("egrn", &self.egrn)?;
        if let Some(kpt) = &self.kpt {
            validate_path("kpt", kpt)?;
        }
        if let Some(config) = &self.config {
            validate_path("config", config)?;
            validate_file_extension("config", config, &["toml"])?;
        }
        validate_path("layers_dir", &self.layers_dir)?;
        if let Some(output) = &self.output {
            validate_path("output", output)?;
        }
        if self.format == OutputFormat::Bundle {
            validate_required_field("output", &self.output)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::utils::error::ZoningError;

    #[test]
    fn test_cli_parsing() {
        let config = CliConfig::parse_from([
            "parcel-zoning",
            "--egrn",
            "egrn.zip",
            "--kpt",
            "kpt.xml",
            "--format",
            "csv",
        ]);
        assert_eq!(config.egrn, "egrn.zip");
        assert_eq!(config.kpt.as_deref(), Some("kpt.xml"));
        assert_eq!(config.format, OutputFormat::Csv);
        assert_eq!(config.layers_dir, ".");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bundle_requires_output() {
        let config = CliConfig::parse_from(["parcel-zoning", "--egrn", "egrn.xml", "--format", "bundle"]);
        assert!(matches!(config.validate(), Err(ZoningError::MissingConfigError { .. })));
    }

    #[test]
    fn test_config_must_be_toml() {
        let config = CliConfig::parse_from(["parcel-zoning", "--egrn", "egrn.xml", "--config", "layers.yaml"]);
        assert!(config.validate().is_err());
    }
}
