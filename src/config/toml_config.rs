use crate::config::layers::{FieldVariants, LayerDefinition, LayerKind};
use crate::core::fields::{Field, FieldTable};
use crate::utils::error::{Result, ZoningError};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_variants, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern"));

const LAYER_EXTENSIONS: &[&str] = &["geojson", "json"];

/// Layer set and extraction overrides, usually read from `layers.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub analysis: AnalysisSection,
    pub zones: Option<LayerSection>,
    pub capital_objects: Option<LayerSection>,
    pub planning_projects: Option<LayerSection>,
    #[serde(default)]
    pub restrictions: Vec<RestrictionSection>,
    #[serde(default)]
    pub extraction: ExtractionSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSection {
    /// Directory the layer paths are relative to.
    pub base_dir: Option<String>,
    /// Prefer the zones layer over a supplied KPT zone map.
    #[serde(default)]
    pub prefer_zone_layer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSection {
    pub path: String,
    #[serde(default)]
    pub fields: FieldVariants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictionSection {
    /// Restriction category label, copied into every matched record.
    pub name: Option<String>,
    pub path: String,
    #[serde(default)]
    pub fields: FieldVariants,
}

/// Extra field paths tried ahead of the built-in candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSection {
    #[serde(default)]
    pub egrn: BTreeMap<Field, Vec<String>>,
    #[serde(default)]
    pub kpt: BTreeMap<Field, Vec<String>>,
}

impl LayerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| ZoningError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let name = &caps[1];
                std::env::var(name).unwrap_or_else(|_| format!("${{{}}}", name))
            })
            .into_owned()
    }

    pub fn zones(&self) -> Option<LayerDefinition> {
        self.zones
            .as_ref()
            .map(|s| self.definition(LayerKind::Zones, None, s.path.as_str(), &s.fields))
    }

    pub fn capital_objects(&self) -> Option<LayerDefinition> {
        self.capital_objects
            .as_ref()
            .map(|s| self.definition(LayerKind::CapitalObjects, None, s.path.as_str(), &s.fields))
    }

    pub fn planning_projects(&self) -> Option<LayerDefinition> {
        self.planning_projects
            .as_ref()
            .map(|s| self.definition(LayerKind::PlanningProjects, None, s.path.as_str(), &s.fields))
    }

    pub fn restrictions(&self) -> Vec<LayerDefinition> {
        self.restrictions
            .iter()
            .map(|s| self.definition(LayerKind::Restriction, s.name.as_deref(), s.path.as_str(), &s.fields))
            .collect()
    }

    /// Every configured layer, in analysis order.
    pub fn all_layers(&self) -> Vec<LayerDefinition> {
        let mut layers: Vec<LayerDefinition> = [self.zones(), self.capital_objects(), self.planning_projects()]
            .into_iter()
            .flatten()
            .collect();
        layers.extend(self.restrictions());
        layers
    }

    fn definition(&self, kind: LayerKind, name: Option<&str>, path: &str, fields: &FieldVariants) -> LayerDefinition {
        let path = match &self.analysis.base_dir {
            Some(base) if !Path::new(path).is_absolute() => Path::new(base).join(path).to_string_lossy().into_owned(),
            _ => path.to_string(),
        };
        LayerDefinition::new(kind, name.unwrap_or(kind.default_label()), path, fields)
    }

    pub fn egrn_fields(&self) -> Result<FieldTable> {
        Self::with_overrides(FieldTable::egrn()?, &self.extraction.egrn)
    }

    pub fn kpt_fields(&self) -> Result<FieldTable> {
        Self::with_overrides(FieldTable::zone_record()?, &self.extraction.kpt)
    }

    fn with_overrides(mut table: FieldTable, overrides: &BTreeMap<Field, Vec<String>>) -> Result<FieldTable> {
        for (field, paths) in overrides {
            table = table.with_priority_paths(*field, paths)?;
        }
        Ok(table)
    }

    pub fn validate_config(&self) -> Result<()> {
        let sections = [
            ("zones", self.zones.as_ref().map(|s| (&s.path, &s.fields))),
            ("capital_objects", self.capital_objects.as_ref().map(|s| (&s.path, &s.fields))),
            ("planning_projects", self.planning_projects.as_ref().map(|s| (&s.path, &s.fields))),
        ];
        for (section, layer) in sections {
            if let Some((path, fields)) = layer {
                validate_layer(section, path, fields)?;
            }
        }

        for (idx, restriction) in self.restrictions.iter().enumerate() {
            let section = format!("restrictions[{}]", idx);
            if let Some(name) = &restriction.name {
                validate_non_empty_string(&format!("{}.name", section), name)?;
            }
            validate_layer(&section, &restriction.path, &restriction.fields)?;
        }

        if let Some(base) = &self.analysis.base_dir {
            validate_path("analysis.base_dir", base)?;
        }

        // field path syntax is only checked by compiling the tables
        self.egrn_fields()?;
        self.kpt_fields()?;

        Ok(())
    }
}

fn validate_layer(section: &str, path: &str, fields: &FieldVariants) -> Result<()> {
    let field = format!("{}.path", section);
    validate_path(&field, path)?;
    validate_file_extension(&field, path, LAYER_EXTENSIONS)?;
    for (logical, variants) in fields {
        validate_variants(&format!("{}.fields.{}", section, logical), variants)?;
    }
    Ok(())
}

impl Validate for LayerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
[analysis]
base_dir = "/data/layers"

[zones]
path = "zones.geojson"

[zones.fields]
name = ["ZONE_NAME", "NAME"]

[capital_objects]
path = "/abs/oks.geojson"

[[restrictions]]
name = "ЗОУИТ"
path = "zouit.geojson"

[[restrictions]]
path = "okn.geojson"
fields = { name = ["Наименование_ОКН"] }

[extraction.egrn]
cadastral_number = ["//custom/cad"]
"#;

    #[test]
    fn test_parse_layer_config() {
        let config = LayerConfig::from_toml_str(CONFIG).unwrap();

        let zones = config.zones().unwrap();
        assert_eq!(zones.path, "/data/layers/zones.geojson");
        assert_eq!(zones.variants("name"), ["ZONE_NAME".to_string(), "NAME".to_string()]);
        assert_eq!(zones.variants("code")[0], "Индекс_зоны");

        assert_eq!(config.capital_objects().unwrap().path, "/abs/oks.geojson");
        assert!(config.planning_projects().is_none());

        let restrictions = config.restrictions();
        assert_eq!(restrictions.len(), 2);
        assert_eq!(restrictions[0].name, "ЗОУИТ");
        assert_eq!(restrictions[1].name, "ЗОУИТ");
        assert_eq!(restrictions[1].variants("name"), ["Наименование_ОКН".to_string()]);

        assert_eq!(config.all_layers().len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_extraction_overrides_take_priority() {
        let config = LayerConfig::from_toml_str(CONFIG).unwrap();
        let table = config.egrn_fields().unwrap();
        let first = &table.candidates(Field::CadastralNumber)[0];
        assert_eq!(first.as_str(), "//custom/cad");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PARCEL_ZONING_TEST_LAYERS", "/mnt/gis");

        let config = LayerConfig::from_toml_str(
            r#"
[analysis]
base_dir = "${PARCEL_ZONING_TEST_LAYERS}"
"#,
        )
        .unwrap();
        assert_eq!(config.analysis.base_dir.as_deref(), Some("/mnt/gis"));

        std::env::remove_var("PARCEL_ZONING_TEST_LAYERS");
    }

    #[test]
    fn test_unknown_env_var_is_kept() {
        let config = LayerConfig::from_toml_str("[analysis]\nbase_dir = \"${PARCEL_ZONING_UNSET_VAR}\"\n").unwrap();
        assert_eq!(config.analysis.base_dir.as_deref(), Some("${PARCEL_ZONING_UNSET_VAR}"));
    }

    #[test]
    fn test_config_validation() {
        let bad_extension = LayerConfig::from_toml_str("[zones]\npath = \"zones.tab\"\n").unwrap();
        assert!(bad_extension.validate().is_err());

        let empty_variants = LayerConfig::from_toml_str("[zones]\npath = \"zones.geojson\"\nfields = { name = [] }\n").unwrap();
        assert!(empty_variants.validate().is_err());

        let bad_path = LayerConfig::from_toml_str("[extraction.kpt]\nzone_name = [\"a/@b/c\"]\n").unwrap();
        assert!(bad_path.validate().is_err());

        assert!(LayerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        let err = LayerConfig::from_toml_str("[zones\npath = 1").unwrap_err();
        assert!(matches!(err, ZoningError::ConfigError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(CONFIG.as_bytes()).unwrap();

        let config = LayerConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.restrictions.len(), 2);
    }
}
